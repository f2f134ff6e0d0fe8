// ============================================================
// Layer 4 — Sign Loader
// ============================================================
// Wraps Burn's DataLoader so the loops see a BatchSource.
// One call to iter() is one pass over the dataset; with
// shuffling on, Burn draws a fresh permutation every pass from
// the seeded generator.
//
// Batches are host-side, so the loader is built once on the
// inference backend and serves training and evaluation alike.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::Result;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use std::sync::Arc;

use crate::data::{
    batcher::{LoadedBatch, SignBatcher},
    dataset::{LoadedSample, SignDataset},
};
use crate::domain::batch::SignBatch;
use crate::domain::traits::BatchSource;
use crate::ml::InferBackend;

pub struct SignLoader {
    loader:     Arc<dyn DataLoader<InferBackend, LoadedBatch>>,
    batch_size: usize,
}

impl SignLoader {
    pub fn new(dataset: SignDataset, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        let batch_size = batch_size.max(1);
        let builder = DataLoaderBuilder::<InferBackend, LoadedSample, LoadedBatch>::new(SignBatcher)
            .batch_size(batch_size)
            .num_workers(1);
        let builder = if shuffle { builder.shuffle(seed) } else { builder };

        Self { loader: builder.build(dataset), batch_size }
    }
}

impl BatchSource for SignLoader {
    fn num_batches(&self) -> usize {
        self.loader.num_items().div_ceil(self.batch_size)
    }

    fn dataset_len(&self) -> usize {
        self.loader.num_items()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Result<SignBatch>> + '_> {
        Box::new(self.loader.iter().map(|batch| batch.map_err(anyhow::Error::from)))
    }
}
