// ============================================================
// Layer 4 — Sign Batcher
// ============================================================
// Collates a Vec<SignSample> into one host-side SignBatch.
//
// Samples differ in length, so the batcher:
//   1. sorts them by frame count, longest first
//   2. pads every sample to the longest by repeating its last
//      frame (video_length still records the real count)
//   3. concatenates the labels and records label_length
//
//   frames  [5, 3]  →  video [2, 5, dim], video_length [5, 3]
//
// Tensors are created later by the device adapter; the batch
// stays in ndarray so the loops remain framework-free; the
// Batcher impl ignores the device Burn hands it.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{ensure, Result};
use burn::{data::dataloader::batcher::Batcher, tensor::backend::Backend};
use ndarray::{s, Array3};

use crate::data::dataset::{LoadError, LoadedSample, SignSample};
use crate::domain::batch::SignBatch;

/// A collated batch, or the first sample error inside it
pub type LoadedBatch = std::result::Result<SignBatch, LoadError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SignBatcher;

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each mini-batch of samples.
impl<B: Backend> Batcher<B, LoadedSample, LoadedBatch> for SignBatcher {
    fn batch(&self, items: Vec<LoadedSample>, _device: &B::Device) -> LoadedBatch {
        let samples = items.into_iter().collect::<std::result::Result<Vec<_>, _>>()?;
        self.collate(samples).map_err(LoadError::from)
    }
}

impl SignBatcher {
    pub fn collate(&self, mut samples: Vec<SignSample>) -> Result<SignBatch> {
        samples.sort_by(|a, b| b.num_frames().cmp(&a.num_frames()));

        let max_frames = samples.first().map(SignSample::num_frames).unwrap_or(0);
        let dim = samples
            .iter()
            .find(|s| s.num_frames() > 0)
            .map(|s| s.frames.ncols())
            .unwrap_or(0);

        let video = if max_frames == 0 {
            None
        } else {
            let mut video = Array3::<f32>::zeros((samples.len(), max_frames, dim));
            for (i, sample) in samples.iter().enumerate() {
                let n = sample.num_frames();
                if n == 0 {
                    continue;
                }
                ensure!(
                    sample.frames.ncols() == dim,
                    "Sample '{}' has {} features per frame, expected {}",
                    sample.info, sample.frames.ncols(), dim
                );
                video.slice_mut(s![i, ..n, ..]).assign(&sample.frames);
                let last = sample.frames.row(n - 1);
                for t in n..max_frames {
                    video.slice_mut(s![i, t, ..]).assign(&last);
                }
            }
            Some(video)
        };

        Ok(SignBatch {
            video,
            video_length: samples.iter().map(SignSample::num_frames).collect(),
            label:        samples.iter().flat_map(|s| s.label.iter().copied()).collect(),
            label_length: samples.iter().map(|s| s.label.len()).collect(),
            info:         samples.into_iter().map(|s| s.info).collect(),
        })
    }
}
