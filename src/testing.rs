// ============================================================
// Test-only collaborators
// ============================================================
// Counting fakes for the Layer 3 traits. They let the loop tests
// assert how many forward passes, optimizer steps and cache
// clears happened without building a real network.

use anyhow::Result;
use ndarray::{Array2, Array3};
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use crate::domain::batch::SignBatch;
use crate::domain::hypothesis::{sample_name, Hypothesis, RecognizedGloss};
use crate::domain::loss::{LossRecord, LossWeights};
use crate::domain::traits::{
    BatchSource, ComputeDevice, DeviceError, RecognitionOutput, ScalarLoss,
    SequenceRecognizer, TrainingOptimizer,
};

pub const FEATURE_DIM: usize = 4;
pub const NUM_CLASSES: usize = 3;

/// A batch of `frames.len()` samples, each with `labels_per_sample` labels
pub fn make_batch(tag: &str, frames: &[usize], labels_per_sample: usize) -> SignBatch {
    let max_frames = frames.iter().copied().max().unwrap_or(0);
    let n = frames.len();
    SignBatch {
        video:        Some(Array3::zeros((n, max_frames, FEATURE_DIM))),
        video_length: frames.to_vec(),
        label:        (0..(n * labels_per_sample) as i64).map(|x| x + 1).collect(),
        label_length: vec![labels_per_sample; n],
        info:         (0..n).map(|i| format!("{tag}{i}|folder|signer|GLOSS")).collect(),
    }
}

pub fn seq_weights() -> LossWeights {
    [("SeqCTC".to_string(), 1.0)].into_iter().collect()
}

// ─── Loader ───────────────────────────────────────────────────────────────────
pub struct FakeLoader {
    pub batches:     Vec<SignBatch>,
    pub dataset_len: usize,
}

impl FakeLoader {
    pub fn new(batches: Vec<SignBatch>) -> Self {
        let dataset_len = batches.iter().map(SignBatch::len).sum();
        Self { batches, dataset_len }
    }
}

impl BatchSource for FakeLoader {
    fn num_batches(&self) -> usize {
        self.batches.len()
    }

    fn dataset_len(&self) -> usize {
        self.dataset_len
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Result<SignBatch>> + '_> {
        Box::new(self.batches.iter().cloned().map(Ok))
    }
}

// ─── Device ───────────────────────────────────────────────────────────────────
#[derive(Default)]
pub struct FakeDevice {
    pub transfers:    Cell<usize>,
    pub cache_clears: Cell<usize>,
}

impl ComputeDevice for FakeDevice {
    type Resident = SignBatch;

    fn data_to_device(&self, batch: &SignBatch) -> Result<SignBatch> {
        self.transfers.set(self.transfers.get() + 1);
        Ok(batch.clone())
    }

    fn empty_cache(&self) {
        self.cache_clears.set(self.cache_clears.get() + 1);
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
pub struct FakeOutput {
    logits:     Array3<f32>,
    sents:      Vec<Hypothesis>,
    batch_size: usize,
}

impl RecognitionOutput for FakeOutput {
    fn sequence_logits(&self) -> Result<Array3<f32>> {
        Ok(self.logits.clone())
    }

    fn recognized_sents(&self) -> &[Hypothesis] {
        &self.sents
    }

    fn framewise_features(&self, sample: usize, frames: usize) -> Result<Array2<f32>> {
        anyhow::ensure!(sample < self.batch_size, "sample {sample} out of range");
        Ok(Array2::from_elem((frames, FEATURE_DIM), sample as f32))
    }
}

impl ScalarLoss for f64 {
    fn item(&self) -> f64 {
        *self
    }
}

pub struct FakeModel {
    losses:            RefCell<VecDeque<f64>>,
    pub forward_calls: Cell<usize>,
    /// Forward call indices (0-based) that fail with out-of-memory
    pub oom_calls:     HashSet<usize>,
    pub training:      bool,
    pub component:     String,
}

impl FakeModel {
    pub fn with_losses(losses: Vec<f64>) -> Self {
        Self {
            losses:        RefCell::new(losses.into()),
            forward_calls: Cell::new(0),
            oom_calls:     HashSet::new(),
            training:      false,
            component:     "SeqCTC".to_string(),
        }
    }
}

impl SequenceRecognizer for FakeModel {
    type Input  = SignBatch;
    type Output = FakeOutput;
    type Loss   = f64;

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&self, input: &SignBatch) -> Result<FakeOutput> {
        let call = self.forward_calls.get();
        self.forward_calls.set(call + 1);
        if self.oom_calls.contains(&call) {
            return Err(DeviceError::OutOfMemory(format!("forward call {call}")).into());
        }
        let frames = input.video_length.iter().copied().max().unwrap_or(0);
        let sents = input
            .info
            .iter()
            .map(|info| vec![RecognizedGloss::new(sample_name(info).to_uppercase(), 0)])
            .collect();
        Ok(FakeOutput {
            logits:     Array3::zeros((frames, input.len(), NUM_CLASSES)),
            sents,
            batch_size: input.len(),
        })
    }

    fn criterion_calculation(&self, _output: &FakeOutput, _input: &SignBatch) -> Result<(f64, LossRecord)> {
        let loss = self.losses.borrow_mut().pop_front().unwrap_or(1.0);
        let record = [(self.component.clone(), loss)].into_iter().collect();
        Ok((loss, record))
    }
}

// ─── Optimizer ────────────────────────────────────────────────────────────────
#[derive(Default)]
pub struct FakeOptimizer {
    pub steps:           usize,
    pub backwards:       usize,
    pub zero_grads:      usize,
    pub scheduler_steps: usize,
    /// Report non-finite gradients on every backward
    pub overflow:        bool,
    pub last_scale:      Option<f64>,
}

impl TrainingOptimizer<FakeModel> for FakeOptimizer {
    fn zero_grad(&mut self) {
        self.zero_grads += 1;
    }

    fn param_group_lrs(&self) -> Vec<f64> {
        vec![1e-4]
    }

    fn backward(&mut self, _model: &FakeModel, _loss: f64, scale: f64) -> Result<bool> {
        self.backwards += 1;
        self.last_scale = Some(scale);
        Ok(!self.overflow)
    }

    fn step(&mut self, _model: &mut FakeModel) -> Result<()> {
        self.steps += 1;
        Ok(())
    }

    fn scheduler_step(&mut self) {
        self.scheduler_steps += 1;
    }
}
