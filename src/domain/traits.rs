// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The loops in Layer 2 never touch Burn directly. They talk to
// five collaborators through the traits below:
//
//   BatchSource        — the data loader
//   ComputeDevice      — moves host batches onto the accelerator
//   SequenceRecognizer — the trainable model (forward + loss)
//   TrainingOptimizer  — backward, parameter update, LR schedule
//   WerEvaluator       — scores a hypothesis file
//
// Layer 5 implements them on top of Burn; the unit tests
// implement them with counters so loop behaviour (steps taken,
// batches skipped, forward calls made) can be asserted directly.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use ndarray::{Array2, Array3};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::batch::SignBatch;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::loss::LossRecord;

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// Anything that yields collated batches for one pass over a dataset.
pub trait BatchSource {
    /// Number of batches one pass produces
    fn num_batches(&self) -> usize;

    /// Number of samples in the underlying dataset
    fn dataset_len(&self) -> usize;

    /// Iterate one pass. Each item is a fully collated batch.
    fn iter(&self) -> Box<dyn Iterator<Item = Result<SignBatch>> + '_>;
}

// ─── ComputeDevice ────────────────────────────────────────────────────────────
/// The accelerator context, injected explicitly rather than global.
pub trait ComputeDevice {
    /// Device-resident form of a batch, consumed by the model
    type Resident;

    fn data_to_device(&self, batch: &SignBatch) -> Result<Self::Resident>;

    /// Ask the device to hand cached memory back after a batch
    fn empty_cache(&self) {}
}

// ─── Model outputs ────────────────────────────────────────────────────────────
/// What a forward pass exposes to the loops.
pub trait RecognitionOutput {
    /// Framewise class scores copied to host memory, [frames, batch, classes]
    fn sequence_logits(&self) -> Result<Array3<f32>>;

    /// Decoded hypothesis per sample (empty while training)
    fn recognized_sents(&self) -> &[Hypothesis];

    /// Framewise embedding of one sample, time-major [frames, dim],
    /// truncated to `frames` valid frames and detached from any graph
    fn framewise_features(&self, sample: usize, frames: usize) -> Result<Array2<f32>>;
}

/// A scalar loss handle that can be read back as a float.
pub trait ScalarLoss {
    fn item(&self) -> f64;
}

// ─── SequenceRecognizer ───────────────────────────────────────────────────────
/// The trainable sequence model.
pub trait SequenceRecognizer {
    type Input;
    type Output: RecognitionOutput;
    type Loss: ScalarLoss;

    /// Training mode skips decoding; evaluation mode decodes hypotheses
    fn set_training(&mut self, training: bool);

    /// Run the network. An accelerator allocation failure is reported
    /// as `DeviceError::OutOfMemory` so evaluation can skip the batch.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;

    /// Total weighted loss plus its named components
    fn criterion_calculation(
        &self,
        output: &Self::Output,
        input:  &Self::Input,
    ) -> Result<(Self::Loss, LossRecord)>;
}

// ─── TrainingOptimizer ────────────────────────────────────────────────────────
/// Optimizer plus learning-rate scheduler for a model `M`.
pub trait TrainingOptimizer<M: SequenceRecognizer> {
    /// Drop any gradients left over from a previous batch
    fn zero_grad(&mut self);

    /// Current learning rate of every parameter group
    fn param_group_lrs(&self) -> Vec<f64>;

    /// Back-propagate `loss * scale`, unscale the gradients and keep
    /// them pending. Returns `false` if any gradient is non-finite.
    fn backward(&mut self, model: &M, loss: M::Loss, scale: f64) -> Result<bool>;

    /// Apply the pending gradients to the model
    fn step(&mut self, model: &mut M) -> Result<()>;

    /// Advance the learning-rate schedule (once per epoch)
    fn scheduler_step(&mut self);
}

// ─── WerEvaluator ─────────────────────────────────────────────────────────────
/// Everything an evaluator needs to locate hypothesis and reference.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Directory the hypothesis file was written to
    pub prefix:          PathBuf,
    pub mode:            String,
    /// Hypothesis file name inside `prefix`
    pub output_file:     String,
    pub evaluate_dir:    PathBuf,
    pub evaluate_prefix: String,
    /// Report directory, relative to `prefix`
    pub output_dir:      String,
}

/// Scores a CTM hypothesis file against ground truth.
/// Returns a summary line of the form
/// "Percent Total Error       =  NN.NN%   (...)".
pub trait WerEvaluator {
    fn evaluate(&self, request: &EvaluationRequest) -> Result<String>;
}

// ─── DeviceError ──────────────────────────────────────────────────────────────
/// Accelerator failures the loops know how to recover from.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device out of memory: {0}")]
    OutOfMemory(String),
}

impl DeviceError {
    /// True if `err` (or anything it wraps) is an out-of-memory failure
    pub fn is_out_of_memory(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<DeviceError>(),
                Some(DeviceError::OutOfMemory(_))
            )
        })
    }
}
