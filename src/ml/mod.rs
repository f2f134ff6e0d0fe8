// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// The loops in Layer 2 only see the Layer 3 traits; this layer
// implements them.
//
// What's in this layer:
//
//   model.rs     — reference gloss recognizer network and its
//                  SequenceRecognizer implementation
//                  • framewise features, two classifier heads
//                  • ConvCTC / SeqCTC / Dist loss components
//
//   ctc.rs       — CTC loss in tensor ops, greedy decoding
//
//   device.rs    — host batch → device tensors, OOM guard
//
//   optimizer.rs — AdamW + MultiStepLr behind TrainingOptimizer,
//                  gradient unscaling
//
//   scaler.rs    — dynamic loss scaling (framework-free)
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Graves et al. (2006) Connectionist Temporal Classification

pub mod ctc;

pub mod device;

/// Reference recognizer network
pub mod model;

pub mod optimizer;

/// Dynamic loss scaling
pub mod scaler;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

/// Backend with gradients, used for training
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;
