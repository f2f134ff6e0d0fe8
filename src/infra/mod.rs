// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the loops:
//
//   checkpoint.rs       — network weights + run config (Burn CompactRecorder)
//   prediction_store.rs — per-batch logits and decoded predictions
//   feature_store.rs    — per-sample feature files + canonical symlink
//   ctm.rs              — CTM hypothesis file for the WER scorer
//   evaluator.rs        — edit-distance WER against an STM reference
//   recorder.rs         — log lines, log file, stopwatches
//   metrics.rs          — per-epoch CSV
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Rust Book §12 (I/O and File Handling)

pub mod checkpoint;

pub mod ctm;

pub mod evaluator;

pub mod feature_store;

pub mod metrics;

pub mod prediction_store;

pub mod recorder;
