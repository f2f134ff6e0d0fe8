// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a dataset manifest to host-side batches.
//
// The pipeline flows in this order:
//
//   <mode>_info.json + per-sample .npy frames
//       │
//       ▼
//   GlossDict         → gloss annotation → class ids
//       │
//       ▼
//   SignDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   SignBatcher       → sorts, pads and stacks samples
//       │
//       ▼
//   SignLoader        → one pass per iter(), optional shuffle
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Gloss ↔ class id mapping
pub mod gloss_dict;

/// Implements Burn's Dataset trait over a JSON manifest
pub mod dataset;

/// Collates samples into a SignBatch
pub mod batcher;

/// Batches a dataset for the training and evaluation loops
pub mod loader;
