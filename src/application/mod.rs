// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training, evaluation, feature extraction).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Filesystem work goes through Layer 6 stores
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The epoch-level loops every workflow is built from
pub mod seq_scripts;

// The training workflow and its configuration
pub mod train_use_case;

// Evaluation, feature extraction and scoring of a trained run
pub mod eval_use_case;
