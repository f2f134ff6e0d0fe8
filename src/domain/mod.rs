// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the concepts the
// training and evaluation loops work with.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only data types, traits and pure bookkeeping
//
// The orchestration in Layer 2 is written against the traits
// in `traits.rs`, so the loops can be driven by the Burn model
// in Layer 5 or by the lightweight fakes used in unit tests.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One collated batch as it comes out of the data loader
pub mod batch;

// Decoded glosses and sample identifiers
pub mod hypothesis;

// Named loss components and the per-interval accumulator
pub mod loss;

// Collaborator abstractions (model, device, optimizer, loader, evaluator)
pub mod traits;
