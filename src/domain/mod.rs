// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define what flows through
// the training run.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain data and the capability traits the trainer
//     is written against
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Example records and prediction results
pub mod clip;

// Capabilities the training driver depends on
pub mod traits;
