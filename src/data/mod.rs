// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from an annotation list and a
// directory of extracted frames all the way to tensor batches.
//
// The pipeline flows in this order:
//
//   split list (.txt)
//       │
//       ▼
//   annotation        → parses `frame_dir total_frames label`
//       │
//       ▼
//   RawframeDataset   → implements Burn's Dataset trait,
//       │               runs the transform pipeline per access
//       ▼
//   pipeline          → SampleFrames … Collect → ClipItem
//       │
//       ▼
//   ClipBatcher       → stacks ClipItems into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Parses rawframe split lists
pub mod annotation;

/// Per-example data errors
pub mod error;

/// Declarative clip transform stages
pub mod pipeline;

/// Implements Burn's Dataset trait for rawframe videos
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Burn DataLoader wrapped as a batch / evaluation source
pub mod loader;
