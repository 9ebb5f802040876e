// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the trainer and use cases:
//
//   checkpoint.rs — Best-model snapshots
//                   Uses Burn's CompactRecorder to serialise
//                   model and optimizer records, plus the run
//                   config as JSON so `eval` can rebuild the
//                   model. Snapshots are swapped in atomically.
//
//   metrics.rs    — Validation scoring
//                   top1 / top5 / mean class accuracy over a
//                   full validation pass, and the best-accuracy
//                   watermark that decides when to snapshot.
//
//   timer.rs      — Running timing averages and ETA
//                   Reader cost, batch cost and throughput for
//                   the periodic [TRAIN] status line.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Best-model snapshot saving and record loading
pub mod checkpoint;

/// Evaluation metrics and best-accuracy tracking
pub mod metrics;

/// Timing averagers and ETA formatting
pub mod timer;
