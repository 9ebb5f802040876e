// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training driver never touches Burn directly. It only
// talks to these three capabilities:
//
//   TrainSession — "given a batch, take one optimisation step"
//                  and "given a batch, produce class scores"
//   BatchSource  — "give me this epoch's batches"
//   EvalSource   — a BatchSource that can also score results
//
// The Burn-backed implementations live in Layer 5 (ml::session).
// Tests drive the trainer with small in-memory mocks instead.

use anyhow::Result;
use std::path::Path;

use crate::domain::clip::ClipPrediction;
use crate::infra::metrics::EvalReport;

// ─── LogVars ──────────────────────────────────────────────────────────────────
/// Plain-number metrics reported by one training step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogVars {
    pub loss:     f64,
    pub top1_acc: f64,
}

// ─── TrainSession ─────────────────────────────────────────────────────────────
/// A recognizer together with its optimizer state.
///
/// Implementations:
///   - BurnSession → C3D backbone + I3D head on a Burn autodiff backend
pub trait TrainSession {
    type TrainBatch;
    type EvalBatch;

    /// Forward, loss, backward and one optimizer update at learning rate `lr`.
    /// Gradients are consumed by the update, nothing carries over.
    fn train_step(&mut self, batch: Self::TrainBatch, lr: f64) -> Result<LogVars>;

    /// Inference-mode scores for every example in the batch (no gradients).
    fn predict(&self, batch: Self::EvalBatch) -> Result<Vec<ClipPrediction>>;

    /// Write model parameters and optimizer state into `dir`.
    fn save(&self, dir: &Path) -> Result<()>;
}

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A re-iterable source of batches, one pass per epoch.
pub trait BatchSource {
    type Batch;

    /// Number of batches one pass yields.
    fn num_batches(&self) -> usize;

    /// A fresh pass over the data.
    fn batches(&self) -> Box<dyn Iterator<Item = Self::Batch> + '_>;

    /// Number of examples in `batch`, used to weight throughput.
    fn samples_in(&self, batch: &Self::Batch) -> usize;
}

// ─── EvalSource ───────────────────────────────────────────────────────────────
/// Validation data that knows how to score its own predictions.
pub trait EvalSource: BatchSource {
    fn evaluate(&self, results: &[ClipPrediction]) -> Result<EvalReport>;
}
