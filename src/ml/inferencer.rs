// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads a saved best_model snapshot and scores it against an
// evaluation set. Runs on a plain (non-autodiff) backend: no
// gradients are ever needed here.
use anyhow::Result;
use burn::prelude::*;
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::ClipBatch;
use crate::domain::traits::EvalSource;
use crate::infra::{
    checkpoint::{load_record, MODEL_RECORD},
    metrics::EvalReport,
};
use crate::ml::{
    model::{ModelRecord, Recognizer3d},
    session::predict_clips,
};

/// Backend the `eval` command runs on
pub type InferBackend = burn::backend::Wgpu;

pub struct Inferencer<B: Backend> {
    model: Recognizer3d<B>,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: Recognizer3d<B>) -> Self {
        Self { model }
    }

    /// Rebuild the architecture described by `cfg` and load the
    /// weights stored in snapshot directory `dir`.
    pub fn from_checkpoint(dir: &Path, cfg: &TrainConfig, device: &B::Device) -> Result<Self> {
        let model: Recognizer3d<B> = cfg.model_config().init(device);
        let record: ModelRecord<B> = load_record::<B, _>(&dir.join(MODEL_RECORD), device)?;
        tracing::info!("Model loaded from checkpoint '{}'", dir.display());
        Ok(Self { model: model.load_record(record) })
    }

    /// Predict every batch of `source` and score the results.
    pub fn evaluate<S>(&self, source: &S) -> Result<EvalReport>
    where
        S: EvalSource<Batch = ClipBatch<B>>,
    {
        let mut results = Vec::with_capacity(source.num_batches());
        for batch in source.batches() {
            results.extend(predict_clips(&self.model, batch)?);
        }
        tracing::debug!("Scored {} predictions", results.len());
        source.evaluate(&results)
    }
}
