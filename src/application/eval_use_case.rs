// ============================================================
// Layer 2 — Eval Use Case
// ============================================================
// Scores a saved best_model snapshot on a validation list:
//   1. Read the run config stored in the snapshot
//   2. Apply any dataset / batch overrides from the command line
//   3. Build the validation dataset with the run's pipeline
//   4. Load the weights and report every metric

use anyhow::Result;
use std::{path::PathBuf, sync::Arc};

use crate::data::{dataset::RawframeDataset, loader::ClipLoader, pipeline::Pipeline};
use crate::infra::{checkpoint::CheckpointManager, metrics::EvalReport};
use crate::ml::inferencer::{InferBackend, Inferencer};

pub struct EvalUseCase {
    checkpoint:   PathBuf,
    dataset_root: Option<String>,
    val_list:     Option<String>,
    batch_size:   Option<usize>,
}

impl EvalUseCase {
    pub fn new(
        checkpoint:   impl Into<PathBuf>,
        dataset_root: Option<String>,
        val_list:     Option<String>,
        batch_size:   Option<usize>,
    ) -> Self {
        Self { checkpoint: checkpoint.into(), dataset_root, val_list, batch_size }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let mut cfg = CheckpointManager::load_config(&self.checkpoint)?;
        if let Some(root) = &self.dataset_root {
            cfg.dataset_root = root.clone();
        }
        if let Some(list) = &self.val_list {
            cfg.val_list = list.clone();
        }
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        cfg.validate_values()?;

        let dataset = RawframeDataset::new(
            &cfg.val_ann_file(),
            Pipeline::val(&cfg.pipeline),
            cfg.data_prefix(),
            true,
            cfg.seed,
        )?;
        cfg.check_labels("val list", dataset.records())?;
        dataset.check_loadable()?;
        tracing::info!("Evaluating on {} videos from '{}'", dataset.records().len(), cfg.val_list);

        let device = burn::backend::wgpu::WgpuDevice::default();
        let inferencer = Inferencer::<InferBackend>::from_checkpoint(&self.checkpoint, &cfg, &device)?;
        let loader = ClipLoader::<InferBackend>::eval(Arc::new(dataset), device, cfg.batch_size, cfg.num_workers);

        let report = inferencer.evaluate(&loader)?;
        if loader.dataset().failures() > 0 {
            tracing::warn!("{} videos could not be loaded and were substituted", loader.dataset().failures());
        }
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let use_case = EvalUseCase::new(tmp.path(), None, None, None);
        let err = use_case.execute().unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_bad_batch_override_rejected_before_loading() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path())
            .with_run_config(&crate::application::train_use_case::TrainConfig::default())
            .unwrap();
        let dir = ckpt.save_best(|_| Ok(())).unwrap();

        let use_case = EvalUseCase::new(dir, None, None, Some(0));
        assert!(use_case.execute().is_err());
    }

    #[test]
    fn test_label_beyond_head_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = crate::application::train_use_case::TrainConfig { num_classes: 5, ..Default::default() };
        let dir = CheckpointManager::new(tmp.path().join("out"))
            .with_run_config(&cfg)
            .unwrap()
            .save_best(|_| Ok(()))
            .unwrap();
        std::fs::write(tmp.path().join("val.txt"), "a 8 9\n").unwrap();

        let use_case = EvalUseCase::new(
            dir,
            Some(tmp.path().to_string_lossy().into_owned()),
            Some("val.txt".to_string()),
            None,
        );
        let err = use_case.execute().unwrap_err();
        assert!(err.to_string().contains("num_classes is 5"));
    }
}
