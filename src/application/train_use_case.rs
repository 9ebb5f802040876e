// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration  (Layer 2)
//   Step 2: Build transform pipelines   (Layer 4 - data)
//   Step 3: Build train / val datasets  (Layer 4 - data)
//   Step 4: Prepare checkpoint output   (Layer 6 - infra)
//   Step 5: Run training loop           (Layer 5 - ml)
//
// Dataset layout under dataset_root:
//
//   ucf101_train_split_1_rawframes.txt
//   ucf101_val_split_1_rawframes.txt
//   rawframes/<class>/<video>/img_00001.jpg ...
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::{
    annotation::FrameRecord,
    dataset::RawframeDataset,
    pipeline::{Pipeline, PipelineConfig},
};
use crate::infra::checkpoint::{record_exists, record_file, record_stem, CheckpointManager, MODEL_RECORD};
use crate::ml::{
    lr_schedule::LrPolicy,
    model::{C3dConfig, I3dHeadConfig, Recognizer3dConfig},
    trainer::{run_training, TrainReport},
};

/// Directory of extracted frames under dataset_root
pub const FRAMES_DIR: &str = "rawframes";

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved next to the best checkpoint
// and reloaded by `eval` to rebuild the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset_root:  String,
    pub train_list:    String,
    pub val_list:      String,
    pub pretrained:    Option<String>,
    pub resume:        Option<String>,
    /// Epochs already completed when resuming; -1 or 0 for a fresh run
    pub last_epoch:    i64,
    pub batch_size:    usize,
    pub max_epochs:    usize,
    pub log_iters:     usize,
    pub seed:          u64,
    pub lr:            f64,
    pub lr_policy:     LrPolicy,
    pub warmup_epochs: usize,
    pub milestones:    Vec<usize>,
    pub gamma:         f64,
    pub weight_decay:  f64,
    pub momentum:      Option<f64>,
    pub num_classes:   usize,
    pub num_workers:   usize,
    pub output_dir:    String,
    pub base_channels: usize,
    pub fc_dim:        usize,
    pub dropout_ratio: f64,
    pub pipeline:      PipelineConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_root:  "data/ucf101".to_string(),
            train_list:    "ucf101_train_split_1_rawframes.txt".to_string(),
            val_list:      "ucf101_val_split_1_rawframes.txt".to_string(),
            pretrained:    None,
            resume:        None,
            last_epoch:    -1,
            batch_size:    32,
            max_epochs:    100,
            log_iters:     10,
            seed:          1234,
            lr:            1.25e-4,
            lr_policy:     LrPolicy::WarmupCosine,
            warmup_epochs: 2,
            milestones:    vec![20, 40],
            gamma:         0.1,
            weight_decay:  5e-4,
            momentum:      None,
            num_classes:   101,
            num_workers:   0,
            output_dir:    "output".to_string(),
            base_channels: 64,
            fc_dim:        4096,
            dropout_ratio: 0.5,
            pipeline:      PipelineConfig::default(),
        }
    }
}

// ─── Configuration Errors ────────────────────────────────────────────────────
/// Problems detected before any data is loaded or any compute runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{name}` must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("learning rate must be a positive number, got {0}")]
    BadLearningRate(f64),

    #[error("flip ratio must be within [0, 1], got {0}")]
    BadFlipRatio(f64),

    #[error("{what} not found: '{}'", path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("{what} record not found: '{}'", path.display())]
    MissingRecord { what: &'static str, path: PathBuf },

    #[error("{list} has label {label} for '{}', but num_classes is {num_classes}", frame_dir.display())]
    LabelOutOfRange { list: &'static str, frame_dir: PathBuf, label: usize, num_classes: usize },
}

impl TrainConfig {
    /// Number of epochs a previous run already finished.
    pub fn completed_epochs(&self) -> usize {
        self.last_epoch.max(0) as usize
    }

    pub fn train_ann_file(&self) -> PathBuf {
        Path::new(&self.dataset_root).join(&self.train_list)
    }

    pub fn val_ann_file(&self) -> PathBuf {
        Path::new(&self.dataset_root).join(&self.val_list)
    }

    pub fn data_prefix(&self) -> PathBuf {
        Path::new(&self.dataset_root).join(FRAMES_DIR)
    }

    /// The recognizer architecture this run trains.
    pub fn model_config(&self) -> Recognizer3dConfig {
        let backbone = C3dConfig::new()
            .with_base_channels(self.base_channels)
            .with_fc_dim(self.fc_dim)
            .with_dropout_ratio(self.dropout_ratio);
        let cls_head = I3dHeadConfig::new(self.num_classes, self.fc_dim)
            .with_dropout_ratio(self.dropout_ratio);
        Recognizer3dConfig::new(backbone, cls_head)
    }

    /// Checks that need nothing but the config values themselves.
    pub fn validate_values(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("max_epochs", self.max_epochs),
            ("log_iters", self.log_iters),
            ("num_classes", self.num_classes),
            ("base_channels", self.base_channels),
            ("fc_dim", self.fc_dim),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive { name });
            }
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(ConfigError::BadLearningRate(self.lr));
        }
        if !(0.0..=1.0).contains(&self.pipeline.flip_ratio) {
            return Err(ConfigError::BadFlipRatio(self.pipeline.flip_ratio));
        }
        Ok(())
    }

    /// Every annotation label must index a class of the head.
    pub fn check_labels(&self, list: &'static str, records: &[FrameRecord]) -> Result<(), ConfigError> {
        match records.iter().find(|r| r.label >= self.num_classes) {
            Some(r) => Err(ConfigError::LabelOutOfRange {
                list,
                frame_dir:   r.frame_dir.clone(),
                label:       r.label,
                num_classes: self.num_classes,
            }),
            None => Ok(()),
        }
    }

    /// Full validation, including every file the run will read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_values()?;

        let root = Path::new(&self.dataset_root);
        if !root.is_dir() {
            return Err(ConfigError::MissingPath { what: "dataset root", path: root.to_path_buf() });
        }
        for (what, path) in [("train list", self.train_ann_file()), ("val list", self.val_ann_file())] {
            if !path.is_file() {
                return Err(ConfigError::MissingPath { what, path });
            }
        }

        if let Some(dir) = &self.resume {
            let stem = Path::new(dir).join(MODEL_RECORD);
            if !record_exists(&stem) {
                return Err(ConfigError::MissingRecord { what: "resume", path: record_file(&stem) });
            }
        }
        if let Some(path) = &self.pretrained {
            let stem = record_stem(Path::new(path));
            if !record_exists(&stem) {
                return Err(ConfigError::MissingRecord { what: "pretrained", path: record_file(&stem) });
            }
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        // Fail fast on bad values or missing files, before any compute
        cfg.validate()?;
        if cfg.resume.is_none() && cfg.completed_epochs() > 0 {
            tracing::warn!(
                "last_epoch={} without --resume: starting from fresh weights at epoch {}",
                cfg.last_epoch,
                cfg.completed_epochs() + 1
            );
        }

        // ── Step 2: Transform pipelines ──────────────────────────────────────
        let train_pipeline = Pipeline::train(&cfg.pipeline);
        let val_pipeline   = Pipeline::val(&cfg.pipeline);

        // ── Step 3: Datasets ─────────────────────────────────────────────────
        // Annotation lists are parsed here; frames are decoded lazily,
        // apart from one trial load per list to catch an empty frame tree
        let train_dataset = RawframeDataset::new(
            &cfg.train_ann_file(),
            train_pipeline,
            cfg.data_prefix(),
            false,
            cfg.seed,
        )?;
        let val_dataset = RawframeDataset::new(
            &cfg.val_ann_file(),
            val_pipeline,
            cfg.data_prefix(),
            true,
            cfg.seed,
        )?;
        cfg.check_labels("train list", train_dataset.records())?;
        cfg.check_labels("val list", val_dataset.records())?;
        train_dataset.check_loadable()?;
        val_dataset.check_loadable()?;
        tracing::info!(
            "Datasets: {} train, {} validation videos",
            train_dataset.records().len(),
            val_dataset.records().len()
        );

        // ── Step 4: Checkpoint output ────────────────────────────────────────
        // The run config travels with every snapshot so `eval` can
        // rebuild the exact architecture
        let ckpt_manager = CheckpointManager::new(&cfg.output_dir).with_run_config(cfg)?;

        // ── Step 5: Run training loop (Layer 5) ──────────────────────────────
        run_training(cfg, train_dataset, val_dataset, ckpt_manager)
    }
}
