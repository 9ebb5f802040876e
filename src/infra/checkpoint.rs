// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the best model using Burn's CompactRecorder.
//
// What gets saved per snapshot:
//   1. model.mpk.gz  — all learned parameters
//   2. optim.mpk.gz  — optimizer state, so a run can be resumed
//   3. config.json   — the run's TrainConfig, so `eval` can
//                      rebuild the exact model architecture
//
// File layout:
//   output/
//     best_model/
//       model.mpk.gz
//       optim.mpk.gz
//       config.json
//
// A snapshot is written into output/.best_model.partial first
// and only then swapped into place, so a crash mid-write never
// leaves a half-written best_model behind. If the process dies
// between the two renames the previous snapshot is left in
// output/.best_model.old and is restored on the next save.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Record, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;

/// Record name (without extension) of the model parameters
pub const MODEL_RECORD: &str = "model";

/// Record name (without extension) of the optimizer state
pub const OPTIM_RECORD: &str = "optim";

/// Run configuration stored next to the records
pub const CONFIG_FILE: &str = "config.json";

/// Extension CompactRecorder appends to every record
pub const RECORD_EXTENSION: &str = "mpk.gz";

const BEST_DIR:    &str = "best_model";
const STAGING_DIR: &str = ".best_model.partial";
const RETIRED_DIR: &str = ".best_model.old";

/// Owns the output directory and writes best-model snapshots into it.
pub struct CheckpointManager {
    /// Root output directory (`output` by default)
    dir: PathBuf,

    /// Serialised run config written into every snapshot
    config_json: Option<String>,
}

impl CheckpointManager {
    /// Nothing is created on disk until the first snapshot.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), config_json: None }
    }

    /// Store `cfg` as config.json inside every snapshot.
    pub fn with_run_config(mut self, cfg: &TrainConfig) -> Result<Self> {
        self.config_json = Some(serde_json::to_string_pretty(cfg)?);
        Ok(self)
    }

    /// Directory holding the current best snapshot.
    pub fn best_dir(&self) -> PathBuf {
        self.dir.join(BEST_DIR)
    }

    /// Replace the best snapshot with whatever `write` puts in the directory
    /// it is given. Returns the final snapshot directory.
    pub fn save_best<F>(&self, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create output dir '{}'", self.dir.display()))?;

        let best    = self.best_dir();
        let staging = self.dir.join(STAGING_DIR);
        let retired = self.dir.join(RETIRED_DIR);

        // A previous run died between the two renames below
        if !best.exists() && retired.exists() {
            tracing::warn!("Restoring interrupted snapshot from '{}'", retired.display());
            fs::rename(&retired, &best)?;
        }

        remove_dir_if_exists(&staging)?;
        remove_dir_if_exists(&retired)?;
        fs::create_dir_all(&staging)
            .with_context(|| format!("Cannot create '{}'", staging.display()))?;

        let written = write(&staging).and_then(|()| self.write_config(&staging));
        if let Err(err) = written {
            // Leave the existing best snapshot untouched
            let _ = fs::remove_dir_all(&staging);
            return Err(err.context("Failed to write checkpoint snapshot"));
        }

        if best.exists() {
            fs::rename(&best, &retired)
                .with_context(|| format!("Cannot move aside '{}'", best.display()))?;
        }
        fs::rename(&staging, &best)
            .with_context(|| format!("Cannot move snapshot into '{}'", best.display()))?;
        remove_dir_if_exists(&retired)?;

        tracing::debug!("Snapshot written to '{}'", best.display());
        Ok(best)
    }

    fn write_config(&self, dir: &Path) -> Result<()> {
        if let Some(json) = &self.config_json {
            let path = dir.join(CONFIG_FILE);
            fs::write(&path, json)
                .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        }
        Ok(())
    }

    /// Load the run config stored in a snapshot directory.
    pub fn load_config(dir: &Path) -> Result<TrainConfig> {
        let path = dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Has a training run saved a checkpoint there?",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed run config '{}'", path.display()))
    }
}

// ─── Record helpers ───────────────────────────────────────────────────────────

/// CompactRecorder appends its own extension, so accept both
/// `dir/model` and `dir/model.mpk.gz` and return the former.
pub fn record_stem(path: &Path) -> PathBuf {
    let suffix = format!(".{RECORD_EXTENSION}");
    match path.to_str().and_then(|s| s.strip_suffix(&suffix)) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

/// True when the record file for `stem` exists on disk.
pub fn record_exists(stem: &Path) -> bool {
    record_file(stem).is_file()
}

/// The on-disk file CompactRecorder uses for `stem`.
/// Like the recorder, this replaces any extension `stem` already has.
pub fn record_file(stem: &Path) -> PathBuf {
    stem.with_extension(RECORD_EXTENSION)
}

/// Serialise any Burn record (module or optimizer) to `stem`.
pub fn save_record<B: Backend, R: Record<B>>(record: R, stem: &Path) -> Result<()> {
    let recorder = CompactRecorder::new();
    <CompactRecorder as Recorder<B>>::record(&recorder, record, stem.to_path_buf())
        .with_context(|| format!("Failed to save record to '{}'", stem.display()))?;
    Ok(())
}

/// Deserialise a Burn record previously written with `save_record`.
pub fn load_record<B: Backend, R: Record<B>>(stem: &Path, device: &B::Device) -> Result<R> {
    let recorder = CompactRecorder::new();
    <CompactRecorder as Recorder<B>>::load(&recorder, stem.to_path_buf(), device)
        .with_context(|| format!("Cannot load record '{}'", record_file(stem).display()))
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Cannot remove '{}'", dir.display()))?;
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write_marker(dir: &Path, text: &str) -> Result<()> {
        fs::write(dir.join("marker.txt"), text)?;
        Ok(())
    }

    #[test]
    fn test_save_best_creates_snapshot() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path().join("output"));

        let best = ckpt.save_best(|dir| write_marker(dir, "epoch 1")).unwrap();
        assert_eq!(best, tmp.path().join("output").join("best_model"));
        assert_eq!(fs::read_to_string(best.join("marker.txt")).unwrap(), "epoch 1");
        assert!(!tmp.path().join("output").join(STAGING_DIR).exists());
        assert!(!tmp.path().join("output").join(RETIRED_DIR).exists());
    }

    #[test]
    fn test_save_best_overwrites_previous() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());

        ckpt.save_best(|dir| {
            write_marker(dir, "old")?;
            fs::write(dir.join("stale.txt"), "x")?;
            Ok(())
        })
        .unwrap();
        let best = ckpt.save_best(|dir| write_marker(dir, "new")).unwrap();

        assert_eq!(fs::read_to_string(best.join("marker.txt")).unwrap(), "new");
        // Snapshots replace each other wholesale
        assert!(!best.join("stale.txt").exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_snapshot() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());

        ckpt.save_best(|dir| write_marker(dir, "good")).unwrap();
        let result = ckpt.save_best(|dir| {
            write_marker(dir, "half")?;
            anyhow::bail!("disk full")
        });

        assert!(result.is_err());
        let best = ckpt.best_dir();
        assert_eq!(fs::read_to_string(best.join("marker.txt")).unwrap(), "good");
        assert!(!tmp.path().join(STAGING_DIR).exists());
    }

    #[test]
    fn test_interrupted_swap_is_recovered() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());

        // Simulate a crash after best_model was moved aside
        let retired = tmp.path().join(RETIRED_DIR);
        fs::create_dir_all(&retired).unwrap();
        write_marker(&retired, "survivor").unwrap();

        let result = ckpt.save_best(|_| anyhow::bail!("fail again"));
        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(ckpt.best_dir().join("marker.txt")).unwrap(),
            "survivor"
        );
    }

    #[test]
    fn test_config_roundtrip_in_snapshot() {
        let tmp  = tempfile::tempdir().unwrap();
        let cfg  = TrainConfig { max_epochs: 7, ..TrainConfig::default() };
        let ckpt = CheckpointManager::new(tmp.path()).with_run_config(&cfg).unwrap();

        let best   = ckpt.save_best(|_| Ok(())).unwrap();
        let loaded = CheckpointManager::load_config(&best).unwrap();
        assert_eq!(loaded.max_epochs, 7);
    }

    #[test]
    fn test_record_stem_strips_extension() {
        assert_eq!(record_stem(Path::new("out/model.mpk.gz")), PathBuf::from("out/model"));
        assert_eq!(record_stem(Path::new("out/model")), PathBuf::from("out/model"));
        assert_eq!(record_file(Path::new("out/model")), PathBuf::from("out/model.mpk.gz"));
    }
}
