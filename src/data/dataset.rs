// ============================================================
// Layer 4 — Rawframe Dataset
// ============================================================
// Implements Burn's Dataset trait over an annotation list.
// Nothing is decoded up front: every get(index) runs the
// transform pipeline on that video's frames from disk.
//
// Randomness (clip offsets, crop window, flip) comes from a
// StdRng seeded with the run seed, so with a single loader
// worker a fixed seed reproduces the same augmentations.
//
// A video that fails to load (missing or corrupt frame) does
// not abort the epoch: the failure is logged, counted, and the
// next loadable video in the list is used in its place. Burn's
// loader stops at the first None, so an in-range index only
// yields None when no video in the list loads at all; callers
// rule that out up front with check_loadable.

use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::data::annotation::{load_annotations, FrameRecord};
use crate::data::error::{DataError, DataResult};
use crate::data::pipeline::Pipeline;
use crate::domain::clip::{ClipItem, ClipPrediction};
use crate::infra::metrics::{evaluate, EvalReport, Metric};

pub struct RawframeDataset {
    records:     Vec<FrameRecord>,
    pipeline:    Pipeline,
    data_prefix: PathBuf,
    test_mode:   bool,
    rng:         Mutex<StdRng>,
    failures:    AtomicUsize,
}

impl RawframeDataset {
    /// Parse `ann_file` and prepare lazy access through `pipeline`.
    pub fn new(
        ann_file:    &Path,
        pipeline:    Pipeline,
        data_prefix: impl Into<PathBuf>,
        test_mode:   bool,
        seed:        u64,
    ) -> DataResult<Self> {
        let records = load_annotations(ann_file)?;
        Ok(Self::from_records(records, pipeline, data_prefix, test_mode, seed))
    }

    pub fn from_records(
        records:     Vec<FrameRecord>,
        pipeline:    Pipeline,
        data_prefix: impl Into<PathBuf>,
        test_mode:   bool,
        seed:        u64,
    ) -> Self {
        Self {
            records,
            pipeline,
            data_prefix: data_prefix.into(),
            test_mode,
            rng:         Mutex::new(StdRng::seed_from_u64(seed)),
            failures:    AtomicUsize::new(0),
        }
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Examples that failed to load since construction.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Run the pipeline for exactly `index`, surfacing any error.
    pub fn load(&self, index: usize) -> DataResult<Option<ClipItem>> {
        let Some(record) = self.records.get(index) else {
            return Ok(None);
        };
        // Draw a per-example seed so the lock is not held while decoding
        let seed = match self.rng.lock() {
            Ok(mut rng) => rng.next_u64(),
            Err(poisoned) => poisoned.into_inner().next_u64(),
        };
        let mut rng = StdRng::seed_from_u64(seed);
        self.pipeline
            .run(record, &self.data_prefix, &mut rng)
            .map(Some)
    }

    /// Fail unless at least one video in the list loads.
    /// Uses its own rng so the seeded augmentation stream is untouched.
    pub fn check_loadable(&self) -> DataResult<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        let mut rng = StdRng::seed_from_u64(0);
        let mut last_err = None;
        for record in &self.records {
            match self.pipeline.run(record, &self.data_prefix, &mut rng) {
                Ok(_) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(DataError::NothingLoadable {
            count:  self.records.len(),
            source: Box::new(last_err.unwrap_or(DataError::EmptyVideo {
                frame_dir: self.data_prefix.clone(),
            })),
        })
    }

    /// Score predictions made over this dataset.
    pub fn evaluate(
        &self,
        results: &[ClipPrediction],
        metrics: &[Metric],
    ) -> anyhow::Result<EvalReport> {
        evaluate(results, metrics)
    }
}

impl Dataset<ClipItem> for RawframeDataset {
    fn get(&self, index: usize) -> Option<ClipItem> {
        let len = self.records.len();
        if index >= len {
            return None;
        }

        for attempt in 0..len {
            let candidate = (index + attempt) % len;
            match self.load(candidate) {
                Ok(item) => return item,
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Skipping example {} ({}): {}",
                        candidate,
                        self.records[candidate].frame_dir.display(),
                        err
                    );
                }
            }
        }

        tracing::error!("No loadable example left for index {}", index);
        None
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pipeline::{frame_file_name, PipelineConfig};
    use image::{Rgb, RgbImage};
    use std::fs;

    fn write_video(root: &Path, name: &str, frames: usize) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for idx in 0..frames {
            RgbImage::from_pixel(12, 10, Rgb([idx as u8 * 10, 0, 0]))
                .save(dir.join(frame_file_name(idx)))
                .unwrap();
        }
    }

    fn tiny_cfg() -> PipelineConfig {
        PipelineConfig {
            clip_len:      4,
            resize_height: 10,
            resize_width:  12,
            crop_size:     8,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_dataset_reads_annotation_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_video(tmp.path(), "a", 6);
        write_video(tmp.path(), "b", 6);
        let ann = tmp.path().join("list.txt");
        fs::write(&ann, "a 6 0\nb 6 1\n").unwrap();

        let ds = RawframeDataset::new(&ann, Pipeline::val(&tiny_cfg()), tmp.path(), true, 1).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.test_mode());
        let item = ds.get(1).unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.shape, [1, 3, 4, 8, 8]);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_broken_example_is_substituted() {
        let tmp = tempfile::tempdir().unwrap();
        write_video(tmp.path(), "good", 6);
        let records = vec![
            FrameRecord { frame_dir: "missing".into(), total_frames: 6, label: 4 },
            FrameRecord { frame_dir: "good".into(),    total_frames: 6, label: 2 },
        ];
        let ds = RawframeDataset::from_records(records, Pipeline::val(&tiny_cfg()), tmp.path(), true, 0);

        let item = ds.get(0).unwrap();
        assert_eq!(item.label, 2);
        assert_eq!(ds.failures(), 1);
        assert!(ds.load(0).is_err());
    }

    #[test]
    fn test_all_broken_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let records = vec![FrameRecord { frame_dir: "nope".into(), total_frames: 3, label: 0 }];
        let ds = RawframeDataset::from_records(records, Pipeline::val(&tiny_cfg()), tmp.path(), true, 0);
        assert!(ds.get(0).is_none());
        assert!(matches!(ds.check_loadable(), Err(DataError::NothingLoadable { count: 1, .. })));
    }

    #[test]
    fn test_long_broken_run_is_bridged() {
        let tmp = tempfile::tempdir().unwrap();
        write_video(tmp.path(), "good", 6);
        let mut records: Vec<FrameRecord> = (0..15)
            .map(|i| FrameRecord { frame_dir: format!("missing{i}").into(), total_frames: 6, label: 0 })
            .collect();
        records.push(FrameRecord { frame_dir: "good".into(), total_frames: 6, label: 3 });
        let ds = RawframeDataset::from_records(records, Pipeline::val(&tiny_cfg()), tmp.path(), true, 0);

        assert!(ds.check_loadable().is_ok());
        assert_eq!(ds.get(0).unwrap().label, 3);
        assert_eq!(ds.failures(), 15);
    }

    #[test]
    fn test_check_loadable_keeps_seeded_stream() {
        let tmp = tempfile::tempdir().unwrap();
        write_video(tmp.path(), "v", 20);
        let records = vec![FrameRecord { frame_dir: "v".into(), total_frames: 20, label: 0 }];
        let make = || {
            RawframeDataset::from_records(records.clone(), Pipeline::train(&tiny_cfg()), tmp.path(), false, 7)
        };
        let (checked, plain) = (make(), make());
        checked.check_loadable().unwrap();
        assert_eq!(checked.get(0).unwrap().imgs, plain.get(0).unwrap().imgs);
    }

    #[test]
    fn test_same_seed_same_augmentation() {
        let tmp = tempfile::tempdir().unwrap();
        write_video(tmp.path(), "v", 20);
        let records = vec![FrameRecord { frame_dir: "v".into(), total_frames: 20, label: 0 }];

        let make = || {
            RawframeDataset::from_records(
                records.clone(),
                Pipeline::train(&tiny_cfg()),
                tmp.path(),
                false,
                1234,
            )
        };
        let (a, b) = (make(), make());
        for _ in 0..3 {
            assert_eq!(a.get(0).unwrap().imgs, b.get(0).unwrap().imgs);
        }
    }

    #[test]
    fn test_missing_annotation_file() {
        let result = RawframeDataset::new(
            Path::new("/no/such/list.txt"),
            Pipeline::val(&tiny_cfg()),
            "/no/such",
            true,
            0,
        );
        assert!(result.is_err());
    }
}
