// ============================================================
// Layer 4 — Transform Pipeline
// ============================================================
// Turns one annotated video into a model-ready ClipItem by
// running an ordered list of named stages over a ClipState.
//
// The stages, in the order the default pipelines use them:
//
//   SampleFrames    → choose which frame indices form each clip
//       │
//       ▼
//   RawFrameDecode  → load img_{:05}.jpg files as RGB images
//       │
//       ▼
//   Resize          → fixed height x width
//       │
//       ▼
//   RandomCrop /    → square crop, same window for every frame
//   CenterCrop
//       │
//       ▼
//   Flip            → horizontal flip with probability `ratio`
//       │
//       ▼
//   Normalize       → (pixel - mean) / std per channel → f32
//       │
//       ▼
//   FormatShape     → [clips, C, T, H, W]
//       │
//       ▼
//   Collect         → emit the ClipItem
//
// Training pipelines sample and crop randomly; validation
// pipelines sample centred offsets and centre-crop, so the
// same video always yields the same clip.
//
// Reference: Burn Book §4 (Datasets), image crate imageops

use image::{imageops, imageops::FilterType, RgbImage};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::annotation::FrameRecord;
use crate::data::error::{DataError, DataResult};
use crate::domain::clip::ClipItem;

/// Channels produced by RawFrameDecode
const CHANNELS: usize = 3;

// ─── Stage declarations ──────────────────────────────────────────────────────
/// One named pipeline stage and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    SampleFrames {
        clip_len:       usize,
        frame_interval: usize,
        num_clips:      usize,
        test_mode:      bool,
    },
    RawFrameDecode,
    Resize {
        height: u32,
        width:  u32,
    },
    RandomCrop {
        size: u32,
    },
    CenterCrop {
        size: u32,
    },
    Flip {
        ratio: f64,
    },
    Normalize {
        mean:   [f32; 3],
        std:    [f32; 3],
        to_bgr: bool,
    },
    FormatShape,
    Collect,
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::SampleFrames { .. } => "SampleFrames",
            Transform::RawFrameDecode      => "RawFrameDecode",
            Transform::Resize { .. }       => "Resize",
            Transform::RandomCrop { .. }   => "RandomCrop",
            Transform::CenterCrop { .. }   => "CenterCrop",
            Transform::Flip { .. }         => "Flip",
            Transform::Normalize { .. }    => "Normalize",
            Transform::FormatShape         => "FormatShape",
            Transform::Collect             => "Collect",
        }
    }
}

// ─── Pipeline configuration ──────────────────────────────────────────────────
/// Parameters shared by the train and validation pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub clip_len:       usize,
    pub frame_interval: usize,
    pub num_clips:      usize,
    pub resize_height:  u32,
    pub resize_width:   u32,
    pub crop_size:      u32,
    pub flip_ratio:     f64,
    pub mean:           [f32; 3],
    pub std:            [f32; 3],
    pub to_bgr:         bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clip_len:       16,
            frame_interval: 1,
            num_clips:      1,
            resize_height:  128,
            resize_width:   171,
            crop_size:      112,
            flip_ratio:     0.5,
            mean:           [104.0, 117.0, 128.0],
            std:            [1.0, 1.0, 1.0],
            to_bgr:         false,
        }
    }
}

// ─── Clip state ──────────────────────────────────────────────────────────────
/// Everything the stages read and write for one example.
#[derive(Debug, Default)]
pub struct ClipState {
    pub frame_dir:    PathBuf,
    pub total_frames: usize,
    pub label:        usize,
    pub clip_len:     usize,
    pub num_clips:    usize,

    /// 0-based frame indices, clips concatenated
    pub frame_inds: Vec<usize>,

    /// Decoded frames, one per entry of `frame_inds`
    pub frames: Vec<RgbImage>,

    /// Normalised pixels laid out [frames, H, W, C]
    pub pixels: Vec<f32>,

    /// (height, width) of `pixels`
    pub pixel_size: (usize, usize),

    /// Output of FormatShape
    pub formatted: Option<(Vec<f32>, [usize; 5])>,
}

impl ClipState {
    pub fn new(record: &FrameRecord, data_prefix: &Path) -> Self {
        Self {
            frame_dir:    data_prefix.join(&record.frame_dir),
            total_frames: record.total_frames,
            label:        record.label,
            ..Self::default()
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────
/// An ordered list of stages ending in `Collect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Transform>,
}

impl Pipeline {
    pub fn new(stages: Vec<Transform>) -> Self {
        Self { stages }
    }

    /// Random sampling, random crop and flip.
    pub fn train(cfg: &PipelineConfig) -> Self {
        Self::new(vec![
            Transform::SampleFrames {
                clip_len:       cfg.clip_len,
                frame_interval: cfg.frame_interval,
                num_clips:      cfg.num_clips,
                test_mode:      false,
            },
            Transform::RawFrameDecode,
            Transform::Resize { height: cfg.resize_height, width: cfg.resize_width },
            Transform::RandomCrop { size: cfg.crop_size },
            Transform::Flip { ratio: cfg.flip_ratio },
            Transform::Normalize { mean: cfg.mean, std: cfg.std, to_bgr: cfg.to_bgr },
            Transform::FormatShape,
            Transform::Collect,
        ])
    }

    /// Deterministic: centred sampling and centre crop, no flip.
    pub fn val(cfg: &PipelineConfig) -> Self {
        Self::new(vec![
            Transform::SampleFrames {
                clip_len:       cfg.clip_len,
                frame_interval: cfg.frame_interval,
                num_clips:      cfg.num_clips,
                test_mode:      true,
            },
            Transform::RawFrameDecode,
            Transform::Resize { height: cfg.resize_height, width: cfg.resize_width },
            Transform::CenterCrop { size: cfg.crop_size },
            Transform::Normalize { mean: cfg.mean, std: cfg.std, to_bgr: cfg.to_bgr },
            Transform::FormatShape,
            Transform::Collect,
        ])
    }

    /// Run every stage over `record` and return the collected item.
    pub fn run(
        &self,
        record:      &FrameRecord,
        data_prefix: &Path,
        rng:         &mut StdRng,
    ) -> DataResult<ClipItem> {
        let mut state = ClipState::new(record, data_prefix);

        for stage in &self.stages {
            if let Transform::Collect = stage {
                return collect(state);
            }
            apply(stage, &mut state, rng)?;
        }

        Err(DataError::Pipeline {
            stage: "Collect",
            msg:   "is missing; the pipeline never emitted an item".to_string(),
        })
    }
}

fn apply(stage: &Transform, state: &mut ClipState, rng: &mut StdRng) -> DataResult<()> {
    match *stage {
        Transform::SampleFrames { clip_len, frame_interval, num_clips, test_mode } => {
            sample_frames(state, clip_len, frame_interval, num_clips, test_mode, rng)
        }
        Transform::RawFrameDecode => decode_frames(state),
        Transform::Resize { height, width } => {
            require_frames(state, stage)?;
            for frame in state.frames.iter_mut() {
                *frame = imageops::resize(&*frame, width, height, FilterType::Triangle);
            }
            Ok(())
        }
        Transform::RandomCrop { size } => {
            let (width, height) = frame_size(state, stage)?;
            check_crop(size, width, height)?;
            let x = rng.gen_range(0..=width - size);
            let y = rng.gen_range(0..=height - size);
            crop_frames(state, x, y, size);
            Ok(())
        }
        Transform::CenterCrop { size } => {
            let (width, height) = frame_size(state, stage)?;
            check_crop(size, width, height)?;
            crop_frames(state, (width - size) / 2, (height - size) / 2, size);
            Ok(())
        }
        Transform::Flip { ratio } => {
            require_frames(state, stage)?;
            if rng.gen::<f64>() < ratio {
                for frame in state.frames.iter_mut() {
                    imageops::flip_horizontal_in_place(frame);
                }
            }
            Ok(())
        }
        Transform::Normalize { mean, std, to_bgr } => normalize(state, stage, mean, std, to_bgr),
        Transform::FormatShape => format_ncthw(state),
        Transform::Collect => Ok(()),
    }
}

// ─── SampleFrames ────────────────────────────────────────────────────────────
fn sample_frames(
    state:          &mut ClipState,
    clip_len:       usize,
    frame_interval: usize,
    num_clips:      usize,
    test_mode:      bool,
    rng:            &mut StdRng,
) -> DataResult<()> {
    if clip_len == 0 || frame_interval == 0 || num_clips == 0 {
        return Err(DataError::Pipeline {
            stage: "SampleFrames",
            msg:   "needs clip_len, frame_interval and num_clips >= 1".to_string(),
        });
    }
    let total = state.total_frames;
    if total == 0 {
        return Err(DataError::EmptyVideo { frame_dir: state.frame_dir.clone() });
    }

    let span = clip_len * frame_interval;
    let offsets = if test_mode {
        test_clip_offsets(total, span, num_clips)
    } else {
        train_clip_offsets(total, span, num_clips, rng)
    };

    // Indices past the end wrap around to the start of the video
    state.frame_inds = offsets
        .iter()
        .flat_map(|&offset| (0..clip_len).map(move |j| (offset + j * frame_interval) % total))
        .collect();
    state.clip_len  = clip_len;
    state.num_clips = num_clips;
    Ok(())
}

/// Split the video into `num_clips` segments and start each clip at a
/// random position inside its segment.
pub fn train_clip_offsets(
    total:     usize,
    span:      usize,
    num_clips: usize,
    rng:       &mut StdRng,
) -> Vec<usize> {
    let room = total as isize + 1 - span as isize;
    let avg  = room.div_euclid(num_clips as isize);

    if avg > 0 {
        let avg = avg as usize;
        (0..num_clips).map(|i| i * avg + rng.gen_range(0..avg)).collect()
    } else if total > num_clips.max(span) {
        let mut offsets: Vec<usize> =
            (0..num_clips).map(|_| rng.gen_range(0..=total - span)).collect();
        offsets.sort_unstable();
        offsets
    } else if avg == 0 {
        let ratio = room as f64 / num_clips as f64;
        (0..num_clips).map(|i| (i as f64 * ratio).round() as usize).collect()
    } else {
        vec![0; num_clips]
    }
}

/// Start each clip in the middle of its segment.
pub fn test_clip_offsets(total: usize, span: usize, num_clips: usize) -> Vec<usize> {
    if total + 1 <= span {
        return vec![0; num_clips];
    }
    let avg = (total + 1 - span) as f64 / num_clips as f64;
    (0..num_clips)
        .map(|i| (i as f64 * avg + avg / 2.0) as usize)
        .collect()
}

// ─── RawFrameDecode ──────────────────────────────────────────────────────────
/// On-disk name of a 0-based frame index (files start at 1).
pub fn frame_file_name(index: usize) -> String {
    format!("img_{:05}.jpg", index + 1)
}

fn decode_frames(state: &mut ClipState) -> DataResult<()> {
    if state.frame_inds.is_empty() {
        return Err(DataError::Pipeline {
            stage: "RawFrameDecode",
            msg:   "has no frame indices; run SampleFrames first".to_string(),
        });
    }

    let mut frames = Vec::with_capacity(state.frame_inds.len());
    for &idx in &state.frame_inds {
        let path  = state.frame_dir.join(frame_file_name(idx));
        let frame = image::open(&path)
            .map_err(|source| DataError::Image { path: path.clone(), source })?
            .to_rgb8();
        frames.push(frame);
    }
    state.frames = frames;
    Ok(())
}

// ─── Spatial helpers ─────────────────────────────────────────────────────────
fn require_frames(state: &ClipState, stage: &Transform) -> DataResult<()> {
    if state.frames.is_empty() {
        return Err(DataError::Pipeline {
            stage: stage.name(),
            msg:   "has no decoded frames; run RawFrameDecode first".to_string(),
        });
    }
    Ok(())
}

fn frame_size(state: &ClipState, stage: &Transform) -> DataResult<(u32, u32)> {
    require_frames(state, stage)?;
    Ok(state.frames[0].dimensions())
}

fn check_crop(size: u32, width: u32, height: u32) -> DataResult<()> {
    if size == 0 || size > width || size > height {
        return Err(DataError::CropTooLarge { size, width, height });
    }
    Ok(())
}

fn crop_frames(state: &mut ClipState, x: u32, y: u32, size: u32) {
    for frame in state.frames.iter_mut() {
        *frame = imageops::crop_imm(&*frame, x, y, size, size).to_image();
    }
}

// ─── Normalize ───────────────────────────────────────────────────────────────
fn normalize(
    state:  &mut ClipState,
    stage:  &Transform,
    mean:   [f32; 3],
    std:    [f32; 3],
    to_bgr: bool,
) -> DataResult<()> {
    let (width, height) = frame_size(state, stage)?;
    if std.iter().any(|&s| s == 0.0) {
        return Err(DataError::Pipeline {
            stage: "Normalize",
            msg:   "std must be non-zero".to_string(),
        });
    }

    let mut pixels = Vec::with_capacity(state.frames.len() * (width * height) as usize * CHANNELS);
    for frame in state.frames.drain(..) {
        if frame.dimensions() != (width, height) {
            return Err(DataError::Pipeline {
                stage: "Normalize",
                msg:   "got frames of different sizes".to_string(),
            });
        }
        for px in frame.pixels() {
            for c in 0..CHANNELS {
                let src = if to_bgr { CHANNELS - 1 - c } else { c };
                pixels.push((px.0[src] as f32 - mean[c]) / std[c]);
            }
        }
    }

    state.pixels     = pixels;
    state.pixel_size = (height as usize, width as usize);
    Ok(())
}

// ─── FormatShape ─────────────────────────────────────────────────────────────
/// [clips*T, H, W, C] → [clips, C, T, H, W]
fn format_ncthw(state: &mut ClipState) -> DataResult<()> {
    let (h, w)  = state.pixel_size;
    let t       = state.clip_len;
    let clips   = state.num_clips;
    let expected = clips * t * h * w * CHANNELS;

    if state.pixels.is_empty() || state.pixels.len() != expected {
        return Err(DataError::Pipeline {
            stage: "FormatShape",
            msg:   "needs normalised pixels; run Normalize first".to_string(),
        });
    }

    let src = &state.pixels;
    let mut out = Vec::with_capacity(expected);
    for clip in 0..clips {
        for c in 0..CHANNELS {
            for frame in 0..t {
                let base = (clip * t + frame) * h * w;
                for y in 0..h {
                    for x in 0..w {
                        out.push(src[((base + y * w + x) * CHANNELS) + c]);
                    }
                }
            }
        }
    }

    state.pixels    = Vec::new();
    state.formatted = Some((out, [clips, CHANNELS, t, h, w]));
    Ok(())
}

// ─── Collect ─────────────────────────────────────────────────────────────────
fn collect(state: ClipState) -> DataResult<ClipItem> {
    let Some((imgs, shape)) = state.formatted else {
        return Err(DataError::Pipeline {
            stage: "Collect",
            msg:   "has nothing to collect; run FormatShape first".to_string(),
        });
    };
    Ok(ClipItem { imgs, shape, label: state.label })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use std::fs;

    /// Writes `count` solid-colour frames of `width`x`height` into `dir`.
    fn write_frames(dir: &Path, count: usize, width: u32, height: u32, color: [u8; 3]) {
        fs::create_dir_all(dir).unwrap();
        for idx in 0..count {
            let img = RgbImage::from_pixel(width, height, Rgb(color));
            img.save(dir.join(frame_file_name(idx))).unwrap();
        }
    }

    fn small_cfg() -> PipelineConfig {
        PipelineConfig {
            clip_len:      4,
            resize_height: 10,
            resize_width:  12,
            crop_size:     8,
            mean:          [0.0, 0.0, 0.0],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_centred_offsets_in_test_mode() {
        // 100 frames, one 16-frame clip → centred at (100 - 16 + 1) / 2
        assert_eq!(test_clip_offsets(100, 16, 1), vec![42]);
        assert_eq!(test_clip_offsets(10, 16, 2), vec![0, 0]);
    }

    #[test]
    fn test_train_offsets_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            for offset in train_clip_offsets(40, 16, 3, &mut rng) {
                assert!(offset + 16 <= 40);
            }
        }
    }

    #[test]
    fn test_train_offsets_fixed_seed() {
        let a = train_clip_offsets(300, 16, 4, &mut StdRng::seed_from_u64(1234));
        let b = train_clip_offsets(300, 16, 4, &mut StdRng::seed_from_u64(1234));
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_video_indices_wrap() {
        let mut state = ClipState { total_frames: 5, ..ClipState::default() };
        let mut rng   = StdRng::seed_from_u64(0);
        sample_frames(&mut state, 8, 1, 1, true, &mut rng).unwrap();
        assert_eq!(state.frame_inds, vec![0, 1, 2, 3, 4, 0, 1, 2]);
    }

    #[test]
    fn test_empty_video_is_error() {
        let mut state = ClipState::default();
        let mut rng   = StdRng::seed_from_u64(0);
        let err = sample_frames(&mut state, 4, 1, 1, false, &mut rng).unwrap_err();
        assert!(matches!(err, DataError::EmptyVideo { .. }));
    }

    #[test]
    fn test_val_pipeline_output_shape_and_values() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(&tmp.path().join("v1"), 6, 20, 16, [100, 150, 200]);

        let record = FrameRecord { frame_dir: "v1".into(), total_frames: 6, label: 3 };
        let item = Pipeline::val(&small_cfg())
            .run(&record, tmp.path(), &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(item.shape, [1, 3, 4, 8, 8]);
        assert_eq!(item.imgs.len(), 3 * 4 * 8 * 8);
        assert_eq!(item.label, 3);
        // Channel planes are contiguous after FormatShape; JPEG is lossy
        let plane = 4 * 8 * 8;
        assert!((item.imgs[0] - 100.0).abs() < 4.0);
        assert!((item.imgs[plane] - 150.0).abs() < 4.0);
        assert!((item.imgs[2 * plane] - 200.0).abs() < 4.0);
    }

    #[test]
    fn test_to_bgr_swaps_channels() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(&tmp.path().join("v1"), 4, 12, 10, [10, 128, 240]);

        let cfg    = PipelineConfig { to_bgr: true, ..small_cfg() };
        let record = FrameRecord { frame_dir: "v1".into(), total_frames: 4, label: 0 };
        let item   = Pipeline::val(&cfg)
            .run(&record, tmp.path(), &mut StdRng::seed_from_u64(0))
            .unwrap();

        let plane = 4 * 8 * 8;
        assert!((item.imgs[0] - 240.0).abs() < 4.0);
        assert!((item.imgs[2 * plane] - 10.0).abs() < 4.0);
    }

    #[test]
    fn test_train_pipeline_multi_clip_shape() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(&tmp.path().join("v1"), 12, 20, 16, [50, 50, 50]);

        let cfg    = PipelineConfig { num_clips: 2, ..small_cfg() };
        let record = FrameRecord { frame_dir: "v1".into(), total_frames: 12, label: 1 };
        let item   = Pipeline::train(&cfg)
            .run(&record, tmp.path(), &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(item.shape, [2, 3, 4, 8, 8]);
        assert_eq!(item.shape[0], 2);
    }

    #[test]
    fn test_missing_frame_is_image_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(&tmp.path().join("v1"), 2, 12, 10, [0, 0, 0]);

        // Annotation claims more frames than exist on disk
        let record = FrameRecord { frame_dir: "v1".into(), total_frames: 8, label: 0 };
        let err = Pipeline::val(&small_cfg())
            .run(&record, tmp.path(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, DataError::Image { .. }));
    }

    #[test]
    fn test_crop_larger_than_frame() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(&tmp.path().join("v1"), 4, 12, 10, [0, 0, 0]);

        let cfg    = PipelineConfig { crop_size: 11, ..small_cfg() };
        let record = FrameRecord { frame_dir: "v1".into(), total_frames: 4, label: 0 };
        let err    = Pipeline::val(&cfg)
            .run(&record, tmp.path(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, DataError::CropTooLarge { size: 11, .. }));
    }

    #[test]
    fn test_out_of_order_stages_rejected() {
        let pipeline = Pipeline::new(vec![Transform::RawFrameDecode, Transform::Collect]);
        let record   = FrameRecord { frame_dir: "v".into(), total_frames: 4, label: 0 };
        let err = pipeline
            .run(&record, Path::new("."), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.to_string().contains("RawFrameDecode"));
    }

    #[test]
    fn test_pipeline_without_collect() {
        let pipeline = Pipeline::new(vec![]);
        let record   = FrameRecord { frame_dir: "v".into(), total_frames: 4, label: 0 };
        let err = pipeline
            .run(&record, Path::new("."), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.to_string().contains("Collect"));
    }
}
