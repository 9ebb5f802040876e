// ============================================================
// Layer 4 — Rawframe Annotation Loader
// ============================================================
// Parses the split lists that describe a rawframe dataset.
//
// Each non-blank line names one video whose frames were
// extracted ahead of time into a directory of JPEGs:
//
//   <frame_dir> <total_frames> <label>
//
// Example (ucf101_train_split_1_rawframes.txt):
//   ApplyEyeMakeup/v_ApplyEyeMakeup_g08_c01 121 0
//   ApplyEyeMakeup/v_ApplyEyeMakeup_g08_c02 146 0
//
// frame_dir is relative to the dataset's data_prefix; the
// frames inside it are named img_00001.jpg, img_00002.jpg, ...
//
// Reference: Rust Book §8 (Strings), §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::error::{DataError, DataResult};

/// One annotated video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Directory of extracted frames, relative to data_prefix
    pub frame_dir: PathBuf,

    /// Number of frames on disk
    pub total_frames: usize,

    /// Class index
    pub label: usize,
}

/// Read and parse a rawframe annotation file.
pub fn load_annotations(path: &Path) -> DataResult<Vec<FrameRecord>> {
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_annotations(&text, path)?;
    tracing::debug!("Parsed {} annotations from '{}'", records.len(), path.display());
    Ok(records)
}

/// Parse annotation text. `origin` is only used in error messages.
pub fn parse_annotations(text: &str, origin: &Path) -> DataResult<Vec<FrameRecord>> {
    let mut records = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let bad = |msg: String| DataError::Annotation {
            path: origin.to_path_buf(),
            line: idx + 1,
            msg,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [frame_dir, total, label] = fields.as_slice() else {
            return Err(bad(format!("expected 3 fields, found {}", fields.len())));
        };

        let total_frames = total
            .parse::<usize>()
            .map_err(|e| bad(format!("total_frames `{total}`: {e}")))?;
        let label = label
            .parse::<usize>()
            .map_err(|e| bad(format!("label `{label}`: {e}")))?;

        records.push(FrameRecord {
            frame_dir: PathBuf::from(frame_dir),
            total_frames,
            label,
        });
    }

    Ok(records)
}
