// ============================================================
// Layer 4 — Data Errors
// ============================================================
// Everything that can go wrong turning an annotation line into
// a ClipItem. These are per-example failures: the dataset logs
// them and substitutes another example instead of aborting the
// epoch. A missing or malformed annotation file, or a list in
// which no video loads at all, is fatal and reported before
// training starts.

use std::path::PathBuf;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed annotation at {}:{line}: {msg}", path.display())]
    Annotation { path: PathBuf, line: usize, msg: String },

    #[error("frame decode error at {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("video {} has no frames", frame_dir.display())]
    EmptyVideo { frame_dir: PathBuf },

    #[error("crop of {size}px does not fit a {width}x{height} frame")]
    CropTooLarge { size: u32, width: u32, height: u32 },

    #[error("pipeline stage `{stage}` {msg}")]
    Pipeline { stage: &'static str, msg: String },

    #[error("none of the {count} listed videos could be loaded (last error: {source})")]
    NothingLoadable {
        count: usize,
        #[source]
        source: Box<DataError>,
    },
}
