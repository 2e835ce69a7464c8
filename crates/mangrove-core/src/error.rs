//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("grid shape must have at least one column and one row, got {cols}x{rows}")]
    InvalidGrid { cols: u32, rows: u32 },

    #[error("image {width}x{height} is smaller than the {cols}x{rows} grid")]
    ImageTooSmall { width: u32, height: u32, cols: u32, rows: u32 },

    #[error("unreadable image {}", path.display())]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown label code {0} (expected 0=mangrove, 1=non-mangrove, 2=water)")]
    UnknownLabelCode(u8),

    #[error("{what}: {left} rows vs {right} rows")]
    ShapeMismatch { what: &'static str, left: usize, right: usize },

    #[error("feature row {row} has width {found}, expected {expected}")]
    FeatureWidth { row: usize, expected: usize, found: usize },

    #[error("missing artifact {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("cannot split {samples} samples into {folds} folds")]
    InvalidFolds { folds: usize, samples: usize },

    #[error("class {0} is not known to the label encoder")]
    UnknownClass(String),

    #[error("training data has no rows of class {0}")]
    MissingClass(&'static str),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json { path: path.into(), source }
    }
}
