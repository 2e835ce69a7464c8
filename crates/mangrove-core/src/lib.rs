//! Core of the mangrove tile pipeline: grid slicing, interactive labeling,
//! water-aware scoring and the trainer stages that run over extracted
//! feature vectors.

pub mod artifact;
pub mod crossval;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod labels;
pub mod model;
pub mod pca;
pub mod reconcile;
pub mod session;
pub mod sort;
pub mod tiling;

pub use error::{PipelineError, Result};
pub use grid::{map_click, CellCoord, CellRect, GridLayout, GridShape};
pub use labels::{binarize_codes, Bucket, DirNameTagger, Label, LabelTagger, MappedTagger};
pub use reconcile::{evaluate, ConfusionMatrix, Evaluation, WaterAwareScores};
pub use session::{label_directory, EventSource, LabelingSession, SessionEvent, TileSink};
pub use tiling::{slice, slice_all};
