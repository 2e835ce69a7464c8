/// JSON artifact files shared by the trainer stages.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PipelineError, Result};

pub const FEATURES_FILE: &str = "features.json";
pub const LABELS_FILE: &str = "labels.json";
pub const FNAMES_FILE: &str = "fnames.json";
pub const SCALER_FILE: &str = "sc.json";
pub const MODEL_FILE: &str = "model.json";
pub const PREDICTIONS_FILE: &str = "predictions.json";

/// Read a required artifact. A missing file is [`PipelineError::MissingArtifact`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(PipelineError::MissingArtifact(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| PipelineError::json(path, e))
}

/// Read an artifact that may legitimately be absent.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if path.is_file() {
        read_json(path).map(Some)
    } else {
        Ok(None)
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| PipelineError::json(path, e))?;
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_artifact_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<Vec<u8>>(&dir.path().join(LABELS_FILE)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(_)));
        assert!(read_json_opt::<Vec<u8>>(&dir.path().join(LABELS_FILE)).unwrap().is_none());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("le.json");
        write_json(&path, &vec!["m", "nm"]).unwrap();
        assert_eq!(read_json::<Vec<String>>(&path).unwrap(), vec!["m", "nm"]);
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FEATURES_FILE);
        fs::write(&path, "[[1.0, 2.0],").unwrap();
        assert!(matches!(read_json::<Vec<Vec<f32>>>(&path), Err(PipelineError::Json { .. })));
    }
}
