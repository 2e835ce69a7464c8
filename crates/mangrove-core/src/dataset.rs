/// Row-aligned feature/label sets read from extraction output directories.
///
/// Each directory holds `features.json` and `labels.json`. When `sc.json` is
/// present the stored features were standardised and are mapped back to raw
/// values, so sets extracted with different scalers can be mixed.

use std::path::Path;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::artifact::{
    read_json, read_json_opt, FEATURES_FILE, FNAMES_FILE, LABELS_FILE, PREDICTIONS_FILE,
    SCALER_FILE,
};
use crate::error::{PipelineError, Result};
use crate::labels::{binarize_codes, Label};
use crate::model::{check_width, StandardScaler};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f32>>,
    /// Three-class codes: 0 = mangrove, 1 = non-mangrove, 2 = water.
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f32>>, labels: Vec<u8>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "features vs. labels",
                left: features.len(),
                right: labels.len(),
            });
        }
        if !features.is_empty() {
            check_width(&features)?;
        }
        for &code in &labels {
            Label::from_code(code)?;
        }
        Ok(Self { features, labels })
    }

    /// Load one extraction directory, undoing its scaler if it has one.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let labels: Vec<u8> = read_json(&dir.join(LABELS_FILE))?;
        Self::new(load_features(dir)?, labels)
    }

    /// Stack several sets; all must share one feature width.
    pub fn concat(sets: Vec<Dataset>) -> Result<Self> {
        let mut out = Dataset::default();
        for set in sets {
            out.features.extend(set.features);
            out.labels.extend(set.labels);
        }
        if out.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        check_width(&out.features)?;
        Ok(out)
    }

    pub fn load_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<Self> {
        let sets = dirs
            .iter()
            .map(|d| Self::load_dir(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::concat(sets)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_width(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    /// Shuffle rows in place, keeping features and labels aligned.
    pub fn shuffle(&mut self, seed: u64) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        *self = self.subset(&order);
    }

    /// Rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Labels with water merged into non-mangrove.
    pub fn binarized_labels(&self) -> Vec<u8> {
        binarize_codes(&self.labels)
    }

    pub fn has_water(&self) -> bool {
        self.labels.contains(&Label::Water.code())
    }
}

/// Raw (un-normalised) features of `dir`, without requiring labels.
pub fn load_features(dir: &Path) -> Result<Vec<Vec<f32>>> {
    let features: Vec<Vec<f32>> = read_json(&dir.join(FEATURES_FILE))?;
    match read_json_opt::<StandardScaler>(&dir.join(SCALER_FILE))? {
        Some(scaler) => {
            debug!("un-normalising {} with its scaler", dir.display());
            scaler.inverse_transform(&features)
        }
        None => Ok(features),
    }
}

/// File names of the rows in `dir`, row-aligned with its features.
pub fn load_fnames(dir: &Path) -> Result<Vec<String>> {
    read_json(&dir.join(FNAMES_FILE))
}

/// Probabilities written by the external model, when it has been run.
pub fn load_predictions(dir: &Path) -> Result<Option<Vec<f32>>> {
    read_json_opt(&dir.join(PREDICTIONS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_json;
    use approx::assert_relative_eq;

    fn write_set(dir: &Path, features: &[Vec<f32>], labels: &[u8]) {
        write_json(&dir.join(FEATURES_FILE), &features).unwrap();
        write_json(&dir.join(LABELS_FILE), &labels).unwrap();
    }

    #[test]
    fn load_dir_undoes_scaler() {
        let dir = tempfile::tempdir().unwrap();
        write_set(dir.path(), &[vec![0.0, 1.0], vec![-1.0, 2.0]], &[0, 2]);
        let sc = StandardScaler { mean: vec![10.0, 20.0], scale: vec![2.0, 4.0] };
        sc.save(&dir.path().join(SCALER_FILE)).unwrap();

        let ds = Dataset::load_dir(dir.path()).unwrap();
        assert_relative_eq!(ds.features[0][0], 10.0);
        assert_relative_eq!(ds.features[0][1], 24.0);
        assert_relative_eq!(ds.features[1][0], 8.0);
        assert!(ds.has_water());
        assert_eq!(ds.binarized_labels(), vec![0, 1]);
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_set(dir.path(), &[vec![0.0], vec![1.0]], &[0]);
        assert!(matches!(
            Dataset::load_dir(dir.path()),
            Err(PipelineError::ShapeMismatch { left: 2, right: 1, .. })
        ));
    }

    #[test]
    fn concat_requires_equal_widths() {
        let a = Dataset::new(vec![vec![0.0, 1.0]], vec![0]).unwrap();
        let b = Dataset::new(vec![vec![0.0]], vec![1]).unwrap();
        assert!(matches!(Dataset::concat(vec![a, b]), Err(PipelineError::FeatureWidth { .. })));
        assert!(matches!(Dataset::concat(vec![]), Err(PipelineError::EmptyDataset)));
    }

    #[test]
    fn shuffle_keeps_rows_aligned_and_is_seeded() {
        let features: Vec<Vec<f32>> = (0..50).map(|i| vec![i as f32]).collect();
        let labels: Vec<u8> = (0..50).map(|i| (i % 3) as u8).collect();
        let mut a = Dataset::new(features.clone(), labels.clone()).unwrap();
        let mut b = a.clone();
        a.shuffle(42);
        b.shuffle(42);
        assert_eq!(a, b);
        assert_ne!(a.labels, labels);
        for (row, &label) in a.features.iter().zip(&a.labels) {
            assert_eq!((row[0] as usize % 3) as u8, label);
        }
    }

    #[test]
    fn missing_artifacts_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Dataset::load_dir(dir.path()), Err(PipelineError::MissingArtifact(_))));
        assert!(matches!(load_fnames(dir.path()), Err(PipelineError::MissingArtifact(_))));
        assert_eq!(load_predictions(dir.path()).unwrap(), None);
    }
}
