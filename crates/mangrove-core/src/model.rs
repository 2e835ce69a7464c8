//! Feature scaling, label encoding and the classifier seam.
//!
//! Feature vectors come from a convolutional backbone run upstream. The
//! neural network that normally consumes them lives outside this crate and
//! hands back probabilities through [`Precomputed`]; [`NearestCentroid`] is
//! an in-tree baseline so every trainer mode can run end to end.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::{read_json, write_json};
use crate::error::{PipelineError, Result};
use crate::labels::Label;

// ── Scaler ────────────────────────────────────────────────────────────────────

/// Per-column standardisation `(x − mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations. Constant
    /// columns get a scale of 1.
    pub fn fit(features: &[Vec<f32>]) -> Result<Self> {
        let width = check_width(features)?;
        let n = features.len() as f64;
        let mut mean = vec![0f64; width];
        for row in features {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0f64; width];
        for row in features {
            for ((s, &v), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v as f64 - m;
                *s += d * d;
            }
        }
        let scale = var
            .iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd < 1e-12 { 1.0 } else { sd as f32 }
            })
            .collect();

        Ok(Self {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            scale,
        })
    }

    pub fn transform(&self, features: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        self.map_rows(features, |v, m, s| (v - m) / s)
    }

    pub fn inverse_transform(&self, features: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        self.map_rows(features, |v, m, s| v * s + m)
    }

    fn map_rows(
        &self,
        features: &[Vec<f32>],
        f: impl Fn(f32, f32, f32) -> f32,
    ) -> Result<Vec<Vec<f32>>> {
        features
            .iter()
            .enumerate()
            .map(|(row, values)| {
                if values.len() != self.mean.len() {
                    return Err(PipelineError::FeatureWidth {
                        row,
                        expected: self.mean.len(),
                        found: values.len(),
                    });
                }
                Ok(values
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(&v, (&m, &s))| f(v, m, s))
                    .collect())
            })
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

// ── Label encoder ─────────────────────────────────────────────────────────────

/// Sorted class names; a class index is its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(names: &[S]) -> Self {
        let mut classes: Vec<String> = names.iter().map(|s| s.as_ref().to_owned()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// `m`, `nm`, `water` in code order.
    pub fn mangrove_classes() -> Self {
        Self::fit(&Label::ALL.map(Label::class_name))
    }

    pub fn transform(&self, name: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(name))
            .map_err(|_| PipelineError::UnknownClass(name.to_owned()))
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| PipelineError::UnknownClass(index.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

// ── Classifiers ───────────────────────────────────────────────────────────────

/// Binary classifier over feature rows. Class 0 is mangrove, class 1 is
/// non-mangrove (water already merged).
pub trait Classifier {
    fn fit(&mut self, features: &[Vec<f32>], labels: &[u8]) -> Result<()>;

    /// Probability of class 1 for every row.
    fn predict_proba(&self, features: &[Vec<f32>]) -> Result<Vec<f32>>;

    /// Hard labels: 1 where the probability exceeds `threshold`.
    fn predict(&self, features: &[Vec<f32>], threshold: f32) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(|p| u8::from(p > threshold))
            .collect())
    }
}

/// Distance-to-class-mean baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    /// Mean feature vector of class 0 and class 1.
    pub centroids: Vec<Vec<f32>>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

impl Classifier for NearestCentroid {
    fn fit(&mut self, features: &[Vec<f32>], labels: &[u8]) -> Result<()> {
        let width = check_width(features)?;
        if features.len() != labels.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "features vs. labels",
                left: features.len(),
                right: labels.len(),
            });
        }

        let mut sums = vec![vec![0f64; width]; 2];
        let mut counts = [0usize; 2];
        for (row, &label) in features.iter().zip(labels) {
            let k = usize::from(label.min(1));
            counts[k] += 1;
            for (s, &v) in sums[k].iter_mut().zip(row) {
                *s += v as f64;
            }
        }
        for (k, label) in [Label::Mangrove, Label::NonMangrove].iter().enumerate() {
            if counts[k] == 0 {
                return Err(PipelineError::MissingClass(label.class_name()));
            }
        }

        self.centroids = sums
            .into_iter()
            .zip(counts)
            .map(|(s, n)| s.into_iter().map(|v| (v / n as f64) as f32).collect())
            .collect();
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f32>]) -> Result<Vec<f32>> {
        let width = self.centroids.first().map(Vec::len).unwrap_or(0);
        features
            .iter()
            .enumerate()
            .map(|(row, values)| {
                if values.len() != width || self.centroids.len() != 2 {
                    return Err(PipelineError::FeatureWidth {
                        row,
                        expected: width,
                        found: values.len(),
                    });
                }
                let d0 = distance(values, &self.centroids[0]);
                let d1 = distance(values, &self.centroids[1]);
                let total = d0 + d1;
                Ok(if total <= f64::EPSILON { 0.5 } else { (d0 / total) as f32 })
            })
            .collect()
    }
}

/// Probabilities produced by the external model, one per test row.
#[derive(Debug, Clone, PartialEq)]
pub struct Precomputed {
    pub proba: Vec<f32>,
}

impl Classifier for Precomputed {
    fn fit(&mut self, _features: &[Vec<f32>], _labels: &[u8]) -> Result<()> {
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f32>]) -> Result<Vec<f32>> {
        if features.len() != self.proba.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "feature rows vs. external predictions",
                left: features.len(),
                right: self.proba.len(),
            });
        }
        Ok(self.proba.clone())
    }
}

fn distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Width shared by all rows; rejects empty or ragged input.
pub(crate) fn check_width(features: &[Vec<f32>]) -> Result<usize> {
    let first = features.first().ok_or(PipelineError::EmptyDataset)?;
    let expected = first.len();
    for (row, values) in features.iter().enumerate() {
        if values.len() != expected {
            return Err(PipelineError::FeatureWidth { row, expected, found: values.len() });
        }
    }
    Ok(expected)
}
