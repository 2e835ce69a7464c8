//! K-fold cross-validation over a training set.
//!
//! Folds are contiguous and unshuffled; the first `n % k` folds take one
//! extra row. Shuffle the dataset beforehand for randomised folds.

use std::fmt;

use log::info;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::model::Classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// `(train, test)` index pairs for `n` samples.
    pub fn split(&self, n: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        let k = self.n_splits;
        if k < 2 || k > n {
            return Err(PipelineError::InvalidFolds { folds: k, samples: n });
        }

        let base = n / k;
        let extra = n % k;
        let mut start = 0;
        let mut out = Vec::with_capacity(k);
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let test: Vec<usize> = (start..end).collect();
            let train: Vec<usize> = (0..start).chain(end..n).collect();
            out.push((train, test));
            start = end;
        }
        Ok(out)
    }
}

/// Per-fold accuracy (percent) with mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvSummary {
    pub fold_accuracy: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvSummary {
    pub fn from_scores(fold_accuracy: Vec<f64>) -> Self {
        let n = fold_accuracy.len().max(1) as f64;
        let mean = fold_accuracy.iter().sum::<f64>() / n;
        let var = fold_accuracy.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>() / n;
        Self { fold_accuracy, mean, std: var.sqrt() }
    }
}

impl fmt::Display for CvSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, acc) in self.fold_accuracy.iter().enumerate() {
            writeln!(f, "fold {:>2}: accuracy {:.2}%", i + 1, acc)?;
        }
        write!(f, "{:.3}% +/- {:.3}%", self.mean, self.std)
    }
}

/// Fit a fresh classifier per fold and score it on the held-out rows.
/// Labels are binarized before fitting.
pub fn cross_validate<C, F>(
    make: F,
    data: &Dataset,
    kfold: KFold,
    threshold: f32,
) -> Result<CvSummary>
where
    C: Classifier,
    F: Fn() -> C,
{
    let labels = data.binarized_labels();
    let mut scores = Vec::with_capacity(kfold.n_splits);

    for (fold, (train_idx, test_idx)) in kfold.split(data.len())?.into_iter().enumerate() {
        let train = data.subset(&train_idx);
        let train_labels: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
        let mut model = make();
        model.fit(&train.features, &train_labels)?;

        let test = data.subset(&test_idx);
        let predicted = model.predict(&test.features, threshold)?;
        let correct = test_idx
            .iter()
            .zip(&predicted)
            .filter(|&(&i, &p)| labels[i] == p)
            .count();
        let acc = correct as f64 / test_idx.len() as f64 * 100.0;
        info!("fold {}: accuracy {:.2}%", fold + 1, acc);
        scores.push(acc);
    }
    Ok(CvSummary::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NearestCentroid;
    use approx::assert_relative_eq;

    #[test]
    fn folds_partition_all_rows() {
        let folds = KFold::new(3).split(10).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(folds[1].1, vec![4, 5, 6]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 10);
            assert!(train.iter().all(|i| !test.contains(i)));
        }
    }

    #[test]
    fn invalid_fold_counts() {
        assert!(matches!(KFold::new(1).split(10), Err(PipelineError::InvalidFolds { .. })));
        assert!(matches!(KFold::new(11).split(10), Err(PipelineError::InvalidFolds { .. })));
    }

    #[test]
    fn summary_statistics() {
        let s = CvSummary::from_scores(vec![90.0, 100.0]);
        assert_relative_eq!(s.mean, 95.0);
        assert_relative_eq!(s.std, 5.0);
        assert!(s.to_string().ends_with("95.000% +/- 5.000%"));
    }

    #[test]
    fn separable_data_scores_perfectly() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let class = (i % 3) as u8;
            let offset = if class == 0 { 0.0 } else { 10.0 };
            features.push(vec![offset + (i % 5) as f32 * 0.1, offset]);
            labels.push(class);
        }
        let data = Dataset::new(features, labels).unwrap();
        let summary = cross_validate(NearestCentroid::new, &data, KFold::new(4), 0.5).unwrap();
        assert_eq!(summary.fold_accuracy.len(), 4);
        assert_relative_eq!(summary.mean, 100.0);
    }
}
