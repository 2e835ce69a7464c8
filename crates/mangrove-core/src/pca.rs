//! Explained-variance analysis of feature vectors.
use nalgebra::{DMatrix, SymmetricEigen};

use crate::error::Result;
use crate::model::check_width;

/// Fraction of total variance carried by each principal component,
/// largest first. Returns `min(rows, width)` components.
pub fn explained_variance_ratio(features: &[Vec<f32>]) -> Result<Vec<f64>> {
    let width = check_width(features)?;
    let n = features.len();

    let mut x = DMatrix::<f64>::from_fn(n, width, |r, c| features[r][c] as f64);
    for mut col in x.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    let denom = (n.max(2) - 1) as f64;
    let cov = (x.transpose() * &x) / denom;

    let mut eigenvalues: Vec<f64> = SymmetricEigen::new(cov)
        .eigenvalues
        .iter()
        .map(|&v| v.max(0.0))
        .collect();
    eigenvalues.sort_by(|a, b| b.total_cmp(a));
    eigenvalues.truncate(n.min(width));

    let total: f64 = eigenvalues.iter().sum();
    if total <= 0.0 {
        return Ok(vec![0.0; eigenvalues.len()]);
    }
    Ok(eigenvalues.into_iter().map(|v| v / total).collect())
}

/// Running sum of `ratios`.
pub fn cumulative(ratios: &[f64]) -> Vec<f64> {
    ratios
        .iter()
        .scan(0.0, |acc, &r| {
            *acc += r;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn variance_along_one_axis() {
        let features: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 3.0, 0.0]).collect();
        let ratios = explained_variance_ratio(&features).unwrap();
        assert_eq!(ratios.len(), 3);
        assert_relative_eq!(ratios[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(ratios[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn ratios_are_sorted_and_sum_to_one() {
        let features: Vec<Vec<f32>> = (0..30)
            .map(|i| {
                let t = i as f32;
                vec![t, 0.5 * t + (i % 3) as f32, (i % 7) as f32]
            })
            .collect();
        let ratios = explained_variance_ratio(&features).unwrap();
        assert!(ratios.windows(2).all(|w| w[0] >= w[1]));
        let cum = cumulative(&ratios);
        assert_relative_eq!(*cum.last().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn fewer_rows_than_columns_limits_components() {
        let features = vec![vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 1.0, 0.0, 4.0]];
        assert_eq!(explained_variance_ratio(&features).unwrap().len(), 2);
    }
}
