//! Binary-with-subclass scoring.
//!
//! Ground truth has three classes (mangrove, non-mangrove, water) but the
//! model only decides mangrove vs. everything else. Water is a kind of
//! non-mangrove, so water predicted as non-mangrove is a correct answer and
//! the water/non-mangrove block of the confusion matrix counts as one class.

use std::fmt;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::labels::Label;

/// Counts indexed `[actual][predicted]` over `{m, nm, water}`. For binary
/// predictions the predicted-water column stays empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: [[u64; 3]; 3],
}

impl ConfusionMatrix {
    pub fn from_pairs(actual: &[Label], predicted: &[Label]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "ground truth vs. predictions",
                left: actual.len(),
                right: predicted.len(),
            });
        }
        let mut cm = Self::default();
        for (a, p) in actual.iter().zip(predicted) {
            cm.counts[a.index()][p.index()] += 1;
        }
        Ok(cm)
    }

    pub fn from_codes(actual: &[u8], predicted: &[u8]) -> Result<Self> {
        let actual = actual.iter().map(|&c| Label::from_code(c)).collect::<Result<Vec<_>>>()?;
        let predicted = predicted.iter().map(|&c| Label::from_code(c)).collect::<Result<Vec<_>>>()?;
        Self::from_pairs(&actual, &predicted)
    }

    /// Build from rows of `(predicted m, predicted nm)` counts for actual
    /// m, nm and water.
    pub fn from_binary_rows(rows: [[u64; 2]; 3]) -> Self {
        let mut cm = Self::default();
        for (a, row) in rows.iter().enumerate() {
            cm.counts[a][0] = row[0];
            cm.counts[a][1] = row[1];
        }
        cm
    }

    #[inline]
    pub fn count(&self, actual: Label, predicted: Label) -> u64 {
        self.counts[actual.index()][predicted.index()]
    }

    pub fn rows(&self) -> &[[u64; 3]; 3] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn has_water(&self) -> bool {
        self.counts[Label::Water.index()].iter().sum::<u64>() > 0
    }

    fn row_sum(&self, actual: &[Label]) -> u64 {
        actual.iter().map(|a| self.counts[a.index()].iter().sum::<u64>()).sum()
    }

    fn col_sum(&self, predicted: &[Label]) -> u64 {
        predicted
            .iter()
            .map(|p| self.counts.iter().map(|row| row[p.index()]).sum::<u64>())
            .sum()
    }

    fn block_sum(&self, actual: &[Label], predicted: &[Label]) -> u64 {
        actual
            .iter()
            .flat_map(|a| predicted.iter().map(move |p| self.count(*a, *p)))
            .sum()
    }

    /// Recall and precision with water merged into non-mangrove.
    pub fn water_aware_scores(&self) -> WaterAwareScores {
        const M: &[Label] = &[Label::Mangrove];
        const NM: &[Label] = &[Label::NonMangrove, Label::Water];

        let m_hits = self.block_sum(M, M);
        let nm_hits = self.block_sum(NM, NM);
        WaterAwareScores {
            m_recall: ratio(m_hits, self.row_sum(M)),
            m_precision: ratio(m_hits, self.col_sum(M)),
            nm_recall: ratio(nm_hits, self.row_sum(NM)),
            nm_precision: ratio(nm_hits, self.col_sum(NM)),
        }
    }

    /// Standard two-class report on the binarized matrix.
    pub fn binary_report(&self) -> ClassificationReport {
        let b = self.binarized();
        let total = b.iter().flatten().sum::<u64>();
        let classes = [Label::Mangrove, Label::NonMangrove]
            .iter()
            .enumerate()
            .map(|(k, &label)| {
                let tp = b[k][k];
                let support = b[k][0] + b[k][1];
                let predicted = b[0][k] + b[1][k];
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = match (precision, recall) {
                    (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
                    (Some(_), Some(_)) => Some(0.0),
                    _ => None,
                };
                ClassScores { label, precision, recall, f1, support }
            })
            .collect();
        ClassificationReport {
            classes,
            accuracy: ratio(b[0][0] + b[1][1], total),
        }
    }

    fn binarized(&self) -> [[u64; 2]; 2] {
        let mut out = [[0u64; 2]; 2];
        for a in Label::ALL {
            for p in Label::ALL {
                out[a.binarize().index()][p.binarize().index()] += self.count(a, p);
            }
        }
        out
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>8} {:>8} {:>8}", "actual\\pred", "m", "nm", "water")?;
        for a in Label::ALL {
            let row = &self.counts[a.index()];
            writeln!(f, "{:>10} {:>8} {:>8} {:>8}", a.class_name(), row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_else(|| "n/a".to_owned())
}

/// Scores where water/non-mangrove confusions are not errors. `None` when
/// the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterAwareScores {
    pub m_recall: Option<f64>,
    pub m_precision: Option<f64>,
    pub nm_recall: Option<f64>,
    pub nm_precision: Option<f64>,
}

impl fmt::Display for WaterAwareScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "m recall:     {}", fmt_opt(self.m_recall))?;
        writeln!(f, "m precision:  {}", fmt_opt(self.m_precision))?;
        writeln!(f, "nm recall:    {}", fmt_opt(self.nm_recall))?;
        writeln!(f, "nm precision: {}", fmt_opt(self.nm_precision))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    pub label: Label,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub support: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: Option<f64>,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>8} {:>10} {:>10} {:>10} {:>8}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>8} {:>10} {:>10} {:>10} {:>8}",
                c.label.class_name(),
                fmt_opt(c.precision),
                fmt_opt(c.recall),
                fmt_opt(c.f1),
                c.support
            )?;
        }
        writeln!(f, "accuracy: {}", fmt_opt(self.accuracy))
    }
}

/// Result of scoring predictions against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Evaluation {
    /// Ground truth contains water: water-aware scores.
    WaterAware { matrix: ConfusionMatrix, scores: WaterAwareScores },
    /// Plain binary ground truth.
    Binary { matrix: ConfusionMatrix, report: ClassificationReport },
}

impl Evaluation {
    pub fn from_matrix(matrix: ConfusionMatrix) -> Self {
        if matrix.has_water() {
            Evaluation::WaterAware { scores: matrix.water_aware_scores(), matrix }
        } else {
            Evaluation::Binary { report: matrix.binary_report(), matrix }
        }
    }

    pub fn matrix(&self) -> &ConfusionMatrix {
        match self {
            Evaluation::WaterAware { matrix, .. } | Evaluation::Binary { matrix, .. } => matrix,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::WaterAware { matrix, scores } => write!(f, "{matrix}{scores}"),
            Evaluation::Binary { matrix, report } => write!(f, "{matrix}{report}"),
        }
    }
}

/// Score binary predictions against three-class ground-truth codes.
pub fn evaluate(actual: &[u8], predicted: &[u8]) -> Result<Evaluation> {
    Ok(Evaluation::from_matrix(ConfusionMatrix::from_codes(actual, predicted)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> ConfusionMatrix {
        ConfusionMatrix::from_binary_rows([[8, 2], [1, 19], [3, 27]])
    }

    #[test]
    fn reference_matrix_scores() {
        let s = reference().water_aware_scores();
        assert_relative_eq!(s.m_recall.unwrap(), 0.8);
        assert_relative_eq!(s.nm_recall.unwrap(), 0.92);
        assert_relative_eq!(s.m_precision.unwrap(), 8.0 / 12.0);
        assert_relative_eq!(s.nm_precision.unwrap(), 46.0 / 48.0);
    }

    #[test]
    fn water_predicted_as_nm_is_not_an_error() {
        let cm = ConfusionMatrix::from_codes(&[2, 2, 2, 1], &[1, 1, 1, 1]).unwrap();
        let s = cm.water_aware_scores();
        assert_eq!(s.nm_recall, Some(1.0));
        assert_eq!(s.nm_precision, Some(1.0));
        assert_eq!(s.m_recall, None);
        assert_eq!(s.m_precision, None);
    }

    #[test]
    fn predicted_water_column_stays_empty_for_binary_predictions() {
        let cm = ConfusionMatrix::from_codes(&[0, 1, 2, 2, 0], &[0, 1, 1, 0, 1]).unwrap();
        assert!(cm.rows().iter().all(|row| row[2] == 0));
        assert_eq!(cm.count(Label::Water, Label::Mangrove), 1);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(matches!(
            ConfusionMatrix::from_codes(&[0, 1], &[0]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            ConfusionMatrix::from_codes(&[0, 5], &[0, 1]),
            Err(PipelineError::UnknownLabelCode(5))
        ));
    }

    #[test]
    fn evaluation_picks_report_by_ground_truth() {
        assert!(matches!(evaluate(&[0, 1, 2], &[0, 1, 1]).unwrap(), Evaluation::WaterAware { .. }));
        let eval = evaluate(&[0, 0, 1, 1], &[0, 1, 1, 1]).unwrap();
        let Evaluation::Binary { report, .. } = eval else {
            panic!("no water in ground truth");
        };
        assert_relative_eq!(report.accuracy.unwrap(), 0.75);
        let m = &report.classes[0];
        assert_eq!(m.support, 2);
        assert_relative_eq!(m.precision.unwrap(), 1.0);
        assert_relative_eq!(m.recall.unwrap(), 0.5);
        assert_relative_eq!(m.f1.unwrap(), 2.0 / 3.0);
        let nm = &report.classes[1];
        assert_relative_eq!(nm.precision.unwrap(), 2.0 / 3.0);
        assert_relative_eq!(nm.recall.unwrap(), 1.0);
    }

    #[test]
    fn display_includes_scores() {
        let text = Evaluation::from_matrix(reference()).to_string();
        assert!(text.contains("m recall:     0.800000"));
        assert!(text.contains("nm recall:    0.920000"));
    }
}
