//! Series-level data-quality scoring.

use signalscope_types::{AnalysisConfig, QualityConfig, QualityInfo, Sample};

use crate::math;

const COMPLETENESS_WEIGHT: f64 = 0.4;
const ACCURACY_WEIGHT: f64 = 0.4;
const TIMELINESS_WEIGHT: f64 = 0.2;
/// Freshly pulled data is always on time.
const TIMELINESS: f64 = 1.0;

/// Scores completeness and accuracy of a raw series.
#[derive(Clone, Debug)]
pub struct QualityScorer {
    config: QualityConfig,
    min_data_points: usize,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl QualityScorer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.quality.clone(),
            min_data_points: config.min_data_points,
        }
    }

    /// Assess `samples` as received from the collector, before cleaning.
    pub fn assess(&self, samples: &[Sample]) -> QualityInfo {
        let total_points = samples.len();
        let valid: Vec<&Sample> = samples.iter().filter(|s| s.is_valid()).collect();
        let valid_points = valid.len();

        let mut issues = Vec::new();
        if total_points < self.min_data_points {
            issues.push(format!(
                "only {} points, below the minimum of {}",
                total_points, self.min_data_points
            ));
        }
        if valid_points == 0 {
            issues.push("no valid data points".to_string());
            return QualityInfo {
                total_points,
                issues,
                ..QualityInfo::default()
            };
        }

        let completeness = valid_points as f64 / total_points as f64;
        let missing = 1.0 - completeness;
        if missing > self.config.missing_data_threshold {
            issues.push(format!(
                "{:.1}% of points are missing or invalid",
                missing * 100.0
            ));
        }

        let values: Vec<f64> = valid.iter().map(|s| s.value).collect();
        let (lower, upper) = self.fences(&values);
        let suspect = valid
            .iter()
            .filter(|s| s.is_flagged_anomaly() || s.value < lower || s.value > upper)
            .count();
        if suspect > 0 {
            issues.push(format!(
                "{} of {} valid points are flagged or outside the {}x IQR fences",
                suspect, valid_points, self.config.outlier_threshold
            ));
        }
        let accuracy = (1.0 - suspect as f64 / valid_points as f64).max(0.0);

        let mut quality_score = COMPLETENESS_WEIGHT * completeness
            + ACCURACY_WEIGHT * accuracy
            + TIMELINESS_WEIGHT * TIMELINESS;
        if total_points < self.min_data_points {
            quality_score /= 2.0;
        }

        QualityInfo {
            total_points,
            valid_points,
            completeness,
            accuracy,
            timeliness: TIMELINESS,
            quality_score,
            issues,
        }
    }

    fn fences(&self, values: &[f64]) -> (f64, f64) {
        let sorted = math::sorted(values);
        let q1 = math::percentile(&sorted, 0.25);
        let q3 = math::percentile(&sorted, 0.75);
        let margin = self.config.outlier_threshold * (q3 - q1);
        (q1 - margin, q3 + margin)
    }
}
