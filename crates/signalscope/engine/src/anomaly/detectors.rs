//! The five anomaly detectors.
//!
//! Detectors see samples in the order received and report
//! `position_index` relative to that order. Each returns an empty result
//! below its minimum length and fails only on non-finite values.

use std::collections::BTreeMap;

use serde_json::json;
use signalscope_types::{AnalysisError, AnalysisResult, AnomalyPoint, PerMethodResult, Sample, Severity};

use crate::math;

/// Scale factor that makes MAD a consistent estimator of σ for normal data.
const MAD_SCALE: f64 = 1.4826;
/// Ceiling on any single point confidence.
const MAX_POINT_CONFIDENCE: f64 = 0.95;

// ── Trait ───────────────────────────────────────────────────────────────

/// Pluggable anomaly detection algorithm.
pub trait AnomalyDetector: Send + Sync {
    /// Flag anomalous samples.
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult>;

    /// Method name recorded on every point this detector produces.
    fn name(&self) -> &str;

    /// Fixed self-rated reliability of the algorithm.
    fn self_confidence(&self) -> f64;

    /// One-line human description.
    fn description(&self) -> &str;
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Values of `samples`, or an error naming the first non-finite index.
fn finite_values(method: &str, samples: &[Sample]) -> AnalysisResult<Vec<f64>> {
    samples
        .iter()
        .enumerate()
        .map(|(index, s)| {
            if s.value.is_finite() {
                Ok(s.value)
            } else {
                Err(AnalysisError::NonFiniteInput {
                    method: method.to_string(),
                    index,
                })
            }
        })
        .collect()
}

struct Flag {
    index: usize,
    expected: f64,
    severity: Severity,
    confidence: f64,
    score_name: &'static str,
    score: f64,
}

fn build_result(
    detector: &dyn AnomalyDetector,
    samples: &[Sample],
    flags: Vec<Flag>,
) -> PerMethodResult {
    let points = flags
        .into_iter()
        .map(|f| {
            let sample = &samples[f.index];
            let mut metadata = BTreeMap::new();
            metadata.insert(f.score_name.to_string(), json!(f.score));
            AnomalyPoint {
                position_index: f.index,
                timestamp: sample.timestamp,
                value: sample.value,
                expected: f.expected,
                deviation: (sample.value - f.expected).abs(),
                severity: f.severity,
                method: detector.name().to_string(),
                confidence: f.confidence.clamp(0.0, MAX_POINT_CONFIDENCE),
                metadata,
            }
        })
        .collect();
    PerMethodResult::from_points(
        detector.name(),
        points,
        samples.len(),
        detector.self_confidence(),
    )
}

// ── 1. Statistical (3σ) ─────────────────────────────────────────────────

/// Flags points more than three standard deviations from the mean.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticalDetector;

impl AnomalyDetector for StatisticalDetector {
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
        let values = finite_values(self.name(), samples)?;
        if values.len() < 3 {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let mean = math::mean(&values);
        let sigma = math::std_dev(&values);
        if sigma < f64::EPSILON {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }

        let flags = values
            .iter()
            .enumerate()
            .filter_map(|(index, &v)| {
                let dev = (v - mean).abs();
                if dev <= 3.0 * sigma {
                    return None;
                }
                let severity = if dev > 4.0 * sigma {
                    Severity::Critical
                } else if dev > 3.5 * sigma {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Flag {
                    index,
                    expected: mean,
                    severity,
                    confidence: (dev / (4.0 * sigma)).min(MAX_POINT_CONFIDENCE),
                    score_name: "sigma_distance",
                    score: dev / sigma,
                })
            })
            .collect();
        Ok(build_result(self, samples, flags))
    }

    fn name(&self) -> &str {
        "statistical"
    }

    fn self_confidence(&self) -> f64 {
        0.8
    }

    fn description(&self) -> &str {
        "values more than 3 standard deviations from the mean"
    }
}

// ── 2. IQR ──────────────────────────────────────────────────────────────

/// Tukey fences at 1.5 × IQR beyond the quartiles.
#[derive(Clone, Copy, Debug, Default)]
pub struct IqrDetector;

impl AnomalyDetector for IqrDetector {
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
        let values = finite_values(self.name(), samples)?;
        if values.len() < 5 {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let sorted = math::sorted(&values);
        let q1 = math::percentile(&sorted, 0.25);
        let q3 = math::percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        if iqr < f64::EPSILON {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let median = math::percentile(&sorted, 0.5);
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;

        let flags = values
            .iter()
            .enumerate()
            .filter_map(|(index, &v)| {
                let (beyond_fence, beyond_quartile) = if v < lower {
                    (lower - v, q1 - v)
                } else if v > upper {
                    (v - upper, v - q3)
                } else {
                    return None;
                };
                let severity = if beyond_quartile > 3.0 * iqr {
                    Severity::Critical
                } else if beyond_quartile > 2.0 * iqr {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Flag {
                    index,
                    expected: median,
                    severity,
                    confidence: (beyond_fence / iqr).min(MAX_POINT_CONFIDENCE),
                    score_name: "iqr_distance",
                    score: beyond_quartile / iqr,
                })
            })
            .collect();
        Ok(build_result(self, samples, flags))
    }

    fn name(&self) -> &str {
        "iqr"
    }

    fn self_confidence(&self) -> f64 {
        0.85
    }

    fn description(&self) -> &str {
        "values outside the 1.5 x IQR fences"
    }
}

// ── 3. Z-score ──────────────────────────────────────────────────────────

/// Flags points whose z-score magnitude exceeds 2.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZScoreDetector;

impl AnomalyDetector for ZScoreDetector {
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
        let values = finite_values(self.name(), samples)?;
        if values.len() < 3 {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let mean = math::mean(&values);
        let sigma = math::std_dev(&values);
        if sigma < f64::EPSILON {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }

        let flags = values
            .iter()
            .enumerate()
            .filter_map(|(index, &v)| {
                let z = (v - mean) / sigma;
                let magnitude = z.abs();
                if magnitude <= 2.0 {
                    return None;
                }
                let severity = if magnitude > 4.0 {
                    Severity::Critical
                } else if magnitude > 3.0 {
                    Severity::High
                } else if magnitude > 2.5 {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                Some(Flag {
                    index,
                    expected: mean,
                    severity,
                    confidence: (magnitude / 4.0).min(MAX_POINT_CONFIDENCE),
                    score_name: "z_score",
                    score: z,
                })
            })
            .collect();
        Ok(build_result(self, samples, flags))
    }

    fn name(&self) -> &str {
        "zscore"
    }

    fn self_confidence(&self) -> f64 {
        0.75
    }

    fn description(&self) -> &str {
        "values with |z| above 2"
    }
}

// ── 4. MAD ──────────────────────────────────────────────────────────────

/// Modified z-score around the median.
#[derive(Clone, Copy, Debug, Default)]
pub struct MadDetector;

impl AnomalyDetector for MadDetector {
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
        let values = finite_values(self.name(), samples)?;
        if values.len() < 3 {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let median = math::median(&values);
        let mad = math::mad(&values, median);
        if mad < f64::EPSILON {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let scale = MAD_SCALE * mad;

        let flags = values
            .iter()
            .enumerate()
            .filter_map(|(index, &v)| {
                let modified_z = (v - median).abs() / scale;
                if modified_z <= 3.0 {
                    return None;
                }
                let severity = if modified_z > 5.0 {
                    Severity::Critical
                } else if modified_z > 4.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Flag {
                    index,
                    expected: median,
                    severity,
                    confidence: (modified_z / 5.0).min(MAX_POINT_CONFIDENCE),
                    score_name: "modified_z_score",
                    score: modified_z,
                })
            })
            .collect();
        Ok(build_result(self, samples, flags))
    }

    fn name(&self) -> &str {
        "mad"
    }

    fn self_confidence(&self) -> f64 {
        0.9
    }

    fn description(&self) -> &str {
        "modified z-score above 3 using the median absolute deviation"
    }
}

// ── 5. Local density ────────────────────────────────────────────────────

/// Density threshold below which a point is isolated.
const DENSITY_THRESHOLD: f64 = 0.05;
/// Most values that take part in the pairwise radius estimate.
const RADIUS_SAMPLE_LIMIT: usize = 2_000;

/// Flags isolated points: those with few neighbors inside a global radius.
///
/// The radius is the 10th percentile of pairwise distances. Series longer
/// than `RADIUS_SAMPLE_LIMIT` estimate it from an evenly strided subsample,
/// which bounds the distance buffer at about two million entries. Neighbor
/// counts still use every point. This is a density heuristic, not an
/// isolation forest.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDensityDetector;

impl LocalDensityDetector {
    fn radius(values: &[f64]) -> Option<f64> {
        let stride = values.len().div_ceil(RADIUS_SAMPLE_LIMIT).max(1);
        let sample: Vec<f64> = values.iter().step_by(stride).copied().collect();
        let mut distances = Vec::with_capacity(sample.len() * sample.len().saturating_sub(1) / 2);
        for (i, a) in sample.iter().enumerate() {
            for b in &sample[i + 1..] {
                distances.push((a - b).abs());
            }
        }
        distances.sort_by(math::cmp_f64);
        let p10 = math::percentile(&distances, 0.1);
        if p10 >= f64::EPSILON {
            return Some(p10);
        }
        distances.into_iter().find(|&d| d >= f64::EPSILON)
    }
}

impl AnomalyDetector for LocalDensityDetector {
    fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
        let values = finite_values(self.name(), samples)?;
        let n = values.len();
        if n < 5 {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        }
        let Some(radius) = Self::radius(&values) else {
            return Ok(PerMethodResult::empty(self.name(), self.self_confidence()));
        };
        let mean = math::mean(&values);

        let flags = values
            .iter()
            .enumerate()
            .filter_map(|(index, &v)| {
                let neighbors = values
                    .iter()
                    .enumerate()
                    .filter(|&(j, &other)| j != index && (v - other).abs() <= radius)
                    .count();
                let density = neighbors as f64 / (n - 1) as f64;
                if density >= DENSITY_THRESHOLD {
                    return None;
                }
                let severity = if density < 0.01 {
                    Severity::Critical
                } else if density < 0.02 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Flag {
                    index,
                    expected: mean,
                    severity,
                    confidence: ((DENSITY_THRESHOLD - density) / DENSITY_THRESHOLD)
                        .min(MAX_POINT_CONFIDENCE),
                    score_name: "density",
                    score: density,
                })
            })
            .collect();
        Ok(build_result(self, samples, flags))
    }

    fn name(&self) -> &str {
        "local_density"
    }

    fn self_confidence(&self) -> f64 {
        0.7
    }

    fn description(&self) -> &str {
        "points with under 5% of the series inside the 10th-percentile pairwise radius"
    }
}
