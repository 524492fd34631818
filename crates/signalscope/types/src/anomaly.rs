//! Anomaly records produced by the detectors and the ensemble.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Severity ────────────────────────────────────────────────────────────

/// Severity of a flagged point.
///
/// `ordinal()` and `from_mean_ordinal()` are the only mapping between
/// severities and numbers; every average or comparison goes through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Canonical ordinal: low=1, medium=2, high=3, critical=4.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Re-bin an averaged ordinal at 1.5 / 2.5 / 3.5.
    pub fn from_mean_ordinal(mean: f64) -> Self {
        if mean < 1.5 {
            Self::Low
        } else if mean < 2.5 {
            Self::Medium
        } else if mean < 3.5 {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Average a set of severities through the ordinal table.
    pub fn mean_of<I>(severities: I) -> Option<Self>
    where
        I: IntoIterator<Item = Severity>,
    {
        let (sum, count) = severities
            .into_iter()
            .fold((0u32, 0u32), |(s, c), sev| (s + sev.ordinal() as u32, c + 1));
        (count > 0).then(|| Self::from_mean_ordinal(sum as f64 / count as f64))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ── Anomaly Point ───────────────────────────────────────────────────────

/// A single flagged observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPoint {
    /// Index into the slice as received by the producing detector.
    pub position_index: usize,
    pub timestamp: i64,
    pub value: f64,
    /// Value the detector considered normal (mean, median, quartile...).
    pub expected: f64,
    /// Absolute distance between `value` and `expected`.
    pub deviation: f64,
    pub severity: Severity,
    /// Producing method name, or `consensus` for reconciled points.
    pub method: String,
    /// Point confidence (0.0 to 1.0).
    pub confidence: f64,
    /// Detector-specific scores.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

// ── Per-method Result ───────────────────────────────────────────────────

/// Output of one detector over one series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerMethodResult {
    pub method: String,
    pub anomaly_points: Vec<AnomalyPoint>,
    pub anomaly_count: usize,
    /// `anomaly_count / total points`.
    pub anomaly_rate: f64,
    /// Highest severity among the points, if any were flagged.
    pub overall_severity: Option<Severity>,
    /// The detector's fixed self-rated reliability.
    pub confidence_score: f64,
}

impl PerMethodResult {
    /// An empty result for a detector that did not flag anything.
    pub fn empty(method: &str, confidence_score: f64) -> Self {
        Self {
            method: method.to_string(),
            confidence_score,
            ..Self::default()
        }
    }

    /// Build a result from flagged points, deriving count, rate and severity.
    pub fn from_points(
        method: &str,
        points: Vec<AnomalyPoint>,
        total: usize,
        confidence_score: f64,
    ) -> Self {
        let anomaly_count = points.len();
        let anomaly_rate = if total == 0 {
            0.0
        } else {
            anomaly_count as f64 / total as f64
        };
        let overall_severity = points.iter().map(|p| p.severity).max();
        Self {
            method: method.to_string(),
            anomaly_points: points,
            anomaly_count,
            anomaly_rate,
            overall_severity,
            confidence_score,
        }
    }
}

// ── Ensemble Result ─────────────────────────────────────────────────────

/// Reconciled output of all detectors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    /// Detectors that ran successfully, in run order.
    pub methods_run: Vec<String>,
    pub per_method_results: Vec<PerMethodResult>,
    /// Points flagged by at least `min_consensus` detectors.
    pub consensus_points: Vec<AnomalyPoint>,
    /// Consensus plus high-confidence single-detector points, ranked.
    pub final_anomalies: Vec<AnomalyPoint>,
    /// Confidence-weighted cleanliness (higher is cleaner data).
    pub aggregated_score: f64,
    /// How much the detectors agree with each other.
    pub reliability_score: f64,
}

// ── Anomaly Feature Set ─────────────────────────────────────────────────

/// Prompt-facing summary of an ensemble run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFeatureSet {
    pub total_points: usize,
    /// Length of the final ranked list.
    pub anomaly_count: usize,
    pub consensus_count: usize,
    /// `anomaly_count / total_points`.
    pub anomaly_rate: f64,
    pub max_severity: Option<Severity>,
    pub severity_counts: BTreeMap<Severity, usize>,
    /// Head of the final ranked list.
    pub top_anomalies: Vec<AnomalyPoint>,
    pub methods_run: Vec<String>,
    /// Flagged point count per method.
    pub method_counts: BTreeMap<String, usize>,
    pub aggregated_score: f64,
    pub reliability_score: f64,
    pub ensemble: EnsembleResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(severity: Severity) -> AnomalyPoint {
        AnomalyPoint {
            position_index: 0,
            timestamp: 1,
            value: 10.0,
            expected: 1.0,
            deviation: 9.0,
            severity,
            method: "test".into(),
            confidence: 0.5,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_ordinal_round_trip() {
        for sev in Severity::ALL {
            assert_eq!(Severity::from_mean_ordinal(sev.ordinal() as f64), sev);
        }
    }

    #[test]
    fn severity_rebinning_thresholds() {
        assert_eq!(Severity::from_mean_ordinal(1.49), Severity::Low);
        assert_eq!(Severity::from_mean_ordinal(1.5), Severity::Medium);
        assert_eq!(Severity::from_mean_ordinal(2.5), Severity::High);
        assert_eq!(Severity::from_mean_ordinal(3.5), Severity::Critical);
    }

    #[test]
    fn severity_mean_of() {
        // (2 + 4) / 2 = 3 -> high
        let mean = Severity::mean_of([Severity::Medium, Severity::Critical]);
        assert_eq!(mean, Some(Severity::High));
        assert_eq!(Severity::mean_of([]), None);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(Severity::High.to_string(), "high");
    }

    #[test]
    fn per_method_result_from_points() {
        let r = PerMethodResult::from_points(
            "zscore",
            vec![point(Severity::Low), point(Severity::High)],
            10,
            0.75,
        );
        assert_eq!(r.anomaly_count, 2);
        assert!((r.anomaly_rate - 0.2).abs() < f64::EPSILON);
        assert_eq!(r.overall_severity, Some(Severity::High));
    }

    #[test]
    fn per_method_result_empty_input() {
        let r = PerMethodResult::from_points("iqr", vec![], 0, 0.85);
        assert_eq!(r.anomaly_rate, 0.0);
        assert_eq!(r.overall_severity, None);
    }
}
