//! Feature sets produced by the extractors and the merged bundle.
//!
//! Every field is zero-valued, never absent, when the input is too short
//! for a sub-analysis. Field names are read back by the prompt layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyFeatureSet;
use crate::sample::QualityInfo;

// ── Statistical ─────────────────────────────────────────────────────────

/// Descriptive statistics over a value sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatureSet {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal distribution = 0).
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub p95: f64,
    pub p99: f64,
}

// ── Time Series ─────────────────────────────────────────────────────────

/// Direction of the fitted trend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    #[default]
    Stable,
    Increasing,
    Decreasing,
    Volatile,
}

impl std::fmt::Display for TrendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Volatile => write!(f, "volatile"),
        }
    }
}

/// Temporal behavior of a series sorted by timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesFeatureSet {
    pub length: usize,

    // Trend
    pub trend_type: TrendType,
    pub trend_slope: f64,
    pub trend_intercept: f64,
    pub trend_r2: f64,
    pub trend_strength: f64,

    // Seasonality
    pub seasonality: bool,
    pub dominant_period: usize,
    pub seasonal_strength: f64,
    pub seasonal_amplitude: f64,
    /// Periods that were scored, ascending.
    pub candidate_periods: Vec<usize>,

    // Stationarity
    pub is_stationary: bool,
    pub mean_drift: f64,
    pub variance_drift: f64,
    pub differencing_order: u32,

    // Autocorrelation
    /// Autocorrelation at lags 1..=max_lag.
    pub autocorrelation: Vec<f64>,
    /// Approximate partial autocorrelation, exact for the first two lags.
    pub partial_autocorrelation: Vec<f64>,
    pub max_autocorrelation: f64,
    pub max_autocorrelation_lag: usize,

    // Volatility
    pub volatility: f64,
    pub local_variability: f64,

    // Change points
    pub change_points: Vec<usize>,
    pub change_point_count: usize,

    // Distribution drift
    pub mean_shift: bool,
    pub variance_change: bool,
    pub distribution_stability: f64,
    pub segment_means: Vec<f64>,
    pub segment_variances: Vec<f64>,
}

// ── Pattern ─────────────────────────────────────────────────────────────

/// Coarse pattern classification for downstream summarization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternFeatureSet {
    /// `increasing`, `decreasing` or `none`.
    pub trend_pattern: String,
    pub trend_confidence: f64,
    pub has_seasonality: bool,
    pub seasonal_period: usize,
    pub seasonal_confidence: f64,
    pub has_cycle: bool,
    pub cycle_length: usize,
    pub cycle_confidence: f64,
    /// Mean of the non-zero confidences above.
    pub overall_confidence: f64,
}

// ── Correlation ─────────────────────────────────────────────────────────

/// Strength band of a correlation coefficient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    #[default]
    Negligible,
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    /// Band an absolute coefficient at 0.3 / 0.5 / 0.8.
    pub fn from_coefficient(r: f64) -> Self {
        let r = r.abs();
        if r >= 0.8 {
            Self::Strong
        } else if r >= 0.5 {
            Self::Moderate
        } else if r >= 0.3 {
            Self::Weak
        } else {
            Self::Negligible
        }
    }
}

/// Correlation at a single shift.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    /// Positive: the related metric trails the primary by `lag` samples.
    pub lag: i64,
    pub correlation: f64,
}

/// Result of a brute-force lag search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LagAnalysis {
    pub best_lag: i64,
    pub best_correlation: f64,
    pub lag_correlations: Vec<LagCorrelation>,
}

/// Correlation between the primary metric and one related metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCorrelation {
    pub metric: String,
    pub correlation: f64,
    pub strength: CorrelationStrength,
    pub confidence: f64,
    pub sample_size: usize,
    pub lag: LagAnalysis,
}

/// Correlations of the primary metric against its related metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFeatureSet {
    pub analyzed_count: usize,
    pub significant_count: usize,
    /// Retained pairs, strongest first.
    pub correlations: Vec<MetricCorrelation>,
    pub strongest_metric: Option<String>,
    pub strongest_correlation: f64,
}

// ── Bundle ──────────────────────────────────────────────────────────────

/// One independently extracted feature family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Statistical,
    TimeSeries,
    Anomaly,
    Pattern,
    Correlation,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 5] = [
        FeatureFamily::Statistical,
        FeatureFamily::TimeSeries,
        FeatureFamily::Anomaly,
        FeatureFamily::Pattern,
        FeatureFamily::Correlation,
    ];
}

impl std::fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Statistical => write!(f, "statistical"),
            Self::TimeSeries => write!(f, "time_series"),
            Self::Anomaly => write!(f, "anomaly"),
            Self::Pattern => write!(f, "pattern"),
            Self::Correlation => write!(f, "correlation"),
        }
    }
}

/// A non-fatal problem recorded while building a bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureWarning {
    /// Affected family, or `None` for bundle-wide findings.
    pub family: Option<FeatureFamily>,
    pub message: String,
}

/// All features extracted for one metric.
///
/// A family is `None` when it was disabled or its task failed; failures
/// also leave an entry in `warnings`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    pub metric_name: String,
    pub generated_at: DateTime<Utc>,
    pub data_quality: QualityInfo,
    pub statistical: Option<StatisticalFeatureSet>,
    pub time_series: Option<TimeSeriesFeatureSet>,
    pub anomaly: Option<AnomalyFeatureSet>,
    pub pattern: Option<PatternFeatureSet>,
    pub correlation: Option<CorrelationFeatureSet>,
    #[serde(default)]
    pub warnings: Vec<FeatureWarning>,
}

impl FeatureBundle {
    pub fn new(metric_name: impl Into<String>, data_quality: QualityInfo) -> Self {
        Self {
            metric_name: metric_name.into(),
            generated_at: Utc::now(),
            data_quality,
            statistical: None,
            time_series: None,
            anomaly: None,
            pattern: None,
            correlation: None,
            warnings: Vec::new(),
        }
    }

    /// Families present in the bundle.
    pub fn families(&self) -> Vec<FeatureFamily> {
        let mut present = Vec::new();
        if self.statistical.is_some() {
            present.push(FeatureFamily::Statistical);
        }
        if self.time_series.is_some() {
            present.push(FeatureFamily::TimeSeries);
        }
        if self.anomaly.is_some() {
            present.push(FeatureFamily::Anomaly);
        }
        if self.pattern.is_some() {
            present.push(FeatureFamily::Pattern);
        }
        if self.correlation.is_some() {
            present.push(FeatureFamily::Correlation);
        }
        present
    }

    pub fn warn(&mut self, family: Option<FeatureFamily>, message: impl Into<String>) {
        self.warnings.push(FeatureWarning {
            family,
            message: message.into(),
        });
    }
}
