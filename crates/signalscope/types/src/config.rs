//! Analysis configuration.
//!
//! All sections deserialize with defaults so partial config files work.
//! `validate()` is the only fatal check in the pipeline and runs before
//! any analysis.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::features::FeatureFamily;

/// Number of detectors the ensemble runs.
pub const DETECTOR_COUNT: usize = 5;

// ── Top Level ───────────────────────────────────────────────────────────

/// Configuration for one feature engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Feature families to extract.
    pub enabled_features: Vec<FeatureFamily>,
    /// Series shorter than this get a warning and a halved quality score.
    pub min_data_points: usize,
    /// Quality score below which the bundle carries a warning.
    pub quality_threshold: f64,
    pub ensemble: EnsembleConfig,
    pub pattern: PatternConfig,
    pub correlation: CorrelationConfig,
    pub quality: QualityConfig,
    pub time_series: TimeSeriesConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled_features: FeatureFamily::ALL.to_vec(),
            min_data_points: 10,
            quality_threshold: 0.7,
            ensemble: EnsembleConfig::default(),
            pattern: PatternConfig::default(),
            correlation: CorrelationConfig::default(),
            quality: QualityConfig::default(),
            time_series: TimeSeriesConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate every section.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.enabled_features.is_empty() {
            return Err(AnalysisError::invalid_config(
                "enabled_features",
                "at least one feature family must be enabled",
            ));
        }
        let mut seen = HashSet::new();
        for family in &self.enabled_features {
            if !seen.insert(family) {
                return Err(AnalysisError::invalid_config(
                    "enabled_features",
                    format!("duplicate entry {}", family),
                ));
            }
        }
        if self.min_data_points == 0 {
            return Err(AnalysisError::invalid_config(
                "min_data_points",
                "must be at least 1",
            ));
        }
        check_unit_interval("quality_threshold", self.quality_threshold)?;

        self.ensemble.validate()?;
        self.pattern.validate()?;
        self.correlation.validate()?;
        self.quality.validate()?;
        self.time_series.validate()?;

        Ok(())
    }

    pub fn is_enabled(&self, family: FeatureFamily) -> bool {
        self.enabled_features.contains(&family)
    }
}

fn check_unit_interval(field: &str, value: f64) -> AnalysisResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AnalysisError::invalid_config(
            field,
            format!("{} is outside 0..=1", value),
        ));
    }
    Ok(())
}

// ── Ensemble ────────────────────────────────────────────────────────────

/// Consensus reconciliation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight applied to consensus confidences; `1 - weight` scales the rest.
    pub consensus_weight: f64,
    /// Distinct detectors that must flag a point for consensus.
    pub min_consensus: usize,
    /// How many ranked anomalies the feature summary keeps.
    pub top_anomalies: usize,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            consensus_weight: 0.7,
            min_consensus: 2,
            top_anomalies: 10,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        check_unit_interval("ensemble.consensus_weight", self.consensus_weight)?;
        if self.min_consensus == 0 || self.min_consensus > DETECTOR_COUNT {
            return Err(AnalysisError::invalid_config(
                "ensemble.min_consensus",
                format!("{} is outside 1..={}", self.min_consensus, DETECTOR_COUNT),
            ));
        }
        Ok(())
    }
}

// ── Pattern ─────────────────────────────────────────────────────────────

/// Pattern recognizer thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Shortest cycle length scanned.
    pub min_pattern_length: usize,
    /// Longest cycle length scanned.
    pub max_pattern_length: usize,
    /// Cross-cycle correlation needed to call a pattern present.
    pub similarity_threshold: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_pattern_length: 3,
            max_pattern_length: 50,
            similarity_threshold: 0.8,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.min_pattern_length < 2 {
            return Err(AnalysisError::invalid_config(
                "pattern.min_pattern_length",
                "must be at least 2",
            ));
        }
        if self.max_pattern_length < self.min_pattern_length {
            return Err(AnalysisError::invalid_config(
                "pattern.max_pattern_length",
                format!(
                    "{} is below min_pattern_length {}",
                    self.max_pattern_length, self.min_pattern_length
                ),
            ));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(AnalysisError::invalid_config(
                "pattern.similarity_threshold",
                format!("{} is outside (0, 1]", self.similarity_threshold),
            ));
        }
        Ok(())
    }
}

// ── Correlation ─────────────────────────────────────────────────────────

/// Correlation analyzer thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Minimum absolute coefficient for a pair to be retained.
    pub min_correlation_threshold: f64,
    /// Lag search window in samples, each direction.
    pub max_lag_periods: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_correlation_threshold: 0.3,
            max_lag_periods: 10,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        check_unit_interval(
            "correlation.min_correlation_threshold",
            self.min_correlation_threshold,
        )
    }
}

// ── Quality ─────────────────────────────────────────────────────────────

/// Data-quality scorer thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// IQR multiplier for counting outliers.
    pub outlier_threshold: f64,
    /// Missing fraction above which an issue is reported.
    pub missing_data_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: 1.5,
            missing_data_threshold: 0.1,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.outlier_threshold > 0.0) || !self.outlier_threshold.is_finite() {
            return Err(AnalysisError::invalid_config(
                "quality.outlier_threshold",
                format!("{} must be positive", self.outlier_threshold),
            ));
        }
        check_unit_interval("quality.missing_data_threshold", self.missing_data_threshold)
    }
}

// ── Time Series ─────────────────────────────────────────────────────────

/// Time-series extractor settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// Seasonal periods to score, in samples. Empty derives them from the
    /// sampling interval.
    pub seasonal_periods: Vec<usize>,
}

impl TimeSeriesConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if let Some(p) = self.seasonal_periods.iter().find(|&&p| p < 2) {
            return Err(AnalysisError::invalid_config(
                "time_series.seasonal_periods",
                format!("period {} is shorter than 2 samples", p),
            ));
        }
        Ok(())
    }
}
