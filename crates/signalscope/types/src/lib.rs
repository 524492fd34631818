//! # signalscope-types
//!
//! Data model shared by the signalscope engine and its callers: raw metric
//! samples, the feature sets extracted from them, anomaly records, and the
//! analysis configuration.
//!
//! Everything here is plain data. Records are produced fresh per analysis
//! call and serialize with snake_case field names, which the downstream
//! prompt layer interpolates and reads back.

#![deny(unsafe_code)]

pub mod anomaly;
pub mod config;
pub mod error;
pub mod features;
pub mod sample;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use anomaly::{AnomalyFeatureSet, AnomalyPoint, EnsembleResult, PerMethodResult, Severity};
pub use config::{
    AnalysisConfig, CorrelationConfig, EnsembleConfig, PatternConfig, QualityConfig,
    TimeSeriesConfig, DETECTOR_COUNT,
};
pub use error::{AnalysisError, AnalysisResult};
pub use features::{
    CorrelationFeatureSet, CorrelationStrength, FeatureBundle, FeatureFamily, FeatureWarning,
    LagAnalysis, LagCorrelation, MetricCorrelation, PatternFeatureSet, StatisticalFeatureSet,
    TimeSeriesFeatureSet, TrendType,
};
pub use sample::{MetricSeries, QualityInfo, Sample, SampleQuality, DEFAULT_QUALITY_SOURCE};
