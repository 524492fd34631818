//! # signalscope-engine
//!
//! Feature extraction for alert metrics. Given a primary metric series and
//! optional related series, the engine cleans and quality-scores the input,
//! then extracts five feature families concurrently and merges them into a
//! [`FeatureBundle`](signalscope_types::FeatureBundle).
//!
//! ## Architecture
//!
//! ```text
//!   raw MetricSeries ──► standardize (clean + quality) ──┐
//!                                                        │
//!          ┌───────────────┬──────────────┬──────────────┼──────────────┐
//!          ▼               ▼              ▼              ▼              ▼
//!     Statistical     TimeSeries      Ensemble        Pattern     Correlation
//!     Extractor       Extractor       Detector        Recognizer  Analyzer
//!          └───────────────┴──────────────┴──────────────┴──────────────┘
//!                                        │
//!                                        ▼
//!                                  FeatureBundle
//! ```
//!
//! Insufficient data is never an error: every extractor returns a
//! zero-valued record. Configuration is the only fatal input and is checked
//! once in [`FeatureEngine::new`].

#![deny(unsafe_code)]

pub mod anomaly;
pub mod cleaning;
pub mod correlation;
pub mod math;
pub mod orchestrator;
pub mod pattern;
pub mod quality;
pub mod statistical;
pub mod timeseries;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use anomaly::{
    AnomalyDetector, EnsembleDetector, IqrDetector, LocalDensityDetector, MadDetector,
    StatisticalDetector, ZScoreDetector,
};
pub use cleaning::clean_series;
pub use correlation::{lag_search, CorrelationAnalyzer};
pub use orchestrator::FeatureEngine;
pub use pattern::PatternRecognizer;
pub use quality::QualityScorer;
pub use statistical::StatisticalExtractor;
pub use timeseries::{candidate_periods, TimeSeriesExtractor};
