//! Ensemble anomaly detection.
//!
//! Five detectors run over the same sample slice, then the ensemble
//! reconciles their flags into consensus points and a ranked final list.
//!
//! ## Architecture
//!
//! ```text
//!   &[Sample]
//!       │
//!       ├──► StatisticalDetector (3σ)
//!       ├──► IqrDetector (Tukey fences)
//!       ├──► ZScoreDetector (|z| > 2)
//!       ├──► MadDetector (modified z-score)
//!       └──► LocalDensityDetector (pairwise radius)
//!             │
//!             ▼
//!       EnsembleDetector (consensus + ranking) ──► EnsembleResult
//! ```

pub mod detectors;
pub mod ensemble;

pub use detectors::{
    AnomalyDetector, IqrDetector, LocalDensityDetector, MadDetector, StatisticalDetector,
    ZScoreDetector,
};
pub use ensemble::EnsembleDetector;

/// Shortest series any detector looks at.
pub const MIN_DETECTION_POINTS: usize = 3;
