use thiserror::Error;

use crate::features::FeatureFamily;

/// Errors from the analysis engine.
///
/// Short input is never an error; extractors return zero-valued records.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {field} -- {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("{method}: non-finite value at index {index}")]
    NonFiniteInput { method: String, index: usize },

    #[error("{family} extraction failed: {reason}")]
    TaskFailed { family: FeatureFamily, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = AnalysisError::invalid_config("ensemble.consensus_weight", "must be within 0..=1");
        assert!(e.to_string().contains("ensemble.consensus_weight"));

        let e = AnalysisError::NonFiniteInput {
            method: "mad".into(),
            index: 7,
        };
        assert_eq!(e.to_string(), "mad: non-finite value at index 7");

        let e = AnalysisError::TaskFailed {
            family: FeatureFamily::Correlation,
            reason: "panicked".into(),
        };
        assert!(e.to_string().starts_with("correlation extraction failed"));
    }

    #[test]
    fn serde_error_conversion() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let e: AnalysisError = err.into();
        assert!(e.to_string().starts_with("serialization error"));
    }
}
