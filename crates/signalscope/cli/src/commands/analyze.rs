//! `analyze` command

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use signalscope_engine::FeatureEngine;
use signalscope_types::{AnalysisConfig, MetricSeries};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};
use crate::output::{self, OutputFormat};

/// Analysis request read from the input file.
#[derive(Debug, Deserialize)]
pub struct AnalysisInput {
    /// Metric the alert fired on.
    pub primary: MetricSeries,
    /// Metrics to correlate against the primary.
    #[serde(default)]
    pub related: Vec<MetricSeries>,
}

impl AnalysisInput {
    /// Read a request from `path`, or from stdin when `path` is `-`.
    pub fn load(path: &Path) -> CliResult<Self> {
        let contents = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path)?
        };
        let input: Self = serde_json::from_str(&contents)?;
        if input.primary.is_empty() {
            return Err(CliError::InvalidInput(format!(
                "primary metric '{}' has no samples",
                input.primary.name
            )));
        }
        Ok(input)
    }
}

/// Extract features for the request at `input` and print the bundle.
pub async fn execute(input: &Path, config: AnalysisConfig, format: OutputFormat) -> CliResult<()> {
    let request = AnalysisInput::load(input)?;
    let engine = FeatureEngine::new(config)?;

    info!(
        metric = %request.primary.name,
        points = request.primary.len(),
        related = request.related.len(),
        "extracting features"
    );
    let bundle = engine
        .extract_features(&request.primary, &request.related)
        .await;
    for warning in &bundle.warnings {
        match warning.family {
            Some(family) => warn!(family = %family, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    output::print(&bundle, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn related_defaults_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"primary": {{"name": "cpu", "series": [{{"timestamp": 1, "value": 2.0}}]}}}}"#
        )
        .unwrap();
        let input = AnalysisInput::load(file.path()).unwrap();
        assert_eq!(input.primary.name, "cpu");
        assert!(input.related.is_empty());
    }

    #[test]
    fn empty_primary_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"primary": {{"name": "cpu"}}}}"#).unwrap();
        assert!(matches!(
            AnalysisInput::load(file.path()),
            Err(CliError::InvalidInput(_))
        ));
    }
}
