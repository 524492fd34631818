//! Analysis configuration loading.

use std::path::Path;

use signalscope_types::AnalysisConfig;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Load and validate the configuration at `path`, or the defaults when no
/// path is given. The format follows the file extension.
pub fn load_config(path: Option<&Path>) -> CliResult<AnalysisConfig> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => {
            debug!("no config file given, using defaults");
            AnalysisConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// Parse a config file without validating it.
pub fn read_config(path: &Path) -> CliResult<AnalysisConfig> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let config = match extension.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
        Some("json") => serde_json::from_str(&contents)?,
        _ => {
            return Err(CliError::Config(format!(
                "{}: expected a .yaml, .yml or .json file",
                path.display()
            )))
        }
    };
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscope_types::FeatureFamily;
    use std::io::Write;

    fn file_with(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn loads_yaml() {
        let file = file_with(".yaml", "enabled_features: [anomaly]\nmin_data_points: 5\n");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.enabled_features, vec![FeatureFamily::Anomaly]);
        assert_eq!(config.min_data_points, 5);
    }

    #[test]
    fn loads_json() {
        let file = file_with(".json", r#"{"correlation": {"max_lag_periods": 4}}"#);
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.correlation.max_lag_periods, 4);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = file_with(".toml", "min_data_points = 5");
        assert!(matches!(
            load_config(Some(file.path())),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = file_with(".yml", "ensemble:\n  consensus_weight: 3.0\n");
        assert!(matches!(
            load_config(Some(file.path())),
            Err(CliError::Analysis(_))
        ));
        // parsing alone still succeeds
        assert!(read_config(file.path()).is_ok());
    }
}
