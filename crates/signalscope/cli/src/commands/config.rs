//! `validate-config` and `default-config` commands

use std::path::Path;

use signalscope_types::AnalysisConfig;

use crate::config::read_config;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};

/// Parse and validate the config file at `path`.
pub fn validate(path: &Path) -> CliResult<()> {
    let config = read_config(path)?;
    config.validate()?;
    println!(
        "{}: configuration is valid ({} feature families enabled)",
        path.display(),
        config.enabled_features.len()
    );
    Ok(())
}

/// Print the default configuration.
pub fn print_default(format: OutputFormat) -> CliResult<()> {
    output::print(&AnalysisConfig::default(), format)
}
