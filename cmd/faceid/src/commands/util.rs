//! Utility functions for CLI commands.

use faceid_pipeline::{load_config, load_file, PipelineConfig};
use serde::de::DeserializeOwned;

use crate::Cli;

/// Loads the pipeline config named by `--config`, or the defaults.
pub fn get_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let cfg = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    Ok(cfg.validated()?)
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    Ok(load_file(path)?)
}

/// Requires input file to be provided.
pub fn require_input_file(cli: &Cli) -> anyhow::Result<&str> {
    cli.input
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("input file is required, use -f flag"))
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)?
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}
