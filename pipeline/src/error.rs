use std::io;

use faceid_assign::AssignError;
use faceid_tracklet::TrackError;
use faceid_vecstore::VecError;
use thiserror::Error;

/// Errors returned by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] VecError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("pipeline: sink: {0}")]
    Sink(String),

    #[error("pipeline: invalid config: {0}")]
    InvalidConfig(String),

    #[error("pipeline: failed to read file: {0}")]
    ReadFile(#[from] io::Error),

    #[error("pipeline: failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("pipeline: failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("pipeline: failed to parse file (tried YAML and JSON)")]
    ParseFailed,
}
