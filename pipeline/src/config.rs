//! Aggregate configuration and YAML/JSON loading.

use std::fs;
use std::path::Path;

use faceid_assign::AssignConfig;
use faceid_tracklet::{FrameSampler, TrackerConfig};
use faceid_vecstore::IndexConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Everything needed to build an [`crate::IdentityResolutionPipeline`].
///
/// Every section may be omitted from a config file:
///
/// ```yaml
/// index:
///   dim: 512
///   approx_threshold: 10000
/// assign:
///   auto_assign_min: 0.55
///   review_min: 0.5
/// tracker:
///   stale_gap_frames: 10
/// sample_fps: 1.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub index: IndexConfig,
    pub assign: AssignConfig,
    pub tracker: TrackerConfig,

    /// Detection rate for video. Default: 1.0.
    pub sample_fps: f64,

    /// Expected number of prototypes; picks the index backend.
    /// Default: 0 (exact).
    pub expected_prototypes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            assign: AssignConfig::default(),
            tracker: TrackerConfig::default(),
            sample_fps: FrameSampler::DEFAULT_SAMPLE_FPS,
            expected_prototypes: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, PipelineError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Normalizes zero-valued index knobs and checks every section.
    pub fn validated(mut self) -> Result<Self, PipelineError> {
        self.index = self.index.with_defaults();
        self.assign.validate()?;
        self.tracker.validate()?;
        if !self.sample_fps.is_finite() || self.sample_fps <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_fps must be positive, got {}",
                self.sample_fps
            )));
        }
        Ok(self)
    }
}

/// Loads a [`PipelineConfig`] from a YAML or JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig, PipelineError> {
    load_file(path)
}

/// Loads any deserializable value from a YAML or JSON file.
///
/// The format follows the extension; unknown extensions try YAML, then JSON.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, PipelineError> {
    let data = fs::read(path.as_ref())?;
    parse_file(&data, path.as_ref())
}

pub fn parse_file<T: DeserializeOwned>(data: &[u8], path: &Path) -> Result<T, PipelineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        _ => {
            if let Ok(v) = serde_yaml::from_slice(data) {
                return Ok(v);
            }
            if let Ok(v) = serde_json::from_slice(data) {
                return Ok(v);
            }
            Err(PipelineError::ParseFailed)
        }
    }
}
