use faceid_vecstore::VecError;
use thiserror::Error;

/// Errors returned by tracking operations.
///
/// All per-face variants reject one detection only; the video keeps going.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("tracklet: invalid bounding box {x},{y},{w},{h}")]
    InvalidBox { x: f32, y: f32, w: f32, h: f32 },

    #[error("tracklet: invalid embedding: {0}")]
    Embedding(#[from] VecError),

    #[error("tracklet: quality score {0} outside [0, 1]")]
    InvalidQuality(f32),

    #[error("tracklet: face from frame {got} pushed with frame {expected}")]
    FrameMismatch { expected: u64, got: u64 },

    #[error("tracklet: frame {frame} is not after frame {last}")]
    OutOfOrder { frame: u64, last: u64 },

    #[error("tracklet: invalid config: {0}")]
    InvalidConfig(String),
}
