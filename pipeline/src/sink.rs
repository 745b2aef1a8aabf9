use faceid_assign::Decision;
use faceid_tracklet::Track;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Receives resolved faces and tracks for persistence.
///
/// The pipeline never stores decisions itself. Implementations must be safe
/// for concurrent use; videos are resolved in parallel. Use [`MemorySink`]
/// for tests or ephemeral runs.
pub trait ResolutionSink: Send + Sync {
    /// Called once per photo face that produced a decision.
    fn record_face(&self, detection_id: &str, decision: &Decision) -> Result<(), PipelineError>;

    /// Called once per completed video track with the decision for its best
    /// detection.
    fn record_track(&self, track: &Track, decision: &Decision) -> Result<(), PipelineError>;
}

/// One item handed to a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkRecord {
    Face {
        detection_id: String,
        decision: Decision,
    },
    Track {
        video_id: String,
        track_id: String,
        best_detection_id: String,
        decision: Decision,
    },
}

/// In-memory [`ResolutionSink`]. Data is lost on drop.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in arrival order.
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ResolutionSink for MemorySink {
    fn record_face(&self, detection_id: &str, decision: &Decision) -> Result<(), PipelineError> {
        self.records.lock().push(SinkRecord::Face {
            detection_id: detection_id.to_string(),
            decision: decision.clone(),
        });
        Ok(())
    }

    fn record_track(&self, track: &Track, decision: &Decision) -> Result<(), PipelineError> {
        self.records.lock().push(SinkRecord::Track {
            video_id: track.video_id.clone(),
            track_id: track.track_id.clone(),
            best_detection_id: track.best_detection_id.clone(),
            decision: decision.clone(),
        });
        Ok(())
    }
}
