use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::geometry::BoundingBox;

/// One face found by the detector in one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameFace {
    pub detection_id: String,

    /// Index of the sampled frame within the video.
    pub frame_number: u64,

    pub timestamp_ms: u64,

    pub bbox: BoundingBox,

    /// Raw embedding as produced by the model.
    pub embedding: Vec<f32>,

    /// Detector quality in [0, 1]; higher is sharper and more frontal.
    pub quality_score: f32,
}

impl FrameFace {
    /// Checks the detector output that does not depend on other faces: a
    /// finite positive-area box and a quality score in [0, 1].
    pub fn validate(&self) -> Result<(), TrackError> {
        self.bbox.validate()?;
        if !self.quality_score.is_finite() || !(0.0..=1.0).contains(&self.quality_score) {
            return Err(TrackError::InvalidQuality(self.quality_score));
        }
        Ok(())
    }
}

/// A contiguous run of detections believed to be the same face.
///
/// `start_frame`/`end_frame` are the min/max frame numbers of `detections`,
/// and `best_detection_id` names the detection with the highest quality
/// (the earliest one on ties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub video_id: String,
    pub detections: Vec<FrameFace>,
    pub start_frame: u64,
    pub end_frame: u64,
    pub best_detection_id: String,
}

impl Track {
    /// Builds a track from detections in frame order. Returns None when
    /// `detections` is empty.
    pub(crate) fn from_detections(
        track_id: String,
        video_id: String,
        detections: Vec<FrameFace>,
    ) -> Option<Self> {
        let first = detections.first()?;
        let mut start_frame = first.frame_number;
        let mut end_frame = first.frame_number;
        let mut best = first;
        for d in &detections[1..] {
            start_frame = start_frame.min(d.frame_number);
            end_frame = end_frame.max(d.frame_number);
            if d.quality_score > best.quality_score {
                best = d;
            }
        }
        let best_detection_id = best.detection_id.clone();
        Some(Self {
            track_id,
            video_id,
            detections,
            start_frame,
            end_frame,
            best_detection_id,
        })
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// The detection handed to identity resolution for this track.
    pub fn best_detection(&self) -> Option<&FrameFace> {
        self.detections
            .iter()
            .find(|d| d.detection_id == self.best_detection_id)
    }
}
