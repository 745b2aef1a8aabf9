use std::sync::Arc;

use faceid_assign::{Action, Decision, PrototypeAssigner};
use faceid_tracklet::{build_tracks, FrameFace, FrameSampler, RejectedFace, Track, TrackerConfig};
use faceid_vecstore::{Prototype, PrototypeIndex};
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::sink::ResolutionSink;

/// Outcome for one photo face.
#[derive(Debug)]
pub struct FaceResolution {
    pub detection_id: String,
    pub outcome: Result<Decision, PipelineError>,
    /// Set when the decision was made but the sink refused it.
    pub sink_error: Option<PipelineError>,
}

impl Serialize for FaceResolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FaceResolution", 4)?;
        s.serialize_field("detection_id", &self.detection_id)?;
        s.serialize_field("decision", &self.outcome.as_ref().ok())?;
        s.serialize_field("error", &self.outcome.as_ref().err().map(|e| e.to_string()))?;
        s.serialize_field("sink_error", &self.sink_error.as_ref().map(|e| e.to_string()))?;
        s.end()
    }
}

/// Outcome for one completed video track, decided on its best detection.
#[derive(Debug)]
pub struct TrackResolution {
    pub track: Track,
    pub outcome: Result<Decision, PipelineError>,
    pub sink_error: Option<PipelineError>,
}

impl Serialize for TrackResolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TrackResolution", 8)?;
        s.serialize_field("track_id", &self.track.track_id)?;
        s.serialize_field("start_frame", &self.track.start_frame)?;
        s.serialize_field("end_frame", &self.track.end_frame)?;
        s.serialize_field("detections", &self.track.len())?;
        s.serialize_field("best_detection_id", &self.track.best_detection_id)?;
        s.serialize_field("decision", &self.outcome.as_ref().ok())?;
        s.serialize_field("error", &self.outcome.as_ref().err().map(|e| e.to_string()))?;
        s.serialize_field("sink_error", &self.sink_error.as_ref().map(|e| e.to_string()))?;
        s.end()
    }
}

/// Everything resolved for one video.
#[derive(Debug, Serialize)]
pub struct VideoResolution {
    pub video_id: String,
    pub tracks: Vec<TrackResolution>,
    /// Detections the tracker refused.
    pub rejected: Vec<RejectedFace>,
}

impl VideoResolution {
    /// Number of tracks that ended with `action`.
    pub fn count(&self, action: Action) -> usize {
        self.tracks
            .iter()
            .filter(|t| matches!(&t.outcome, Ok(d) if d.action == action))
            .count()
    }
}

/// Detections in, identity decisions out.
///
/// Photos are resolved face by face. Videos are first reduced to tracks and
/// only each track's best detection is resolved. The pipeline owns its
/// index handle explicitly; several pipelines may share one index.
pub struct IdentityResolutionPipeline {
    index: Arc<PrototypeIndex>,
    assigner: PrototypeAssigner,
    tracker: TrackerConfig,
    sample_fps: f64,
    sink: Option<Arc<dyn ResolutionSink>>,
}

impl IdentityResolutionPipeline {
    /// Opens a fresh index sized by `cfg.expected_prototypes`.
    pub fn new(cfg: PipelineConfig) -> Result<Self, PipelineError> {
        let cfg = cfg.validated()?;
        let index = Arc::new(PrototypeIndex::open(cfg.index.clone(), cfg.expected_prototypes));
        Self::with_index(index, cfg)
    }

    /// Builds a pipeline over an existing index. `cfg.index` is ignored.
    pub fn with_index(
        index: Arc<PrototypeIndex>,
        cfg: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let cfg = cfg.validated()?;
        let assigner = PrototypeAssigner::new(Arc::clone(&index), cfg.assign)?;
        Ok(Self {
            index,
            assigner,
            tracker: cfg.tracker,
            sample_fps: cfg.sample_fps,
            sink: None,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResolutionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn index(&self) -> &Arc<PrototypeIndex> {
        &self.index
    }

    pub fn assigner(&self) -> &PrototypeAssigner {
        &self.assigner
    }

    pub fn assigner_mut(&mut self) -> &mut PrototypeAssigner {
        &mut self.assigner
    }

    pub fn tracker_config(&self) -> &TrackerConfig {
        &self.tracker
    }

    /// Frame sampler for a source video at the configured detection rate.
    pub fn sampler(&self, source_fps: f64) -> Result<FrameSampler, PipelineError> {
        Ok(FrameSampler::new(source_fps, self.sample_fps)?)
    }

    /// Sets or replaces the prototype of `identity_id`.
    pub fn enroll(
        &self,
        identity_id: &str,
        embedding: &[f32],
        label: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.index.add(identity_id, embedding, label)?;
        debug!(identity = identity_id, "pipeline: enrolled");
        Ok(())
    }

    /// Removes the prototype of `identity_id`. Rebuilds the index, O(n).
    pub fn forget(&self, identity_id: &str) -> Result<bool, PipelineError> {
        let removed = self.index.remove(identity_id)?;
        debug!(identity = identity_id, removed, "pipeline: forgot");
        Ok(removed)
    }

    /// Replaces every prototype, e.g. from a snapshot at startup.
    pub fn rehydrate(&self, prototypes: Vec<Prototype>) -> Result<(), PipelineError> {
        self.index.bulk_load(prototypes)?;
        Ok(())
    }

    /// Resolves every face of a photo independently.
    ///
    /// A malformed box, quality score or embedding only fails its own entry;
    /// the result has one entry per input face, in input order.
    pub fn resolve_photo(&self, faces: &[FrameFace]) -> Vec<FaceResolution> {
        let outcomes: Vec<Result<Decision, PipelineError>> = {
            let reader = self.index.reader();
            faces
                .iter()
                .map(|f| {
                    f.validate()?;
                    Ok(self.assigner.assign_with(&reader, &f.embedding)?)
                })
                .collect()
        };

        faces
            .iter()
            .zip(outcomes)
            .map(|(face, outcome)| {
                let sink_error = match (&outcome, &self.sink) {
                    (Ok(decision), Some(sink)) => {
                        sink.record_face(&face.detection_id, decision).err()
                    }
                    _ => None,
                };
                if let Some(e) = &sink_error {
                    warn!(
                        detection = %face.detection_id,
                        error = %e,
                        "pipeline: sink rejected face"
                    );
                }
                FaceResolution {
                    detection_id: face.detection_id.clone(),
                    outcome,
                    sink_error,
                }
            })
            .collect()
    }

    /// Tracks the faces of one video and resolves each track's best
    /// detection.
    pub fn resolve_video(
        &self,
        video_id: &str,
        detections: Vec<FrameFace>,
    ) -> Result<VideoResolution, PipelineError> {
        let report = build_tracks(video_id, detections, &self.tracker)?;

        let outcomes: Vec<Result<Decision, PipelineError>> = {
            let reader = self.index.reader();
            report
                .tracks
                .iter()
                .map(|t| {
                    let best = t.best_detection().ok_or_else(|| {
                        PipelineError::InvalidConfig(format!(
                            "track {} has no detections",
                            t.track_id
                        ))
                    })?;
                    Ok(self.assigner.assign_with(&reader, &best.embedding)?)
                })
                .collect()
        };

        let tracks: Vec<TrackResolution> = report
            .tracks
            .into_iter()
            .zip(outcomes)
            .map(|(track, outcome)| {
                let sink_error = match (&outcome, &self.sink) {
                    (Ok(decision), Some(sink)) => sink.record_track(&track, decision).err(),
                    _ => None,
                };
                if let Some(e) = &sink_error {
                    warn!(track = %track.track_id, error = %e, "pipeline: sink rejected track");
                }
                TrackResolution {
                    track,
                    outcome,
                    sink_error,
                }
            })
            .collect();

        let resolution = VideoResolution {
            video_id: video_id.to_string(),
            tracks,
            rejected: report.rejected,
        };
        info!(
            video = video_id,
            tracks = resolution.tracks.len(),
            auto_assign = resolution.count(Action::AutoAssign),
            review = resolution.count(Action::Review),
            unknown = resolution.count(Action::Unknown),
            rejected = resolution.rejected.len(),
            "pipeline: video resolved"
        );
        Ok(resolution)
    }

    /// Resolves independent videos in parallel. Results keep input order.
    pub fn resolve_videos(
        &self,
        videos: Vec<(String, Vec<FrameFace>)>,
    ) -> Vec<Result<VideoResolution, PipelineError>> {
        videos
            .into_par_iter()
            .map(|(video_id, detections)| self.resolve_video(&video_id, detections))
            .collect()
    }
}
