use clap::Args;
use faceid_tracklet::{build_tracks, FrameFace, FrameSampler, RejectedFace, Track};
use serde::{Deserialize, Serialize};

use super::{get_config, load_request, output_result, require_input_file};
use crate::Cli;

/// Detections of one video, as produced by the detector.
///
/// ```yaml
/// video_id: lobby-cam-2024-05-01
/// source_fps: 30
/// detections:
///   - detection_id: d1
///     frame_number: 0
///     timestamp_ms: 0
///     bbox: { x: 100, y: 100, w: 50, h: 50 }
///     embedding: [0.1, 0.2, ...]
///     quality_score: 0.8
/// ```
#[derive(Debug, Deserialize)]
pub(crate) struct VideoRequest {
    #[serde(default = "default_video_id")]
    pub video_id: String,
    /// Frame rate of the source stream; enables millisecond bounds.
    #[serde(default)]
    pub source_fps: Option<f64>,
    #[serde(default)]
    pub detections: Vec<FrameFace>,
}

fn default_video_id() -> String {
    "video".to_string()
}

#[derive(Debug, Serialize)]
struct TrackSummary {
    track_id: String,
    start_frame: u64,
    end_frame: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_ms: Option<u64>,
    detections: usize,
    best_detection_id: String,
    best_quality: f32,
}

impl TrackSummary {
    fn new(track: &Track, sampler: Option<&FrameSampler>) -> Self {
        Self {
            track_id: track.track_id.clone(),
            start_frame: track.start_frame,
            end_frame: track.end_frame,
            start_ms: sampler.map(|s| s.timestamp_ms(track.start_frame)),
            end_ms: sampler.map(|s| s.timestamp_ms(track.end_frame)),
            detections: track.len(),
            best_detection_id: track.best_detection_id.clone(),
            best_quality: track.best_detection().map(|d| d.quality_score).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrackOutput {
    video_id: String,
    tracks: Vec<TrackSummary>,
    rejected: Vec<RejectedFace>,
}

/// Groups one video's detections into tracks.
///
/// Prints each track's frame span and best detection, and the detections
/// that were rejected as invalid.
#[derive(Args)]
pub struct TrackCommand {
    /// Override the video id from the request file
    #[arg(long)]
    video: Option<String>,
}

impl TrackCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let input = require_input_file(cli)?;
        let req: VideoRequest = load_request(input)?;
        let video_id = self.video.clone().unwrap_or(req.video_id);

        let sampler = req
            .source_fps
            .map(|fps| FrameSampler::new(fps, cfg.sample_fps))
            .transpose()?;

        tracing::info!(video = %video_id, detections = req.detections.len(), "tracking");
        let report = build_tracks(&video_id, req.detections, &cfg.tracker)?;

        let out = TrackOutput {
            tracks: report
                .tracks
                .iter()
                .map(|t| TrackSummary::new(t, sampler.as_ref()))
                .collect(),
            rejected: report.rejected,
            video_id,
        };
        output_result(&out, cli.output.as_deref(), cli.json)
    }
}
