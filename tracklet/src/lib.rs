//! Greedy online face tracking for one video at a time.
//!
//! Detections are grouped by sampled frame. Each frame's faces are matched
//! one-to-one to open tracks by a weighted mix of box overlap and embedding
//! similarity, best pairs first. Tracks that stay idle too long are frozen,
//! and frozen tracks with too few detections are dropped as noise. Every
//! surviving [`Track`] names its highest-quality detection, which is what
//! identity resolution looks at.
//!
//! ```
//! use faceid_tracklet::{build_tracks, BoundingBox, FrameFace, TrackerConfig};
//!
//! let faces: Vec<FrameFace> = (0..3u64)
//!     .map(|f| FrameFace {
//!         detection_id: format!("d{f}"),
//!         frame_number: f,
//!         timestamp_ms: f * 1000,
//!         bbox: BoundingBox::new(100.0 + f as f32, 100.0, 50.0, 50.0),
//!         embedding: vec![1.0, 0.0, 0.0],
//!         quality_score: 0.5 + 0.1 * f as f32,
//!     })
//!     .collect();
//!
//! let report = build_tracks("clip", faces, &TrackerConfig::default()).unwrap();
//! assert_eq!(report.tracks.len(), 1);
//! assert_eq!(report.tracks[0].track_id, "clip:0001");
//! assert_eq!(report.tracks[0].best_detection_id, "d2");
//! ```

pub mod builder;
pub mod error;
pub mod geometry;
pub mod sampler;
pub mod track;

pub use builder::{build_tracks, RejectedFace, TrackerConfig, TrackletBuilder, TrackletReport};
pub use error::TrackError;
pub use geometry::BoundingBox;
pub use sampler::{FrameSampler, SampledFrame};
pub use track::{FrameFace, Track};
