//! Face identity resolution: detections in, assignment decisions out.
//!
//! [`IdentityResolutionPipeline`] ties together a shared
//! [`faceid_vecstore::PrototypeIndex`], a [`faceid_assign::PrototypeAssigner`]
//! and the [`faceid_tracklet`] tracker. Photo faces are resolved one by one;
//! video detections are first reduced to tracks and only each track's best
//! detection is resolved. Decisions can be forwarded to a
//! [`ResolutionSink`]; a sink failure is reported on the item and never
//! aborts the rest.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod sink;

pub use config::{load_config, load_file, parse_file, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{FaceResolution, IdentityResolutionPipeline, TrackResolution, VideoResolution};
pub use sink::{MemorySink, ResolutionSink, SinkRecord};
