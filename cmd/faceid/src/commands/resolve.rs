use std::fs::File;
use std::path::Path;

use clap::Args;
use faceid_pipeline::{FaceResolution, IdentityResolutionPipeline, VideoResolution};
use faceid_tracklet::FrameFace;
use faceid_vecstore::{load_snapshot, save_snapshot, BackendKind, Prototype};
use serde::{Deserialize, Serialize};

use super::track::VideoRequest;
use super::{get_config, load_request, output_result, require_input_file};
use crate::Cli;

/// Photo faces and videos to resolve in one run.
#[derive(Debug, Deserialize)]
struct ResolveRequest {
    #[serde(default)]
    faces: Vec<FrameFace>,
    #[serde(default)]
    videos: Vec<VideoRequest>,
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    backend: BackendKind,
    prototypes: usize,
    faces: Vec<FaceResolution>,
    videos: Vec<VideoResolution>,
}

/// Resolves faces against a set of known prototypes.
///
/// Prototypes come from a snapshot (`.prto`) or a YAML/JSON list of
/// `{identity_id, embedding, label}` records.
#[derive(Args)]
pub struct ResolveCommand {
    /// Prototype file: binary snapshot (.prto) or YAML/JSON list
    #[arg(short = 'p', long)]
    prototypes: String,

    /// Write the loaded prototypes as a binary snapshot
    #[arg(long)]
    save_snapshot: Option<String>,
}

impl ResolveCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cfg = get_config(cli)?;
        let input = require_input_file(cli)?;
        let req: ResolveRequest = load_request(input)?;

        let prototypes = load_prototypes(&self.prototypes)?;
        if let Some(dim) = prototypes.first().map(|p| p.embedding.len()) {
            cfg.index.dim = dim;
        }
        cfg.expected_prototypes = prototypes.len();

        let pipeline = IdentityResolutionPipeline::new(cfg)?;
        pipeline.rehydrate(prototypes)?;

        if let Some(path) = &self.save_snapshot {
            let mut file = File::create(path)?;
            save_snapshot(pipeline.index(), &mut file)?;
            tracing::info!(path = %path, "snapshot written");
        }

        let faces = pipeline.resolve_photo(&req.faces);
        let videos = pipeline
            .resolve_videos(req.videos.into_iter().map(|v| (v.video_id, v.detections)).collect())
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let out = ResolveOutput {
            backend: pipeline.index().kind(),
            prototypes: pipeline.index().count(),
            faces,
            videos,
        };
        output_result(&out, cli.output.as_deref(), cli.json)
    }
}

fn load_prototypes(path: &str) -> anyhow::Result<Vec<Prototype>> {
    let is_snapshot = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("prto"));

    if is_snapshot {
        let mut file = File::open(path)?;
        Ok(load_snapshot(&mut file)?.prototypes)
    } else {
        load_request(path)
    }
}
