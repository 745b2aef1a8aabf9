use std::cmp::Ordering;
use std::collections::BTreeMap;

use faceid_vecstore::cosine;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::TrackError;
use crate::geometry::BoundingBox;
use crate::track::{FrameFace, Track};

/// Tuning for per-frame association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum box overlap with a track's last detection.
    /// Default: 0.3.
    pub iou_min: f32,

    /// Minimum cosine similarity with a track's last embedding.
    /// Default: 0.6.
    pub sim_min: f32,

    /// A track idle for more frames than this cannot be resumed.
    /// Default: 5.
    pub match_gap_frames: u64,

    /// A track idle for more frames than this is frozen.
    /// Default: 10.
    pub stale_gap_frames: u64,

    /// Frozen tracks with fewer detections are dropped as noise.
    /// Default: 2.
    pub min_track_length: usize,

    /// Default: 0.4.
    pub iou_weight: f32,

    /// Default: 0.6.
    pub sim_weight: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_min: 0.3,
            sim_min: 0.6,
            match_gap_frames: 5,
            stale_gap_frames: 10,
            min_track_length: 2,
            iou_weight: 0.4,
            sim_weight: 0.6,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        for (name, v) in [
            ("iou_min", self.iou_min),
            ("sim_min", self.sim_min),
            ("iou_weight", self.iou_weight),
            ("sim_weight", self.sim_weight),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(TrackError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
        if self.match_gap_frames > self.stale_gap_frames {
            return Err(TrackError::InvalidConfig(format!(
                "match_gap_frames {} exceeds stale_gap_frames {}",
                self.match_gap_frames, self.stale_gap_frames
            )));
        }
        if self.min_track_length == 0 {
            return Err(TrackError::InvalidConfig(
                "min_track_length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A detection the builder refused. The rest of the video is unaffected.
#[derive(Debug)]
pub struct RejectedFace {
    pub detection_id: String,
    pub frame_number: u64,
    pub error: TrackError,
}

impl Serialize for RejectedFace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RejectedFace", 3)?;
        s.serialize_field("detection_id", &self.detection_id)?;
        s.serialize_field("frame_number", &self.frame_number)?;
        s.serialize_field("reason", &self.error.to_string())?;
        s.end()
    }
}

/// Result of [`build_tracks`].
#[derive(Debug, Default, Serialize)]
pub struct TrackletReport {
    pub tracks: Vec<Track>,
    pub rejected: Vec<RejectedFace>,
}

struct ActiveTrack {
    // Creation order; the tie-break between equally scored pairs.
    seq: u64,
    detections: Vec<FrameFace>,
    last_bbox: BoundingBox,
    last_embedding: Vec<f32>,
    last_frame: u64,
}

struct Frozen {
    seq: u64,
    detections: Vec<FrameFace>,
}

/// A face that passed validation, with its embedding normalized.
struct Candidate {
    face: FrameFace,
    unit: Vec<f32>,
}

struct Pair {
    track: usize,
    face: usize,
    score: f32,
}

/// Online greedy tracker for one video.
///
/// Feed sampled frames in increasing order with [`push_frame`], then call
/// [`finish`] to flush and collect the tracks. Each builder holds the state
/// of exactly one video.
///
/// [`push_frame`]: TrackletBuilder::push_frame
/// [`finish`]: TrackletBuilder::finish
pub struct TrackletBuilder {
    video_id: String,
    cfg: TrackerConfig,
    dim: Option<usize>,
    last_frame: Option<u64>,
    next_seq: u64,
    active: Vec<ActiveTrack>,
    completed: Vec<Frozen>,
}

impl TrackletBuilder {
    pub fn new(video_id: impl Into<String>, cfg: TrackerConfig) -> Result<Self, TrackError> {
        cfg.validate()?;
        Ok(Self {
            video_id: video_id.into(),
            cfg,
            dim: None,
            last_frame: None,
            next_seq: 0,
            active: Vec::new(),
            completed: Vec::new(),
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.cfg
    }

    /// Number of tracks still open.
    pub fn active_tracks(&self) -> usize {
        self.active.len()
    }

    /// Processes all faces of one sampled frame.
    ///
    /// Frames must arrive in strictly increasing order; an empty `faces`
    /// still advances time and may freeze stale tracks. Invalid faces are
    /// returned and skipped.
    pub fn push_frame(&mut self, frame_number: u64, faces: Vec<FrameFace>) -> Vec<RejectedFace> {
        if let Some(last) = self.last_frame.filter(|&last| frame_number <= last) {
            return faces
                .into_iter()
                .map(|f| self.reject(f, TrackError::OutOfOrder { frame: frame_number, last }))
                .collect();
        }
        self.last_frame = Some(frame_number);

        let mut rejected = Vec::new();
        let mut candidates = Vec::with_capacity(faces.len());
        for face in faces {
            match self.check(frame_number, &face) {
                Ok(()) => {
                    self.dim.get_or_insert(face.embedding.len());
                    let unit = cosine::normalized(&face.embedding);
                    candidates.push(Candidate { face, unit });
                }
                Err(e) => rejected.push(self.reject(face, e)),
            }
        }

        let matched = self.match_frame(frame_number, &candidates);
        for (fi, cand) in candidates.into_iter().enumerate() {
            match matched[fi] {
                Some(ti) => {
                    let track = &mut self.active[ti];
                    track.last_bbox = cand.face.bbox;
                    track.last_embedding = cand.unit;
                    track.last_frame = frame_number;
                    track.detections.push(cand.face);
                }
                None => {
                    self.active.push(ActiveTrack {
                        seq: self.next_seq,
                        last_bbox: cand.face.bbox,
                        last_embedding: cand.unit,
                        last_frame: frame_number,
                        detections: vec![cand.face],
                    });
                    self.next_seq += 1;
                }
            }
        }

        self.freeze_stale(frame_number);
        rejected
    }

    /// Flushes every open track and returns the completed ones sorted by
    /// start frame. Track ids are numbered from 1 in that order.
    pub fn finish(mut self) -> Vec<Track> {
        let open = std::mem::take(&mut self.active);
        for track in open {
            self.freeze(track);
        }

        let mut frozen = std::mem::take(&mut self.completed);
        frozen.sort_by_key(|t| (t.detections[0].frame_number, t.seq));

        let video_id = self.video_id;
        frozen
            .into_iter()
            .enumerate()
            .filter_map(|(i, t)| {
                let track_id = format!("{video_id}:{:04}", i + 1);
                Track::from_detections(track_id, video_id.clone(), t.detections)
            })
            .collect()
    }

    fn check(&self, frame_number: u64, face: &FrameFace) -> Result<(), TrackError> {
        if face.frame_number != frame_number {
            return Err(TrackError::FrameMismatch {
                expected: frame_number,
                got: face.frame_number,
            });
        }
        face.validate()?;
        let dim = self.dim.unwrap_or(face.embedding.len());
        cosine::validate(&face.embedding, dim)?;
        Ok(())
    }

    fn reject(&self, face: FrameFace, error: TrackError) -> RejectedFace {
        warn!(
            video = %self.video_id,
            detection = %face.detection_id,
            frame = face.frame_number,
            error = %error,
            "tracklet: rejected detection"
        );
        RejectedFace {
            detection_id: face.detection_id,
            frame_number: face.frame_number,
            error,
        }
    }

    /// Greedy one-to-one matching of this frame's faces to active tracks.
    /// Returns the matched track index for each face.
    fn match_frame(&self, frame_number: u64, faces: &[Candidate]) -> Vec<Option<usize>> {
        let mut pairs = Vec::new();
        for (ti, track) in self.active.iter().enumerate() {
            if frame_number - track.last_frame > self.cfg.match_gap_frames {
                continue;
            }
            for (fi, cand) in faces.iter().enumerate() {
                let iou = track.last_bbox.iou(&cand.face.bbox);
                if iou < self.cfg.iou_min {
                    continue;
                }
                let sim = cosine::dot(&track.last_embedding, &cand.unit);
                if sim < self.cfg.sim_min {
                    continue;
                }
                pairs.push(Pair {
                    track: ti,
                    face: fi,
                    score: self.cfg.iou_weight * iou + self.cfg.sim_weight * sim,
                });
            }
        }

        pairs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(self.active[a.track].seq.cmp(&self.active[b.track].seq))
                .then(a.face.cmp(&b.face))
        });

        let mut track_taken = vec![false; self.active.len()];
        let mut matched = vec![None; faces.len()];
        for p in pairs {
            if track_taken[p.track] || matched[p.face].is_some() {
                continue;
            }
            track_taken[p.track] = true;
            matched[p.face] = Some(p.track);
        }
        matched
    }

    fn freeze_stale(&mut self, frame_number: u64) {
        let stale_gap = self.cfg.stale_gap_frames;
        let (stale, active): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|t| frame_number - t.last_frame > stale_gap);
        self.active = active;
        for track in stale {
            self.freeze(track);
        }
    }

    fn freeze(&mut self, track: ActiveTrack) {
        if track.detections.len() < self.cfg.min_track_length {
            debug!(
                video = %self.video_id,
                frame = track.last_frame,
                len = track.detections.len(),
                "tracklet: dropped short track"
            );
            return;
        }
        debug!(
            video = %self.video_id,
            last_frame = track.last_frame,
            len = track.detections.len(),
            "tracklet: froze track"
        );
        self.completed.push(Frozen {
            seq: track.seq,
            detections: track.detections,
        });
    }
}

/// Runs a whole video's detections through a fresh builder.
///
/// Detections may come in any order; they are grouped by frame number and
/// processed in increasing frame order, keeping input order within a frame.
pub fn build_tracks(
    video_id: &str,
    detections: Vec<FrameFace>,
    cfg: &TrackerConfig,
) -> Result<TrackletReport, TrackError> {
    let mut frames: BTreeMap<u64, Vec<FrameFace>> = BTreeMap::new();
    for d in detections {
        frames.entry(d.frame_number).or_default().push(d);
    }

    let mut builder = TrackletBuilder::new(video_id, cfg.clone())?;
    let mut rejected = Vec::new();
    for (frame_number, faces) in frames {
        rejected.extend(builder.push_frame(frame_number, faces));
    }
    let tracks = builder.finish();
    debug!(
        video = video_id,
        tracks = tracks.len(),
        rejected = rejected.len(),
        "tracklet: video done"
    );
    Ok(TrackletReport { tracks, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit embedding pointing mostly along axis `axis` of a 4-d space.
    fn emb(axis: usize, wobble: f32) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[axis] = 1.0;
        v[(axis + 1) % 4] = wobble;
        v
    }

    fn face(id: &str, frame: u64, x: f32, y: f32, axis: usize, quality: f32) -> FrameFace {
        FrameFace {
            detection_id: id.into(),
            frame_number: frame,
            timestamp_ms: frame * 1000,
            bbox: BoundingBox::new(x, y, 50.0, 50.0),
            embedding: emb(axis, 0.05 * frame as f32),
            quality_score: quality,
        }
    }

    /// Face A at (100,100) for frames 0..3, face B at (300,300) for frames
    /// 0..2, both moving by (5,5) per frame.
    fn two_faces() -> Vec<FrameFace> {
        let qa = [0.7, 0.95, 0.8];
        let mut out = Vec::new();
        for f in 0..3u64 {
            let d = 5.0 * f as f32;
            out.push(face(&format!("a{f}"), f, 100.0 + d, 100.0 + d, 0, qa[f as usize]));
            if f < 2 {
                out.push(face(&format!("b{f}"), f, 300.0 + d, 300.0 + d, 2, 0.6));
            }
        }
        out
    }

    #[test]
    fn two_face_scenario() {
        let report = build_tracks("vid", two_faces(), &TrackerConfig::default()).unwrap();
        assert!(report.rejected.is_empty());
        assert_eq!(report.tracks.len(), 2);

        let mut sizes: Vec<usize> = report.tracks.iter().map(|t| t.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![2, 3]);

        let long = report.tracks.iter().find(|t| t.len() == 3).unwrap();
        assert_eq!(long.best_detection_id, "a1");
        assert_eq!(long.start_frame, 0);
        assert_eq!(long.end_frame, 2);
        assert!(long.detections.iter().all(|d| d.detection_id.starts_with('a')));

        let short = report.tracks.iter().find(|t| t.len() == 2).unwrap();
        assert!(short.detections.iter().all(|d| d.detection_id.starts_with('b')));
    }

    #[test]
    fn track_ids_follow_start_frame() {
        let mut dets = two_faces();
        // A third face appearing later.
        dets.push(face("c4", 4, 600.0, 100.0, 1, 0.5));
        dets.push(face("c5", 5, 602.0, 102.0, 1, 0.5));
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        let ids: Vec<&str> = report.tracks.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["vid:0001", "vid:0002", "vid:0003"]);
        assert_eq!(report.tracks[2].start_frame, 4);
        assert!(report.tracks.iter().all(|t| t.video_id == "vid"));
    }

    #[test]
    fn isolated_face_is_noise() {
        let dets = vec![face("lonely", 7, 10.0, 10.0, 0, 0.99)];
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        assert!(report.tracks.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn zero_detections() {
        let report = build_tracks("vid", Vec::new(), &TrackerConfig::default()).unwrap();
        assert!(report.tracks.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn stale_gap_starts_new_track() {
        let dets = vec![
            face("a0", 0, 100.0, 100.0, 0, 0.5),
            face("a1", 1, 100.0, 100.0, 0, 0.5),
            // Same face, same place, 12 frames later.
            face("a13", 13, 100.0, 100.0, 0, 0.5),
            face("a14", 14, 100.0, 100.0, 0, 0.5),
        ];
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        assert_eq!(report.tracks.len(), 2);
        assert_eq!(report.tracks[0].end_frame, 1);
        assert_eq!(report.tracks[1].start_frame, 13);
        assert_eq!(report.tracks[1].len(), 2);
    }

    #[test]
    fn stale_tracks_freeze_on_time_alone() {
        let cfg = TrackerConfig {
            match_gap_frames: 10,
            stale_gap_frames: 10,
            ..TrackerConfig::default()
        };
        let mut b = TrackletBuilder::new("vid", cfg).unwrap();
        b.push_frame(0, vec![face("a0", 0, 100.0, 100.0, 0, 0.5)]);
        b.push_frame(1, vec![face("a1", 1, 100.0, 100.0, 0, 0.5)]);

        // Empty frames still advance time.
        b.push_frame(11, Vec::new());
        assert_eq!(b.active_tracks(), 1);
        b.push_frame(12, Vec::new());
        assert_eq!(b.active_tracks(), 0);

        b.push_frame(13, vec![face("a13", 13, 100.0, 100.0, 0, 0.5)]);
        b.push_frame(14, vec![face("a14", 14, 100.0, 100.0, 0, 0.5)]);
        let tracks = b.finish();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].end_frame, 1);
        assert_eq!(tracks[1].start_frame, 13);
    }

    #[test]
    fn beyond_match_gap_cannot_resume() {
        // Gap of 7: above match_gap (5) but below stale_gap (10).
        let dets = vec![
            face("a0", 0, 100.0, 100.0, 0, 0.5),
            face("a1", 1, 100.0, 100.0, 0, 0.5),
            face("a8", 8, 100.0, 100.0, 0, 0.5),
            face("a9", 9, 100.0, 100.0, 0, 0.5),
        ];
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        assert_eq!(report.tracks.len(), 2);
        assert_eq!(report.tracks[0].len(), 2);
        assert_eq!(report.tracks[1].len(), 2);
    }

    #[test]
    fn within_match_gap_resumes() {
        let dets = vec![
            face("a0", 0, 100.0, 100.0, 0, 0.5),
            face("a5", 5, 100.0, 100.0, 0, 0.5),
        ];
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        assert_eq!(report.tracks.len(), 1);
        assert_eq!(report.tracks[0].len(), 2);
    }

    #[test]
    fn dissimilar_faces_never_join() {
        // Same box, different person.
        let dets = vec![
            face("a0", 0, 100.0, 100.0, 0, 0.5),
            face("b1", 1, 100.0, 100.0, 2, 0.5),
        ];
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();
        assert!(report.tracks.is_empty());
    }

    #[test]
    fn one_face_per_track_per_frame() {
        // Two near-identical faces in frame 1 compete for one track; the
        // better overlap wins and the other starts its own track.
        let dets = vec![
            face("a0", 0, 100.0, 100.0, 0, 0.5),
            face("x1", 1, 110.0, 110.0, 0, 0.5),
            face("y1", 1, 101.0, 101.0, 0, 0.5),
        ];
        let mut b = TrackletBuilder::new("vid", TrackerConfig::default()).unwrap();
        let mut frames: BTreeMap<u64, Vec<FrameFace>> = BTreeMap::new();
        for d in dets {
            frames.entry(d.frame_number).or_default().push(d);
        }
        for (f, faces) in frames {
            assert!(b.push_frame(f, faces).is_empty());
        }
        assert_eq!(b.active_tracks(), 2);
        let tracks = b.finish();
        assert_eq!(tracks.len(), 1);
        let ids: Vec<&str> = tracks[0].detections.iter().map(|d| d.detection_id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "y1"]);
    }

    #[test]
    fn invalid_faces_are_isolated() {
        let mut bad_box = face("bad_box", 0, 0.0, 0.0, 1, 0.5);
        bad_box.bbox.w = 0.0;
        let mut bad_q = face("bad_q", 0, 0.0, 0.0, 1, 0.5);
        bad_q.quality_score = 1.5;
        let mut bad_emb = face("bad_emb", 1, 0.0, 0.0, 1, 0.5);
        bad_emb.embedding[0] = f32::NAN;
        let mut short = face("short", 1, 0.0, 0.0, 1, 0.5);
        short.embedding.truncate(3);

        let mut dets = two_faces();
        dets.extend([bad_box, bad_q, bad_emb, short]);
        let report = build_tracks("vid", dets, &TrackerConfig::default()).unwrap();

        assert_eq!(report.tracks.len(), 2);
        assert_eq!(report.rejected.len(), 4);
        let find = |id: &str| report.rejected.iter().find(|r| r.detection_id == id).unwrap();
        assert!(matches!(find("bad_box").error, TrackError::InvalidBox { .. }));
        assert!(matches!(find("bad_q").error, TrackError::InvalidQuality(_)));
        assert!(matches!(find("bad_emb").error, TrackError::Embedding(_)));
        assert!(matches!(find("short").error, TrackError::Embedding(_)));
    }

    #[test]
    fn out_of_order_frames_rejected() {
        let mut b = TrackletBuilder::new("vid", TrackerConfig::default()).unwrap();
        assert!(b.push_frame(3, vec![face("a3", 3, 0.0, 0.0, 0, 0.5)]).is_empty());
        let rej = b.push_frame(2, vec![face("a2", 2, 0.0, 0.0, 0, 0.5)]);
        assert_eq!(rej.len(), 1);
        assert!(matches!(rej[0].error, TrackError::OutOfOrder { frame: 2, last: 3 }));

        let rej = b.push_frame(4, vec![face("a5", 5, 0.0, 0.0, 0, 0.5)]);
        assert!(matches!(rej[0].error, TrackError::FrameMismatch { expected: 4, got: 5 }));
    }

    #[test]
    fn invalid_config() {
        let cfg = TrackerConfig {
            match_gap_frames: 20,
            ..TrackerConfig::default()
        };
        assert!(TrackletBuilder::new("vid", cfg).is_err());
        let cfg = TrackerConfig {
            iou_min: 1.5,
            ..TrackerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejected_face_serializes_reason() {
        let r = RejectedFace {
            detection_id: "d".into(),
            frame_number: 2,
            error: TrackError::InvalidQuality(2.0),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["detection_id"], "d");
        assert_eq!(v["frame_number"], 2);
        assert!(v["reason"].as_str().unwrap().contains("quality"));
    }
}
