use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// One frame selected for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledFrame {
    /// Index among sampled frames; what [`crate::FrameFace::frame_number`] holds.
    pub frame_number: u64,
    /// Index of the frame in the decoded source stream.
    pub source_frame: u64,
    pub timestamp_ms: u64,
}

/// Maps a source frame rate to a lower detection rate.
///
/// The sampler decides which source frames get decoded and run through the
/// detector. Consecutive samples differ by 1 in `frame_number`, which is
/// the unit the tracker's gap thresholds are expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampler {
    source_fps: f64,
    sample_fps: f64,
    step: f64,
}

impl FrameSampler {
    pub const DEFAULT_SAMPLE_FPS: f64 = 1.0;

    /// Sampling faster than the source keeps every source frame.
    pub fn new(source_fps: f64, sample_fps: f64) -> Result<Self, TrackError> {
        for (name, v) in [("source_fps", source_fps), ("sample_fps", sample_fps)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(TrackError::InvalidConfig(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        let sample_fps = sample_fps.min(source_fps);
        Ok(Self {
            source_fps,
            sample_fps,
            step: source_fps / sample_fps,
        })
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    pub fn sample_fps(&self) -> f64 {
        self.sample_fps
    }

    /// Source frames per sample.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn source_frame(&self, frame_number: u64) -> u64 {
        (frame_number as f64 * self.step).round() as u64
    }

    /// Presentation time of a sampled frame.
    pub fn timestamp_ms(&self, frame_number: u64) -> u64 {
        (self.source_frame(frame_number) as f64 * 1000.0 / self.source_fps).round() as u64
    }

    /// Returns the sampled frame number if `source_frame` is decoded.
    pub fn sample_of(&self, source_frame: u64) -> Option<u64> {
        let n = (source_frame as f64 / self.step).round() as u64;
        (self.source_frame(n) == source_frame).then_some(n)
    }

    pub fn frame(&self, frame_number: u64) -> SampledFrame {
        SampledFrame {
            frame_number,
            source_frame: self.source_frame(frame_number),
            timestamp_ms: self.timestamp_ms(frame_number),
        }
    }

    /// Every sampled frame of a stream with `total_source_frames` frames.
    pub fn frames(&self, total_source_frames: u64) -> impl Iterator<Item = SampledFrame> + '_ {
        (0u64..)
            .map(|n| self.frame(n))
            .take_while(move |f| f.source_frame < total_source_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_per_second_at_30fps() {
        let s = FrameSampler::new(30.0, FrameSampler::DEFAULT_SAMPLE_FPS).unwrap();
        let frames: Vec<SampledFrame> = s.frames(95).collect();
        let src: Vec<u64> = frames.iter().map(|f| f.source_frame).collect();
        assert_eq!(src, vec![0, 30, 60, 90]);
        let ts: Vec<u64> = frames.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(ts, vec![0, 1000, 2000, 3000]);
        assert_eq!(frames[3].frame_number, 3);
    }

    #[test]
    fn fractional_rate() {
        let s = FrameSampler::new(29.97, 1.0).unwrap();
        assert_eq!(s.source_frame(1), 30);
        assert_eq!(s.source_frame(2), 60);
        assert_eq!(s.source_frame(100), 2997);
        assert_eq!(s.timestamp_ms(1), 1001);
    }

    #[test]
    fn sample_of_inverts_source_frame() {
        let s = FrameSampler::new(25.0, 2.0).unwrap();
        for n in 0..50 {
            assert_eq!(s.sample_of(s.source_frame(n)), Some(n));
        }
        assert_eq!(s.sample_of(1), None);
    }

    #[test]
    fn faster_than_source_keeps_everything() {
        let s = FrameSampler::new(10.0, 60.0).unwrap();
        assert_eq!(s.step(), 1.0);
        assert_eq!(s.sample_fps(), 10.0);
        assert_eq!(s.frames(5).count(), 5);
    }

    #[test]
    fn empty_stream() {
        let s = FrameSampler::new(30.0, 1.0).unwrap();
        assert_eq!(s.frames(0).count(), 0);
    }

    #[test]
    fn rejects_bad_rates() {
        assert!(FrameSampler::new(0.0, 1.0).is_err());
        assert!(FrameSampler::new(30.0, -1.0).is_err());
        assert!(FrameSampler::new(f64::NAN, 1.0).is_err());
    }
}
