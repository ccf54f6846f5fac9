//! Timing utilities for the export timeline.
//!
//! The export pipeline maps a nominal timeline (milliseconds) onto a
//! fixed-rate frame schedule. This module provides:
//! - Frame schedule arithmetic (frame index <-> timeline time)
//! - A monotonic clock anchored at export start for progress reporting

use std::time::{Duration, Instant};

/// Fixed-rate frame schedule for the export timeline.
///
/// Frame `i` sits at timeline time `i / fps`. All duration accounting is
/// done against this nominal schedule, never against how long rendering
/// actually took, so slow rendering can never shorten the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedule {
    fps: u32,
}

impl FrameSchedule {
    /// Create a schedule targeting the given frame rate.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    /// Target frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Number of frames covering `duration_ms` of timeline, rounded up so
    /// the tail of the last scene is never cut short.
    pub fn frame_count(&self, duration_ms: u64) -> u64 {
        (duration_ms * self.fps as u64).div_ceil(1000)
    }

    /// Timeline time of a frame index, in milliseconds.
    pub fn time_at_ms(&self, frame: u64) -> f64 {
        frame as f64 * 1000.0 / self.fps as f64
    }

    /// Nominal interval between consecutive frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}

/// Monotonic clock anchored at export start.
///
/// Used for progress/ETA reporting only; the output timeline itself is
/// derived from the frame schedule, not from this clock.
#[derive(Debug, Clone)]
pub struct ExportClock {
    epoch: Instant,
    epoch_wall: String,
}

impl ExportClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since export start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at export start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Estimated seconds remaining given completed fraction `progress`.
    pub fn eta_secs(&self, progress: f64) -> f64 {
        if progress <= 0.0 {
            return 0.0;
        }
        let elapsed = self.elapsed_secs();
        ((elapsed / progress) - elapsed).max(0.0)
    }
}

/// Convert milliseconds to seconds.
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Convert seconds to milliseconds, rounding to the nearest millisecond.
pub fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_exact_multiples() {
        let schedule = FrameSchedule::new(30);
        // 3 scenes of 2500ms each.
        assert_eq!(schedule.frame_count(7500), 225);
        // One default scene: 3000 + 500 grace.
        assert_eq!(schedule.frame_count(3500), 105);
    }

    #[test]
    fn test_frame_count_rounds_up() {
        let schedule = FrameSchedule::new(30);
        // 100ms at 30fps is exactly 3 frames; 101ms needs a 4th.
        assert_eq!(schedule.frame_count(100), 3);
        assert_eq!(schedule.frame_count(101), 4);
    }

    #[test]
    fn test_time_at_ms_is_monotonic() {
        let schedule = FrameSchedule::new(30);
        assert_eq!(schedule.time_at_ms(0), 0.0);
        let mut last = -1.0;
        for frame in 0..200 {
            let t = schedule.time_at_ms(frame);
            assert!(t > last);
            last = t;
        }
    }

    #[test]
    fn test_last_frame_inside_duration() {
        let schedule = FrameSchedule::new(30);
        let frames = schedule.frame_count(7500);
        assert!(schedule.time_at_ms(frames - 1) < 7500.0);
        assert!(schedule.time_at_ms(frames) >= 7500.0);
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        let schedule = FrameSchedule::new(0);
        assert_eq!(schedule.fps(), 1);
    }

    #[test]
    fn test_ms_secs_conversions() {
        assert!((ms_to_secs(1500) - 1.5).abs() < 1e-9);
        assert_eq!(secs_to_ms(2.0), 2000);
        assert_eq!(secs_to_ms(0.0005), 1);
    }

    #[test]
    fn test_eta_unknown_at_zero_progress() {
        let clock = ExportClock::start();
        assert_eq!(clock.eta_secs(0.0), 0.0);
        assert!(clock.eta_secs(0.5) >= 0.0);
    }
}
