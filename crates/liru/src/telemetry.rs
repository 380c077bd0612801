//! Frame-rate and copy-latency bookkeeping.

use std::time::{Duration, Instant};

/// Weight of the previous estimate when folding in a new interval.
const FPS_SMOOTHING: f64 = 0.85;

/// Rolling statistics for a stream of frames.
///
/// `fps` is an exponential moving average of the instantaneous rate between
/// consecutive frames; the first interval seeds it directly.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    fps: f64,
    last_ms: f64,
    frames: u64,
    last_frame_at: Option<Instant>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame that completed now and took `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        self.record_at(Instant::now(), elapsed);
    }

    /// Record a frame that completed at `now` and took `elapsed`.
    pub fn record_at(&mut self, now: Instant, elapsed: Duration) {
        self.last_ms = elapsed.as_secs_f64() * 1000.0;
        self.frames += 1;

        if let Some(previous) = self.last_frame_at {
            let interval = now.saturating_duration_since(previous).as_secs_f64();
            if interval > 0.0 {
                let instant = 1.0 / interval;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    FPS_SMOOTHING * self.fps + (1.0 - FPS_SMOOTHING) * instant
                };
            }
        }
        self.last_frame_at = Some(now);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Smoothed frames per second, 0 until two frames were recorded.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Duration of the most recent frame in milliseconds.
    pub fn last_ms(&self) -> f64 {
        self.last_ms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
