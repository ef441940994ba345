// Frame rate and drop accounting for the frame stream
use std::time::{Duration, Instant};

/// Rate measured over one report window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub fps: f64,
    pub presented: u32,
    pub dropped: u32,
}

/// Rolling frame counter reporting once per interval.
pub struct FpsCounter {
    /// Start of the current window
    last_report: Instant,
    presented: u32,
    dropped: u32,
    current_fps: f64,
    report_interval: Duration,
}

impl FpsCounter {
    pub fn new(report_interval: Duration) -> Self {
        Self {
            last_report: Instant::now(),
            presented: 0,
            dropped: 0,
            current_fps: 0.0,
            report_interval,
        }
    }

    /// Count a composited frame.
    /// Returns a report when the interval has elapsed.
    pub fn tick(&mut self) -> Option<FrameReport> {
        self.presented += 1;
        self.report_at(Instant::now())
    }

    /// Count a frame that was decoded but not composited.
    pub fn drop_frame(&mut self) {
        self.dropped += 1;
    }

    fn report_at(&mut self, now: Instant) -> Option<FrameReport> {
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < self.report_interval {
            return None;
        }

        self.current_fps = self.presented as f64 / elapsed.as_secs_f64();
        let report = FrameReport {
            fps: self.current_fps,
            presented: self.presented,
            dropped: self.dropped,
        };
        self.presented = 0;
        self.dropped = 0;
        self.last_report = now;
        Some(report)
    }

    /// Last calculated FPS
    pub fn fps(&self) -> f64 {
        self.current_fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
