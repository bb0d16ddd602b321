//! # Frame Statistics
//!
//! Rolling frame-time monitor for the render loop. Frame times are kept in a
//! ring buffer and summarised into [`FrameMetrics`] (average, min and max
//! frame time plus fps). The summary is logged every reporting interval.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use gridlife::performance::FrameStats;
//!
//! let mut stats = FrameStats::new(Duration::from_secs(5));
//!
//! // Once per presented frame
//! stats.record_frame(Duration::from_millis(16));
//! println!("{:.1} fps", stats.metrics().fps);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

/// Frames kept for averaging, about two seconds at 60 fps
const DEFAULT_SAMPLES: usize = 120;

/// Summary of the frames currently in the window
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    pub fps: f32,
    /// Average frame time in milliseconds
    pub frame_time_ms: f32,
    pub min_frame_time_ms: f32,
    pub max_frame_time_ms: f32,
    /// Frames recorded since the monitor was created or reset
    pub frames: u64,
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self {
            fps: 0.0,
            frame_time_ms: 0.0,
            min_frame_time_ms: 0.0,
            max_frame_time_ms: 0.0,
            frames: 0,
        }
    }
}

#[derive(Debug)]
pub struct FrameStats {
    /// Ring buffer of recent frame times
    frame_times: VecDeque<Duration>,
    max_samples: usize,
    metrics: FrameMetrics,
    /// Time recorded since the last report
    since_report: Duration,
    report_interval: Duration,
}

impl FrameStats {
    pub fn new(report_interval: Duration) -> Self {
        Self::with_samples(DEFAULT_SAMPLES, report_interval)
    }

    pub fn with_samples(max_samples: usize, report_interval: Duration) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
            metrics: FrameMetrics::default(),
            since_report: Duration::ZERO,
            report_interval,
        }
    }

    /// Adds one frame. Returns true when a report is due, after logging it.
    pub fn record_frame(&mut self, frame_time: Duration) -> bool {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        self.metrics.frames += 1;
        self.update_metrics();

        self.since_report += frame_time;
        if self.report_interval.is_zero() || self.since_report < self.report_interval {
            return false;
        }
        self.since_report = Duration::ZERO;
        let m = &self.metrics;
        log::info!(
            "{:.1} fps, frame time {:.2} ms (min {:.2}, max {:.2})",
            m.fps,
            m.frame_time_ms,
            m.min_frame_time_ms,
            m.max_frame_time_ms
        );
        true
    }

    fn update_metrics(&mut self) {
        if self.frame_times.is_empty() {
            return;
        }

        let total: Duration = self.frame_times.iter().sum();
        let avg_ms = total.as_secs_f32() * 1000.0 / self.frame_times.len() as f32;
        self.metrics.frame_time_ms = avg_ms;
        self.metrics.fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };

        if let (Some(min), Some(max)) = (self.frame_times.iter().min(), self.frame_times.iter().max())
        {
            self.metrics.min_frame_time_ms = min.as_secs_f32() * 1000.0;
            self.metrics.max_frame_time_ms = max.as_secs_f32() * 1000.0;
        }
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    /// Frame times in milliseconds, oldest first
    pub fn frame_time_history(&self) -> Vec<f32> {
        self.frame_times
            .iter()
            .map(|d| d.as_secs_f32() * 1000.0)
            .collect()
    }

    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.metrics = FrameMetrics::default();
        self.since_report = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_extremes() {
        let mut stats = FrameStats::new(Duration::from_secs(60));
        for ms in [10, 20, 30] {
            stats.record_frame(Duration::from_millis(ms));
        }
        let m = stats.metrics();
        assert!((m.frame_time_ms - 20.0).abs() < 1e-3);
        assert!((m.fps - 50.0).abs() < 1e-2);
        assert!((m.min_frame_time_ms - 10.0).abs() < 1e-3);
        assert!((m.max_frame_time_ms - 30.0).abs() < 1e-3);
        assert_eq!(m.frames, 3);
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut stats = FrameStats::with_samples(2, Duration::from_secs(60));
        stats.record_frame(Duration::from_millis(100));
        stats.record_frame(Duration::from_millis(4));
        stats.record_frame(Duration::from_millis(6));
        assert_eq!(stats.frame_time_history().len(), 2);
        assert!((stats.metrics().max_frame_time_ms - 6.0).abs() < 1e-3);
        assert_eq!(stats.metrics().frames, 3);
    }

    #[test]
    fn test_reports_on_interval() {
        let mut stats = FrameStats::new(Duration::from_millis(50));
        assert!(!stats.record_frame(Duration::from_millis(20)));
        assert!(!stats.record_frame(Duration::from_millis(20)));
        assert!(stats.record_frame(Duration::from_millis(20)));
        assert!(!stats.record_frame(Duration::from_millis(20)));

        stats.reset();
        assert_eq!(stats.metrics(), &FrameMetrics::default());
    }
}
