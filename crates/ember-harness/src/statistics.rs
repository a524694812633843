// Copyright 2025 the emberbench authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Run statistics: frame timing, windowed fps log, draw-call summaries.
//!
//! One [`RenderStatistics`] instance accumulates over the measured part of
//! a run (warm-up frames are simply never added) and condenses into a
//! JSON-serializable [`BenchmarkResult`] at the end. The statistical
//! output tolerates occasional degraded frames; nothing here can fail.

use ember_core::renderer::api::RenderStats;
use log::info;
use serde::Serialize;

/// Min/max/running-sum accumulator for one per-frame quantity.
#[derive(Debug, Clone, Copy, Default)]
struct Aggregate {
    min: f64,
    max: f64,
    sum: f64,
    count: u32,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    fn summary(&self) -> Summary {
        Summary {
            min: if self.count == 0 { 0.0 } else { self.min },
            max: if self.count == 0 { 0.0 } else { self.max },
            avg: if self.count == 0 {
                0.0
            } else {
                self.sum / f64::from(self.count)
            },
        }
    }
}

/// Min/max/average of one quantity over the run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Summary {
    /// Smallest per-frame value.
    pub min: f64,
    /// Largest per-frame value.
    pub max: f64,
    /// Mean per-frame value.
    pub avg: f64,
}

/// Frame time distribution in milliseconds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameTimeSummary {
    /// Mean frame time.
    pub avg: f64,
    /// Fastest frame.
    pub min: f64,
    /// Slowest frame.
    pub max: f64,
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// The condensed, serializable result of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    /// Identifier of the test that ran.
    pub test_id: String,
    /// Render width in pixels.
    pub width: u32,
    /// Render height in pixels.
    pub height: u32,
    /// Number of measured frames.
    pub frames: u32,
    /// Total measured wall time in milliseconds.
    pub elapsed_ms: f64,
    /// Overall average frames per second.
    pub avg_fps: f64,
    /// Average fps per log window, in run order.
    pub fps_log: Vec<f64>,
    /// Frame time distribution.
    pub frame_time_ms: FrameTimeSummary,
    /// Draw calls per frame.
    pub draw_calls: Summary,
    /// Triangles per frame.
    pub triangles: Summary,
    /// Compute dispatches per frame.
    pub dispatches: Summary,
}

/// Accumulates per-frame timings and render counters over a run.
#[derive(Debug)]
pub struct RenderStatistics {
    width: u32,
    height: u32,
    window_ms: f64,
    frame_times_ms: Vec<f64>,
    window_elapsed: f64,
    window_frames: u32,
    fps_log: Vec<f64>,
    draw_calls: Aggregate,
    triangles: Aggregate,
    dispatches: Aggregate,
}

impl RenderStatistics {
    /// Creates an empty accumulator for a run at the given resolution.
    /// `fps_log_window_ms` is the width of one fps log bucket.
    pub fn new(width: u32, height: u32, fps_log_window_ms: u32) -> Self {
        Self {
            width,
            height,
            window_ms: f64::from(fps_log_window_ms.max(1)),
            frame_times_ms: Vec::new(),
            window_elapsed: 0.0,
            window_frames: 0,
            fps_log: Vec::new(),
            draw_calls: Aggregate::default(),
            triangles: Aggregate::default(),
            dispatches: Aggregate::default(),
        }
    }

    /// Records one measured frame.
    pub fn add_frame(&mut self, frame_time_ms: f64, frame: &RenderStats) {
        self.frame_times_ms.push(frame_time_ms);
        self.draw_calls.record(f64::from(frame.draw_calls));
        self.triangles.record(frame.triangles as f64);
        self.dispatches.record(f64::from(frame.dispatches));

        self.window_elapsed += frame_time_ms;
        self.window_frames += 1;
        if self.window_elapsed >= self.window_ms {
            self.fps_log
                .push(f64::from(self.window_frames) * 1000.0 / self.window_elapsed);
            self.window_elapsed = 0.0;
            self.window_frames = 0;
        }
    }

    /// Number of measured frames so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_times_ms.len() as u32
    }

    /// Nearest-rank percentile of the frame times, `p` in 0..=100.
    pub fn frame_time_percentile(&self, p: f64) -> f64 {
        if self.frame_times_ms.is_empty() {
            return 0.0;
        }
        let mut sorted = self.frame_times_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }

    /// Condenses the run into its reportable result. A still-open fps
    /// window is flushed as a final partial bucket.
    pub fn result(&self, test_id: &str) -> BenchmarkResult {
        let frames = self.frame_count();
        let elapsed_ms: f64 = self.frame_times_ms.iter().sum();
        let avg_fps = if elapsed_ms > 0.0 {
            f64::from(frames) * 1000.0 / elapsed_ms
        } else {
            0.0
        };

        let mut fps_log = self.fps_log.clone();
        if self.window_frames > 0 && self.window_elapsed > 0.0 {
            fps_log.push(f64::from(self.window_frames) * 1000.0 / self.window_elapsed);
        }

        let frame_time_ms = FrameTimeSummary {
            avg: if frames == 0 {
                0.0
            } else {
                elapsed_ms / f64::from(frames)
            },
            min: if frames == 0 {
                0.0
            } else {
                self.frame_times_ms
                    .iter()
                    .copied()
                    .fold(f64::INFINITY, f64::min)
            },
            max: self.frame_times_ms.iter().copied().fold(0.0, f64::max),
            p50: self.frame_time_percentile(50.0),
            p90: self.frame_time_percentile(90.0),
            p99: self.frame_time_percentile(99.0),
        };

        info!(
            "run '{}': {} frames, {:.1} ms, {:.2} fps avg",
            test_id, frames, elapsed_ms, avg_fps
        );

        BenchmarkResult {
            test_id: test_id.to_string(),
            width: self.width,
            height: self.height,
            frames,
            elapsed_ms,
            avg_fps,
            fps_log,
            frame_time_ms,
            draw_calls: self.draw_calls.summary(),
            triangles: self.triangles.summary(),
            dispatches: self.dispatches.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ember_core::renderer::api::RenderStage;

    fn frame(draws: u32) -> RenderStats {
        let mut stats = RenderStats::default();
        for _ in 0..draws {
            stats.record_draw(RenderStage::GBufferSolids, 3, 1);
        }
        stats
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let mut stats = RenderStatistics::new(1920, 1080, 2000);
        for t in 1..=10 {
            stats.add_frame(f64::from(t), &frame(1));
        }
        assert_relative_eq!(stats.frame_time_percentile(50.0), 5.0);
        assert_relative_eq!(stats.frame_time_percentile(90.0), 9.0);
        assert_relative_eq!(stats.frame_time_percentile(99.0), 10.0);
        assert_relative_eq!(stats.frame_time_percentile(100.0), 10.0);
    }

    #[test]
    fn empty_run_reports_zeros() {
        let stats = RenderStatistics::new(1920, 1080, 2000);
        let result = stats.result("empty");
        assert_eq!(result.frames, 0);
        assert_relative_eq!(result.avg_fps, 0.0);
        assert_relative_eq!(result.draw_calls.avg, 0.0);
        assert!(result.fps_log.is_empty());
    }

    #[test]
    fn fps_window_buckets_and_flushes() {
        // 100 ms windows, 50 ms frames: every second frame closes a bucket.
        let mut stats = RenderStatistics::new(1920, 1080, 100);
        for _ in 0..5 {
            stats.add_frame(50.0, &frame(1));
        }
        let result = stats.result("windows");
        // two full buckets of 20 fps plus the flushed half bucket
        assert_eq!(result.fps_log.len(), 3);
        assert_relative_eq!(result.fps_log[0], 20.0);
        assert_relative_eq!(result.fps_log[1], 20.0);
        assert_relative_eq!(result.fps_log[2], 20.0);
        assert_relative_eq!(result.avg_fps, 20.0);
    }

    #[test]
    fn draw_call_summary_tracks_min_max_avg() {
        let mut stats = RenderStatistics::new(1920, 1080, 2000);
        stats.add_frame(16.0, &frame(10));
        stats.add_frame(16.0, &frame(30));
        let result = stats.result("draws");
        assert_relative_eq!(result.draw_calls.min, 10.0);
        assert_relative_eq!(result.draw_calls.max, 30.0);
        assert_relative_eq!(result.draw_calls.avg, 20.0);
        assert_relative_eq!(result.triangles.avg, 20.0);
    }

    #[test]
    fn result_serializes_to_json() {
        let mut stats = RenderStatistics::new(1280, 720, 2000);
        stats.add_frame(16.0, &frame(5));
        let json = serde_json::to_string(&stats.result("gl_ember")).unwrap();
        assert!(json.contains("\"test_id\":\"gl_ember\""));
        assert!(json.contains("\"avg_fps\""));
        assert!(json.contains("\"p99\""));
    }
}
