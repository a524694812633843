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

//! The per-test configuration object.
//!
//! Tests are configured by a flat JSON object of named options; every
//! option has a default, so an empty object is a valid descriptor. Field
//! names follow the configuration files, not Rust convention, where the
//! two differ (`screenmode`).

use ember_core::renderer::api::RenderBits;
use log::warn;
use serde::Deserialize;

/// Where the test renders its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u32")]
pub enum ScreenMode {
    /// Render to the window surface at its native size.
    Onscreen,
    /// Render to an offscreen target at the test resolution.
    Offscreen,
}

impl From<u32> for ScreenMode {
    fn from(value: u32) -> Self {
        match value {
            1 => ScreenMode::Offscreen,
            _ => ScreenMode::Onscreen,
        }
    }
}

/// Options recognized by the benchmark tests, parsed from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestDescriptor {
    /// Identifier of the test to run.
    pub test_id: String,
    /// Width of the fps log window in milliseconds.
    pub fps_log_window: u32,
    /// Onscreen or offscreen rendering.
    #[serde(rename = "screenmode")]
    pub screen_mode: ScreenMode,
    /// Raw mask of render features to disable; see
    /// [`TestDescriptor::disabled_render_bits`].
    disabled_render_bits: u32,
    /// Frames rendered before measurement starts; negative values clamp
    /// to zero.
    warmup_frames: i64,
    /// Number of times the animation loops; 0 = play once.
    pub loop_count: u32,
    /// Requested multisample count; 0 disables FSAA.
    pub fsaa: u32,
    /// Whether a depth-only pre-pass runs before the G-buffer pass.
    pub zprepass: bool,
    /// Forces highp precision in all fragment shaders.
    pub force_highp: bool,
    /// Frames to screenshot, as a comma/range list ("10,20-25").
    pub screenshot_frames: String,
    /// Frames at which particle buffers are read back, same list syntax.
    pub particle_save_frames: String,
    /// Quality-metric comparison to run, empty for none.
    pub qm_metric: String,
    /// Reference image for the quality metric.
    pub qm_reference_filename: String,
    /// Compute workgroup size override string, empty for shader defaults.
    pub wg_sizes: String,
    /// Offscreen render width.
    pub test_width: u32,
    /// Offscreen render height.
    pub test_height: u32,
}

impl Default for TestDescriptor {
    fn default() -> Self {
        Self {
            test_id: String::new(),
            fps_log_window: 2000,
            screen_mode: ScreenMode::Onscreen,
            disabled_render_bits: 0,
            warmup_frames: 0,
            loop_count: 0,
            fsaa: 0,
            zprepass: false,
            force_highp: false,
            screenshot_frames: String::new(),
            particle_save_frames: String::new(),
            qm_metric: String::new(),
            qm_reference_filename: String::new(),
            wg_sizes: String::new(),
            test_width: 1920,
            test_height: 1080,
        }
    }
}

impl TestDescriptor {
    /// Parses a descriptor from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The render features the configuration disables.
    pub fn disabled_render_bits(&self) -> RenderBits {
        RenderBits::from_bits(self.disabled_render_bits)
    }

    /// Warm-up frame count, clamped to zero.
    pub fn warmup_frames(&self) -> u32 {
        self.warmup_frames.max(0) as u32
    }

    /// The parsed screenshot frame list.
    pub fn screenshot_frames(&self) -> Vec<u32> {
        parse_frame_list(&self.screenshot_frames)
    }

    /// The parsed particle buffer save frame list.
    pub fn particle_save_frames(&self) -> Vec<u32> {
        parse_frame_list(&self.particle_save_frames)
    }
}

/// Parses a comma-separated frame list with inclusive ranges.
///
/// `"10,20-23"` yields `[10, 20, 21, 22, 23]`; the empty string yields an
/// empty list; a degenerate range `"5-5"` yields `[5]`. The result is
/// sorted. Tokens that do not parse are skipped with a warning.
pub fn parse_frame_list(list: &str) -> Vec<u32> {
    let mut frames = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let parsed = match token.split_once('-') {
            Some((start, end)) => start
                .trim()
                .parse::<u32>()
                .and_then(|s| end.trim().parse::<u32>().map(|e| (s, e))),
            None => token.parse::<u32>().map(|v| (v, v)),
        };
        match parsed {
            Ok((start, end)) => frames.extend(start..=end),
            Err(_) => warn!("skipping malformed frame list token '{token}'"),
        }
    }
    frames.sort_unstable();
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_list_expands_ranges_sorted() {
        assert_eq!(parse_frame_list("10,20-23"), vec![10, 20, 21, 22, 23]);
        assert_eq!(parse_frame_list("20-23,10"), vec![10, 20, 21, 22, 23]);
    }

    #[test]
    fn frame_list_edge_cases() {
        assert_eq!(parse_frame_list(""), Vec::<u32>::new());
        assert_eq!(parse_frame_list("5-5"), vec![5]);
        assert_eq!(parse_frame_list(" 7 , 9 "), vec![7, 9]);
        // an inverted range contributes nothing
        assert_eq!(parse_frame_list("9-7"), Vec::<u32>::new());
        assert_eq!(parse_frame_list("3,bogus,4"), vec![3, 4]);
    }

    #[test]
    fn empty_object_gives_defaults() {
        let descriptor = TestDescriptor::from_json("{}").unwrap();
        assert_eq!(descriptor.fps_log_window, 2000);
        assert_eq!(descriptor.screen_mode, ScreenMode::Onscreen);
        assert_eq!(descriptor.test_width, 1920);
        assert_eq!(descriptor.test_height, 1080);
        assert!(descriptor.disabled_render_bits().is_empty());
        assert_eq!(descriptor.warmup_frames(), 0);
    }

    #[test]
    fn full_descriptor_parses() {
        let descriptor = TestDescriptor::from_json(
            r#"{
                "test_id": "gl_ember",
                "screenmode": 1,
                "fps_log_window": 1000,
                "disabled_render_bits": 12,
                "warmup_frames": -5,
                "loop_count": 3,
                "fsaa": 4,
                "zprepass": true,
                "force_highp": true,
                "screenshot_frames": "100,200-202",
                "qm_metric": "ssim",
                "qm_reference_filename": "ref.png",
                "wg_sizes": "64,1,1",
                "test_width": 2560,
                "test_height": 1440
            }"#,
        )
        .unwrap();
        assert_eq!(descriptor.test_id, "gl_ember");
        assert_eq!(descriptor.screen_mode, ScreenMode::Offscreen);
        assert_eq!(descriptor.warmup_frames(), 0);
        assert_eq!(descriptor.screenshot_frames(), vec![100, 200, 201, 202]);
        let disabled = descriptor.disabled_render_bits();
        assert!(disabled.contains(RenderBits::PARTICLES));
        assert!(disabled.contains(RenderBits::LIGHTING));
        assert!(!disabled.contains(RenderBits::SHADOW_DEPTH));
    }

    #[test]
    fn unknown_screen_modes_fall_back_to_onscreen() {
        let descriptor = TestDescriptor::from_json(r#"{"screenmode": 7}"#).unwrap();
        assert_eq!(descriptor.screen_mode, ScreenMode::Onscreen);
    }
}
