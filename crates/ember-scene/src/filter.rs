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

//! Full-screen filter passes.
//!
//! A [`Filter`] owns one color texture plus one framebuffer per mip
//! level, so blur pyramids render into successive mips of the same
//! texture by selecting a target level. Rendering binds only the inputs
//! the compiled shader actually declares: every optional uniform is
//! resolved once when the shader is assigned, and absent uniforms skip
//! their binding work entirely.

use ember_core::math::{LinearRgba, Vec2, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use crate::ubo::{UboFilter, UboHandle, UboManager};

/// Maximum color inputs a filter shader can sample.
pub const MAX_INPUT_TEXTURES: usize = 8;
/// Maximum depth inputs a filter shader can sample.
pub const MAX_INPUT_DEPTH_TEXTURES: usize = 2;

/// Axis of a separable blur pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurDirection {
    /// Step along X by one texel.
    Horizontal,
    /// Step along Y by one texel.
    Vertical,
}

/// Creation parameters of a filter.
#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    /// Output width at mip 0.
    pub width: u32,
    /// Output height at mip 0.
    pub height: u32,
    /// Render to the default framebuffer instead of an owned target.
    pub onscreen: bool,
    /// Upper bound on mip levels; clamped to what the resolution allows.
    pub max_mip_count: u32,
    /// Separable blur axis, if this filter is a blur pass.
    pub direction: Option<BlurDirection>,
    /// Color format of the owned target.
    pub format: TextureFormat,
    /// Depth texture to attach to every level's framebuffer, if any.
    pub depth_attachment: Option<TextureId>,
}

/// How the filter clears its target before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ClearMode {
    None,
    Mask { color: bool, depth: bool },
    ToColor(LinearRgba),
}

/// Number of mip levels a `width` x `height` image can have.
pub fn texture_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[derive(Debug, Default, Clone, Copy)]
struct FilterUniforms {
    texture_unit: [Option<UniformLocation>; MAX_INPUT_TEXTURES],
    depth_unit: [Option<UniformLocation>; MAX_INPUT_DEPTH_TEXTURES],
    offset_2d: Option<UniformLocation>,
    inv_resolution: Option<UniformLocation>,
    depth_parameters: Option<UniformLocation>,
    camera_focus: Option<UniformLocation>,
    camera_focus_inv: Option<UniformLocation>,
    view_pos: Option<UniformLocation>,
    gauss_lod_level: Option<UniformLocation>,
}

/// One full-screen pass over a quad.
#[derive(Debug)]
pub struct Filter {
    width: u32,
    height: u32,
    onscreen: bool,
    mip_count: u32,
    lod_dims: Vec<(u32, u32)>,
    direction: Option<BlurDirection>,

    color_texture: Option<TextureId>,
    targets: Vec<RenderTargetId>,
    render_target_level: u32,

    shader: Option<ShaderId>,
    uniforms: FilterUniforms,

    input_textures: [Option<(TextureId, Option<SamplerId>)>; MAX_INPUT_TEXTURES],
    input_depth_textures: [Option<TextureId>; MAX_INPUT_DEPTH_TEXTURES],

    clear: ClearMode,
    depth_parameters: Vec4,
    view_pos: Vec3,
    focus_distance: f32,
    gauss_lod_level: i32,

    /// Handle for the filter constant block, written by the orchestrator.
    pub ubo_handle: Option<UboHandle>,
}

impl Filter {
    /// Creates a filter, allocating its color pyramid and one
    /// framebuffer per mip level when offscreen.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        desc: &FilterDescriptor,
    ) -> Result<Self, ResourceError> {
        let mip_count = desc
            .max_mip_count
            .max(1)
            .min(texture_levels(desc.width, desc.height));
        let lod_dims = calc_lod_dimensions(desc.width, desc.height, mip_count);

        let mut color_texture = None;
        let mut targets = Vec::new();
        let clear;

        if desc.onscreen {
            clear = ClearMode::Mask {
                color: true,
                depth: true,
            };
        } else {
            let texture = device.create_texture(&TextureDescriptor {
                label: Some("filter-color".into()),
                width: desc.width,
                height: desc.height,
                format: desc.format,
                mip_count,
                samples: 1,
            })?;
            for level in 0..mip_count {
                targets.push(device.create_render_target(&RenderTargetDescriptor {
                    label: Some("filter-target".into()),
                    colors: vec![texture],
                    level,
                    depth: desc.depth_attachment,
                })?);
            }
            color_texture = Some(texture);
            clear = ClearMode::Mask {
                color: true,
                depth: false,
            };
        }

        Ok(Self {
            width: desc.width,
            height: desc.height,
            onscreen: desc.onscreen,
            mip_count,
            lod_dims,
            direction: desc.direction,
            color_texture,
            targets,
            render_target_level: 0,
            shader: None,
            uniforms: FilterUniforms::default(),
            input_textures: [None; MAX_INPUT_TEXTURES],
            input_depth_textures: [None; MAX_INPUT_DEPTH_TEXTURES],
            clear,
            depth_parameters: Vec4::ZERO,
            view_pos: Vec3::ZERO,
            focus_distance: 0.0,
            gauss_lod_level: 0,
            ubo_handle: None,
        })
    }

    /// Clears per-frame state: inputs, clear override, target level.
    /// Creation-time resources (target pyramid, shader) are untouched.
    pub fn reset(&mut self) {
        self.input_textures = [None; MAX_INPUT_TEXTURES];
        self.input_depth_textures = [None; MAX_INPUT_DEPTH_TEXTURES];
        self.render_target_level = 0;
        self.gauss_lod_level = 0;
        self.clear = if self.onscreen {
            ClearMode::Mask {
                color: true,
                depth: true,
            }
        } else {
            ClearMode::Mask {
                color: true,
                depth: false,
            }
        };
    }

    /// Width of mip 0.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of mip 0.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of allocated mip levels.
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// The owned color texture, `None` for onscreen filters.
    pub fn color_texture(&self) -> Option<TextureId> {
        self.color_texture
    }

    /// The framebuffer of one mip level.
    pub fn render_target(&self, level: u32) -> Option<RenderTargetId> {
        self.targets.get(level as usize).copied()
    }

    /// The mip level the next render writes into.
    pub fn render_target_level(&self) -> u32 {
        self.render_target_level
    }

    /// Selects the output mip level, clamped to the allocated range.
    pub fn set_render_target_level(&mut self, level: u32) {
        self.render_target_level = level.min(self.mip_count - 1);
    }

    /// Selects the source mip level for pyramid-reading shaders.
    pub fn set_gauss_lod_level(&mut self, level: i32) {
        self.gauss_lod_level = level;
    }

    /// Assigns the shader and resolves its optional uniforms once.
    pub fn set_shader(&mut self, device: &dyn GraphicsDevice, shader: ShaderId) {
        self.shader = Some(shader);
        let mut u = FilterUniforms::default();
        for (i, slot) in u.texture_unit.iter_mut().enumerate() {
            *slot = device.uniform_location(shader, &format!("texture_unit{i}"));
        }
        for (i, slot) in u.depth_unit.iter_mut().enumerate() {
            *slot = device.uniform_location(shader, &format!("depth_unit{i}"));
        }
        u.offset_2d = device.uniform_location(shader, "offset_2d");
        u.inv_resolution = device.uniform_location(shader, "inv_resolution");
        u.depth_parameters = device.uniform_location(shader, "depth_parameters");
        u.camera_focus = device.uniform_location(shader, "camera_focus");
        u.camera_focus_inv = device.uniform_location(shader, "camera_focus_inv");
        u.view_pos = device.uniform_location(shader, "view_pos");
        u.gauss_lod_level = device.uniform_location(shader, "gauss_lod_level");
        self.uniforms = u;
    }

    /// Sets one color input.
    pub fn set_input(&mut self, index: usize, texture: TextureId, sampler: Option<SamplerId>) {
        self.input_textures[index] = Some((texture, sampler));
    }

    /// Sets one depth input (always sampled without a sampler object).
    pub fn set_depth_input(&mut self, index: usize, texture: TextureId) {
        self.input_depth_textures[index] = Some(texture);
    }

    /// Sets depth linearization and focus parameters from the camera.
    pub fn set_camera(&mut self, depth_parameters: Vec4, view_pos: Vec3, focus_distance: f32) {
        self.depth_parameters = depth_parameters;
        self.view_pos = view_pos;
        self.focus_distance = focus_distance;
    }

    /// Clears to an explicit color before drawing.
    pub fn set_clear_color(&mut self, color: LinearRgba) {
        self.clear = ClearMode::ToColor(color);
    }

    /// Skips clearing entirely (additive composition passes).
    pub fn set_no_clear(&mut self) {
        self.clear = ClearMode::None;
    }

    /// The UBO block for this pass, derived from the blur direction.
    pub fn filter_block(&self) -> UboFilter {
        let offset = match self.direction {
            Some(BlurDirection::Horizontal) => Vec2::new(1.0 / self.width as f32, 0.0),
            Some(BlurDirection::Vertical) => Vec2::new(0.0, 1.0 / self.height as f32),
            None => Vec2::ZERO,
        };
        UboFilter {
            offset_2d: Vec4::new(offset.x, offset.y, 0.0, 0.0),
        }
    }

    /// Runs the pass: binds target and declared inputs, sets the
    /// uniforms the shader uses, clears, and draws one quad.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        ubo: &UboManager,
        quad: VertexArrayId,
        stats: &mut RenderStats,
        stage: RenderStage,
    ) {
        let Some(shader) = self.shader else {
            return;
        };
        device.bind_shader(shader);

        let mut unit = 0u32;
        for (i, input) in self.input_textures.iter().enumerate() {
            if let (Some(location), Some((texture, sampler))) = (self.uniforms.texture_unit[i], *input)
            {
                device.set_uniform(location, UniformValue::Int(unit as i32));
                device.bind_texture(unit, texture, sampler);
                unit += 1;
            }
        }
        for (i, input) in self.input_depth_textures.iter().enumerate() {
            if let (Some(location), Some(texture)) = (self.uniforms.depth_unit[i], *input) {
                device.set_uniform(location, UniformValue::Int(unit as i32));
                device.bind_texture(unit, texture, None);
                unit += 1;
            }
        }

        if self.onscreen {
            device.bind_render_target(None);
            device.set_viewport(0, 0, self.width, self.height);
        } else {
            let level = self.render_target_level as usize;
            device.bind_render_target(Some(self.targets[level]));
            let (w, h) = self.lod_dims[level];
            device.set_viewport(0, 0, w, h);
        }

        if let Some(location) = self.uniforms.offset_2d {
            let block = self.filter_block();
            device.set_uniform(
                location,
                UniformValue::Vec2(Vec2::new(block.offset_2d.x, block.offset_2d.y)),
            );
        }
        if let Some(handle) = self.ubo_handle {
            ubo.bind_block(device, handle, crate::ubo::slots::FILTER);
        }
        if let Some(location) = self.uniforms.inv_resolution {
            device.set_uniform(
                location,
                UniformValue::Vec2(Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)),
            );
        }
        if let Some(location) = self.uniforms.depth_parameters {
            device.set_uniform(location, UniformValue::Vec4(self.depth_parameters));
        }
        if let Some(location) = self.uniforms.camera_focus {
            device.set_uniform(location, UniformValue::Float(self.focus_distance));
        }
        if let Some(location) = self.uniforms.camera_focus_inv {
            if self.focus_distance != 0.0 {
                device.set_uniform(location, UniformValue::Float(1.0 / self.focus_distance));
            }
        }
        if let Some(location) = self.uniforms.view_pos {
            device.set_uniform(location, UniformValue::Vec3(self.view_pos));
        }
        if let Some(location) = self.uniforms.gauss_lod_level {
            device.set_uniform(location, UniformValue::Int(self.gauss_lod_level));
        }

        device.bind_vertex_array(quad);

        match self.clear {
            ClearMode::None => {}
            ClearMode::Mask { color, depth } => {
                device.clear(
                    color.then_some(LinearRgba::TRANSPARENT),
                    depth.then_some(1.0),
                );
            }
            ClearMode::ToColor(color) => device.clear(Some(color), None),
        }

        device.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);
        stats.record_draw(stage, 4, 2);
    }
}

fn calc_lod_dimensions(width: u32, height: u32, lod_count: u32) -> Vec<(u32, u32)> {
    let mut dims = Vec::new();
    let mut k = 1u32;
    loop {
        let w = (width / k).max(1);
        let h = (height / k).max(1);
        dims.push((w, h));
        if dims.len() == lod_count as usize || (w == 1 && h == 1) {
            return dims;
        }
        k *= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::null::NullDevice;

    fn descriptor(max_mip_count: u32) -> FilterDescriptor {
        FilterDescriptor {
            width: 256,
            height: 128,
            onscreen: false,
            max_mip_count,
            direction: None,
            format: TextureFormat::Rgba16Float,
            depth_attachment: None,
        }
    }

    #[test]
    fn mip_count_is_clamped_to_resolution() {
        let mut device = NullDevice::new();
        let filter = Filter::new(&mut device, &descriptor(32)).unwrap();
        // 256x128 supports 9 levels at most.
        assert_eq!(filter.mip_count(), 9);
        assert_eq!(filter.render_target(8).is_some(), true);
        assert_eq!(filter.render_target(9), None);
    }

    #[test]
    fn render_target_level_is_clamped() {
        let mut device = NullDevice::new();
        let mut filter = Filter::new(&mut device, &descriptor(4)).unwrap();
        filter.set_render_target_level(2);
        assert_eq!(filter.render_target_level(), 2);
        filter.set_render_target_level(99);
        assert_eq!(filter.render_target_level(), filter.mip_count() - 1);
    }

    #[test]
    fn blur_direction_selects_texel_step() {
        let mut device = NullDevice::new();
        let mut desc = descriptor(1);
        desc.direction = Some(BlurDirection::Horizontal);
        let filter = Filter::new(&mut device, &desc).unwrap();
        let block = filter.filter_block();
        assert_eq!(block.offset_2d.x, 1.0 / 256.0);
        assert_eq!(block.offset_2d.y, 0.0);

        desc.direction = Some(BlurDirection::Vertical);
        let filter = Filter::new(&mut device, &desc).unwrap();
        let block = filter.filter_block();
        assert_eq!(block.offset_2d.x, 0.0);
        assert_eq!(block.offset_2d.y, 1.0 / 128.0);
    }

    #[test]
    fn lod_dimensions_halve_down_to_one() {
        let dims = calc_lod_dimensions(256, 128, 9);
        assert_eq!(dims[0], (256, 128));
        assert_eq!(dims[1], (128, 64));
        assert_eq!(dims[8], (1, 1));
    }

    #[test]
    fn reset_keeps_targets_but_drops_inputs() {
        let mut device = NullDevice::new();
        let mut filter = Filter::new(&mut device, &descriptor(4)).unwrap();
        filter.set_input(0, TextureId(42), None);
        filter.set_render_target_level(3);
        filter.reset();
        assert!(filter.input_textures[0].is_none());
        assert_eq!(filter.render_target_level(), 0);
        assert!(filter.color_texture().is_some());
    }
}
