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

//! GPU particle emitters simulated with transform feedback.
//!
//! Each emitter owns two particle buffers in a ping-pong arrangement:
//! the advect pass reads set A through a points VAO, captures advected
//! particles into set B with transform feedback, and the render pass
//! draws set B as instanced billboards. [`Emitter::switch_buffers`]
//! swaps the roles each frame.
//!
//! Simulation runs in fixed substeps. The CPU only computes per-substep
//! birth ranges; all substeps are folded into a single points draw by
//! passing the range headers as one uniform array.

use ember_core::math::{Mat4, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};
use log::debug;

use crate::ubo::UboHandle;

/// Floats per particle: position, age/speed/accel, amplitude, phase,
/// frequency, tangent, bitangent, normal (3 each), velocity (4). Must
/// match the transform-feedback varying list of the advect shader.
pub const PARTICLE_FLOAT_COUNT: usize = 28;

/// Fixed simulation substep length.
pub const SUBSTEP_SECONDS: f32 = 0.025;

/// Largest number of substeps folded into one advect draw.
pub const MAX_SUBSTEPS: usize = 10;

/// Emission accumulates `rate / RATE_DIVIDER` particles per substep.
pub const RATE_DIVIDER: f32 = 40.0;

/// The behavioral class of an emitter, fixed at load time from its
/// scene name. Pass selection branches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// Slow, large, alpha-blended smoke.
    Smoke,
    /// Bright additive fire.
    Fire,
    /// Small fast additive sparks.
    Spark,
    /// Dark drifting soot flakes.
    Soot,
}

impl ParticleKind {
    /// Classifies an emitter by its scene name. Unrecognized names get
    /// the smoke behavior.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("fire") {
            Self::Fire
        } else if lower.contains("spark") {
            Self::Spark
        } else if lower.contains("soot") {
            Self::Soot
        } else {
            Self::Smoke
        }
    }
}

/// Birth index range produced by one simulation substep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstepRange {
    /// First particle slot reborn this substep.
    pub start_birth: u32,
    /// One past the last reborn slot (modulo the buffer size).
    pub end_birth: u32,
    /// False when the range wraps around the end of the buffer.
    pub no_overflow: bool,
}

impl SubstepRange {
    /// Packs the range into the uniform-array layout the advect shader
    /// consumes.
    pub fn as_vec4(&self) -> Vec4 {
        Vec4::new(
            self.start_birth as f32,
            self.end_birth as f32,
            if self.no_overflow { 1.0 } else { 0.0 },
            0.0,
        )
    }
}

/// The buffer roles for the current frame, after [`Emitter::switch_buffers`].
#[derive(Debug, Clone, Copy)]
pub struct EmitterBuffers {
    /// Points VAO over the source particle set.
    pub advect_vao: VertexArrayId,
    /// The destination particle buffer, bound for transform feedback.
    pub capture_buffer: BufferId,
    /// Instanced billboard VAO over the destination set.
    pub render_vao: VertexArrayId,
}

/// Parameters the advect shader draws fresh particles from.
#[derive(Debug, Clone, Copy)]
pub struct EmitterParams {
    /// Emission aperture half-extents, `w` = focus distance.
    pub aperture_focus: Vec4,
    /// Minimum oscillation frequency, `w` = minimum speed.
    pub min_freq_speed: Vec4,
    /// Maximum oscillation frequency, `w` = maximum speed.
    pub max_freq_speed: Vec4,
    /// Minimum oscillation amplitude, `w` = minimum acceleration.
    pub min_amp_accel: Vec4,
    /// Maximum oscillation amplitude, `w` = maximum acceleration.
    pub max_amp_accel: Vec4,
    /// External velocity, `w` = gravity factor.
    pub external_velocity_gravity: Vec4,
    /// Seconds a particle lives.
    pub max_life: f32,
    /// Billboard half-size.
    pub size: (f32, f32),
    /// Particle tint.
    pub color: Vec3,
}

impl Default for EmitterParams {
    fn default() -> Self {
        Self {
            aperture_focus: Vec4::ZERO,
            min_freq_speed: Vec4::ZERO,
            max_freq_speed: Vec4::ZERO,
            min_amp_accel: Vec4::ZERO,
            max_amp_accel: Vec4::ZERO,
            external_velocity_gravity: Vec4::ZERO,
            max_life: 1.0,
            size: (1.0, 1.0),
            color: Vec3::ONE,
        }
    }
}

// Billboard corner positions and UVs, drawn as a 4-vertex fan.
const BILLBOARD_GEOMETRY: [f32; 16] = [
    -1.0, -1.0, 0.0, 1.0, //
    1.0, -1.0, 1.0, 1.0, //
    1.0, 1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 0.0,
];

/// A transform-feedback particle emitter.
#[derive(Debug)]
pub struct Emitter {
    name: String,
    kind: ParticleKind,

    max_particle_count: u32,
    rate: f32,
    actual_rate: f32,
    emit_count: f32,

    start_birth: u32,
    end_birth: u32,
    num_substeps: u32,
    accumulated_diff_time: f32,
    time_ms: u32,
    prev_time_ms: u32,
    visible_particle_count: u32,

    current: usize,
    instance_buffers: [BufferId; 2],
    advect_vaos: [VertexArrayId; 2],
    render_vaos: [VertexArrayId; 2],

    /// Emitter-to-world transform, animated by the scene.
    pub world: Mat4,
    /// Advect/render parameters.
    pub params: EmitterParams,
    /// Handle for the advect constant block.
    pub advect_handle: Option<UboHandle>,
    /// Handle for the render constant block.
    pub render_handle: Option<UboHandle>,
}

impl Emitter {
    /// Creates an emitter and its double-buffered GPU sets.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        rate: f32,
        max_particle_count: u32,
    ) -> Result<Self, ResourceError> {
        let stride = (PARTICLE_FLOAT_COUNT * 4) as u32;

        // Seed the last float of each particle with its own index; the
        // advect shader uses it to match slots against birth ranges.
        let mut init = vec![0.0f32; max_particle_count as usize * PARTICLE_FLOAT_COUNT];
        for i in 0..max_particle_count as usize {
            init[i * PARTICLE_FLOAT_COUNT + PARTICLE_FLOAT_COUNT - 1] = i as f32;
        }

        let geometry = device.create_buffer(&BufferDescriptor {
            label: Some("particle-billboard".into()),
            size: std::mem::size_of_val(&BILLBOARD_GEOMETRY),
            usage: BufferUsage::Vertex,
            access: BufferAccess::Static,
        })?;
        device.write_buffer(geometry, 0, bytemuck::cast_slice(&BILLBOARD_GEOMETRY));

        let mut instance_buffers = [BufferId(0); 2];
        let mut advect_vaos = [VertexArrayId(0); 2];
        let mut render_vaos = [VertexArrayId(0); 2];

        for set in 0..2 {
            let buffer = device.create_buffer(&BufferDescriptor {
                label: Some("particle-instances".into()),
                size: init.len() * 4,
                usage: BufferUsage::TransformFeedback,
                access: BufferAccess::Dynamic,
            })?;
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&init));
            instance_buffers[set] = buffer;

            advect_vaos[set] = device.create_vertex_array(&VertexArrayDescriptor {
                label: Some("particle-advect".into()),
                layouts: vec![VertexBufferLayout {
                    buffer,
                    base_offset: 0,
                    stride,
                    attributes: particle_attributes(0),
                }],
                index_buffer: None,
            })?;

            let mut layouts = vec![VertexBufferLayout {
                buffer,
                base_offset: 0,
                stride,
                attributes: particle_attributes(1),
            }];
            layouts.push(VertexBufferLayout {
                buffer: geometry,
                base_offset: 0,
                stride: 16,
                attributes: vec![VertexAttribute {
                    location: 9,
                    format: VertexFormat::Float32x4,
                    offset: 0,
                    divisor: 0,
                }],
            });
            render_vaos[set] = device.create_vertex_array(&VertexArrayDescriptor {
                label: Some("particle-render".into()),
                layouts,
                index_buffer: None,
            })?;
        }

        debug!("Emitter '{name}': {max_particle_count} particles, rate {rate}");

        Ok(Self {
            name: name.to_string(),
            kind: ParticleKind::from_name(name),
            max_particle_count,
            rate,
            actual_rate: rate,
            emit_count: 0.0,
            start_birth: 0,
            end_birth: 0,
            num_substeps: 0,
            accumulated_diff_time: 0.0,
            time_ms: 0,
            prev_time_ms: 0,
            visible_particle_count: 0,
            current: 0,
            instance_buffers,
            advect_vaos,
            render_vaos,
            world: Mat4::IDENTITY,
            params: EmitterParams::default(),
            advect_handle: None,
            render_handle: None,
        })
    }

    /// The emitter's scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The behavioral class assigned at load.
    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Capacity of one particle buffer.
    pub fn max_particle_count(&self) -> u32 {
        self.max_particle_count
    }

    /// Substeps the pending advect draw will fold together. Zero means
    /// the frame advects nothing but still swaps and renders stale data.
    pub fn num_substeps(&self) -> u32 {
        self.num_substeps
    }

    /// Particles submitted to advect and render draws. Transform
    /// feedback allows no CPU-side culling, so after the first simulated
    /// frame this is the full buffer.
    pub fn visible_particle_count(&self) -> u32 {
        self.visible_particle_count
    }

    /// Scales the emission rate (animated spawn tracks).
    pub fn set_rate_scale(&mut self, scale: f32) {
        self.actual_rate = self.rate * scale.min(1.0);
    }

    /// Advances emitter time and decides how many fixed substeps the
    /// frame needs. Time shorter than one substep accumulates.
    pub fn simulate(&mut self, time_ms: u32) {
        self.prev_time_ms = self.time_ms;
        self.time_ms = time_ms;
        let diff_time_sec = (self.time_ms.wrapping_sub(self.prev_time_ms)) as f32 / 1000.0;

        self.actual_rate = self.rate;
        self.accumulated_diff_time += diff_time_sec;
        self.num_substeps = if self.accumulated_diff_time < SUBSTEP_SECONDS {
            0
        } else {
            let n = (self.accumulated_diff_time / SUBSTEP_SECONDS) as u32 + 1;
            self.accumulated_diff_time = 0.0;
            n.min(MAX_SUBSTEPS as u32)
        };
    }

    /// Produces the birth range of one substep. Emission per substep is
    /// capped to a quarter of the buffer so newborns cannot trample
    /// particles still alive.
    pub fn simulate_substep(&mut self) -> SubstepRange {
        self.emit_count += self.actual_rate / RATE_DIVIDER;
        self.emit_count = self
            .emit_count
            .min(self.max_particle_count as f32 / 4.0);

        self.start_birth = self.end_birth;
        self.end_birth = (self.start_birth + self.emit_count as u32) % self.max_particle_count;
        let no_overflow = self.start_birth <= self.end_birth;

        self.visible_particle_count = self.max_particle_count;

        if self.emit_count >= 1.0 {
            self.emit_count = 0.0;
        }

        SubstepRange {
            start_birth: self.start_birth,
            end_birth: self.end_birth,
            no_overflow,
        }
    }

    /// Swaps the source and destination particle sets.
    pub fn switch_buffers(&mut self) {
        self.current ^= 1;
    }

    /// The buffer roles for this frame: advect reads the current set and
    /// captures into the other; render draws what was just captured.
    pub fn buffers(&self) -> EmitterBuffers {
        let other = self.current ^ 1;
        EmitterBuffers {
            advect_vao: self.advect_vaos[self.current],
            capture_buffer: self.instance_buffers[other],
            render_vao: self.render_vaos[other],
        }
    }

    /// Raw instance buffer of one set, used by particle-buffer dumps.
    pub fn instance_buffer(&self, set: usize) -> BufferId {
        self.instance_buffers[set]
    }
}

fn particle_attributes(divisor: u32) -> Vec<VertexAttribute> {
    let mut attributes = Vec::with_capacity(9);
    for location in 0..8u32 {
        attributes.push(VertexAttribute {
            location,
            format: VertexFormat::Float32x3,
            offset: location * 12,
            divisor,
        });
    }
    attributes.push(VertexAttribute {
        location: 8,
        format: VertexFormat::Float32x4,
        offset: 96,
        divisor,
    });
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::null::NullDevice;

    fn emitter(rate: f32) -> (NullDevice, Emitter) {
        let mut device = NullDevice::new();
        let emitter = Emitter::new(&mut device, "smoke_01", rate, 1000).unwrap();
        (device, emitter)
    }

    #[test]
    fn kind_is_assigned_from_name_at_load() {
        let mut device = NullDevice::new();
        for (name, kind) in [
            ("fire_barrel", ParticleKind::Fire),
            ("Spark_emitter_3", ParticleKind::Spark),
            ("soot_fall", ParticleKind::Soot),
            ("smoke_chimney", ParticleKind::Smoke),
            ("mystery", ParticleKind::Smoke),
        ] {
            let e = Emitter::new(&mut device, name, 10.0, 100).unwrap();
            assert_eq!(e.kind(), kind, "{name}");
        }
    }

    #[test]
    fn switch_buffers_round_trips() {
        let (_device, mut e) = emitter(10.0);
        let before = e.buffers();
        e.switch_buffers();
        let mid = e.buffers();
        assert_ne!(before.advect_vao, mid.advect_vao);
        assert_ne!(before.capture_buffer, mid.capture_buffer);
        e.switch_buffers();
        let after = e.buffers();
        assert_eq!(before.advect_vao, after.advect_vao);
        assert_eq!(before.capture_buffer, after.capture_buffer);
        assert_eq!(before.render_vao, after.render_vao);
    }

    #[test]
    fn advect_reads_one_set_and_captures_the_other() {
        let (_device, e) = emitter(10.0);
        let b = e.buffers();
        // The capture target must not be the buffer the advect VAO reads.
        assert_eq!(b.capture_buffer, e.instance_buffer(1));
        assert_ne!(b.capture_buffer, e.instance_buffer(0));
    }

    #[test]
    fn short_frames_accumulate_into_zero_substeps() {
        let (_device, mut e) = emitter(10.0);
        e.simulate(1000);
        e.simulate(1010); // 10 ms < 25 ms substep
        assert_eq!(e.num_substeps(), 0);
        e.simulate(1030); // accumulated 30 ms crosses the threshold
        assert!(e.num_substeps() >= 1);
    }

    #[test]
    fn substep_count_is_capped() {
        let (_device, mut e) = emitter(10.0);
        e.simulate(0);
        e.simulate(10_000);
        assert_eq!(e.num_substeps(), MAX_SUBSTEPS as u32);
    }

    #[test]
    fn emission_is_capped_to_quarter_buffer() {
        let (_device, mut e) = emitter(1.0e9);
        e.simulate(0);
        e.simulate(100);
        let range = e.simulate_substep();
        let born = if range.no_overflow {
            range.end_birth - range.start_birth
        } else {
            e.max_particle_count() - range.start_birth + range.end_birth
        };
        assert!(born <= e.max_particle_count() / 4);
    }

    #[test]
    fn birth_ranges_wrap_with_overflow_flag() {
        let (_device, mut e) = emitter(4.0e4);
        e.simulate(0);
        e.simulate(100);
        let mut saw_wrap = false;
        for _ in 0..64 {
            let range = e.simulate_substep();
            if !range.no_overflow {
                saw_wrap = true;
                assert!(range.start_birth > range.end_birth);
            }
        }
        assert!(saw_wrap);
    }

    #[test]
    fn substep_header_packs_range() {
        let range = SubstepRange {
            start_birth: 10,
            end_birth: 20,
            no_overflow: true,
        };
        let v = range.as_vec4();
        assert_eq!((v.x, v.y, v.z), (10.0, 20.0, 1.0));
    }
}
