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

//! Compute-simulated lightning bolts.
//!
//! Three GPU passes per frame: pass 1 grows each bolt as a polyline
//! between an actor bone and a sky/ground endpoint, pass 2 expands the
//! polylines into camera-facing quads and writes an indirect draw
//! command, and the render pass consumes that command with an indirect
//! draw — the CPU never reads the vertex count back. The passes are
//! declared as a small dependency graph so the barrier between any
//! writer and its reader is explicit data, not a call buried in pass
//! code.
//!
//! The effect soft-fails: missing endpoint files or shader errors leave
//! it uninitialized, and every entry point returns early.

use ember_core::math::{Mat4, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::GraphicsDevice;
use log::{error, warn};

/// Maximum simultaneous bolts.
pub const LIGHTNING_COUNT: u32 = 9;
/// Polyline vec4 slots per bolt in the headers buffer.
pub const LIGHTNING_BUFFER_SIZE: usize = 128;
/// Expanded-quad vec4 slots in the render buffer.
pub const RENDER_BUFFER_SIZE: usize = 8192;

const INDIRECT_COMMAND_SIZE: usize = 16;
const HEADER_FLOATS: usize = LIGHTNING_COUNT as usize + 64;

/// Skeleton classification assigned once at load from bone names.
/// Harvesting branches on the tag, never on the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneCategory {
    /// A regular joint: arms, head, spine.
    Core,
    /// The chest joint; segments under it flip their endpoint order.
    Chest,
    /// The gun joint; its segment is pushed three extra times so more
    /// bolts anchor on the weapon.
    Gun,
    /// Fingers, excluded from harvesting.
    Finger,
    /// Toes, excluded.
    Toe,
    /// Feet, excluded.
    Foot,
    /// Legs, excluded.
    Leg,
    /// Hips, excluded.
    Hip,
    /// Not a joint at all; the node and its subtree are skipped.
    NotAJoint,
}

impl BoneCategory {
    /// Classifies a scene node name.
    pub fn from_name(name: &str) -> Self {
        if !name.ends_with("jnt") {
            return Self::NotAJoint;
        }
        if name.contains("L_1") || name.contains("L_2") {
            Self::Finger
        } else if name.contains("toe") {
            Self::Toe
        } else if name.contains("foot") {
            Self::Foot
        } else if name.contains("leg") {
            Self::Leg
        } else if name.contains("hip") {
            Self::Hip
        } else if name.contains("gun") {
            Self::Gun
        } else if name.contains("chest") {
            Self::Chest
        } else {
            Self::Core
        }
    }

    fn excluded(self) -> bool {
        matches!(
            self,
            Self::Finger | Self::Toe | Self::Foot | Self::Leg | Self::Hip
        )
    }
}

/// One node of an actor skeleton, pre-classified at load.
#[derive(Debug, Clone)]
pub struct SkeletonNode {
    /// The load-time classification.
    pub category: BoneCategory,
    /// World-space joint position this frame.
    pub world_pos: Vec3,
    /// Child joints.
    pub children: Vec<SkeletonNode>,
}

/// Collects bolt anchor segments from a skeleton as endpoint pairs.
///
/// Excluded categories prune the node (not the subtree); non-joints
/// prune their whole subtree. A segment under the chest is flipped so
/// bolts grow outward from the torso, and the gun segment is repeated
/// three extra times.
pub fn harvest_bone_segments(root: &SkeletonNode) -> Vec<Vec4> {
    let mut segments = Vec::new();
    walk(root, None, &mut segments);
    segments
}

fn walk(node: &SkeletonNode, parent: Option<&SkeletonNode>, out: &mut Vec<Vec4>) {
    if node.category == BoneCategory::NotAJoint {
        return;
    }

    if !node.category.excluded() {
        if let Some(parent) = parent {
            let (a, b) = if parent.category == BoneCategory::Chest {
                (node.world_pos, parent.world_pos)
            } else {
                (parent.world_pos, node.world_pos)
            };
            let a = a.extend(1.0);
            let b = b.extend(1.0);

            if node.category == BoneCategory::Gun {
                out.push(b);
                out.push(a);
                out.push(a);
                out.push(b);
                out.push(b);
                out.push(a);
            }
            out.push(a);
            out.push(b);
        }
    }

    for child in &node.children {
        walk(child, Some(node), out);
    }
}

/// Parses endpoint positions from a whitespace-separated coordinate
/// list, dropping everything at or below `y = 0.5` (points on or under
/// the ground plane would anchor bolts inside geometry).
pub fn parse_endpoints(text: &str) -> Vec<Vec4> {
    let mut endpoints = Vec::new();
    let mut values = text.split_ascii_whitespace().filter_map(|v| v.parse::<f32>().ok());
    while let (Some(x), Some(y), Some(z)) = (values.next(), values.next(), values.next()) {
        if y <= 0.5 {
            continue;
        }
        endpoints.push(Vec4::new(x, y, z, 0.0));
    }
    endpoints
}

/// Bolt count ramp over animation time.
pub fn bolt_count_for_time(animation_time_ms: f32) -> u32 {
    let count = if animation_time_ms < 2000.0 {
        1
    } else if animation_time_ms < 3000.0 {
        5
    } else if animation_time_ms < 9000.0 {
        7
    } else {
        LIGHTNING_COUNT
    };
    count.min(LIGHTNING_COUNT)
}

/// A GPU resource one pass reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResource {
    /// Bolt polyline headers and segments.
    LightningBuffer,
    /// Expanded quads plus the indirect command at offset 0.
    RenderBuffer,
    /// Static endpoint positions.
    EndpointBuffer,
    /// The deferred light list the bolts feed.
    LightsBuffer,
}

/// One node of the lightning pass graph.
#[derive(Debug, Clone)]
pub struct EffectPass {
    /// Pass name for logs.
    pub name: &'static str,
    /// Resources read.
    pub reads: &'static [PassResource],
    /// Resources written.
    pub writes: &'static [PassResource],
    /// Barrier issued before the pass runs, ordering earlier writes
    /// against this pass's reads.
    pub barrier_before: BarrierBits,
}

/// The three lightning passes with their declared hazards.
pub fn effect_passes() -> [EffectPass; 3] {
    [
        EffectPass {
            name: "simulate",
            reads: &[PassResource::EndpointBuffer],
            writes: &[PassResource::LightningBuffer, PassResource::LightsBuffer],
            barrier_before: BarrierBits::NONE,
        },
        EffectPass {
            name: "expand",
            reads: &[PassResource::LightningBuffer],
            writes: &[PassResource::RenderBuffer],
            barrier_before: BarrierBits::SHADER_STORAGE,
        },
        EffectPass {
            name: "render",
            reads: &[PassResource::RenderBuffer],
            writes: &[],
            barrier_before: BarrierBits::VERTEX_ATTRIB_ARRAY.union(BarrierBits::COMMAND),
        },
    ]
}

/// Checks that every pass reading a resource written by an earlier pass
/// declares a barrier in between.
pub fn validate_passes(passes: &[EffectPass]) -> Result<(), String> {
    for (i, pass) in passes.iter().enumerate() {
        for read in pass.reads {
            let written_earlier = passes[..i]
                .iter()
                .any(|earlier| earlier.writes.contains(read));
            if !written_earlier {
                continue;
            }
            let barrier_between = passes[..=i]
                .iter()
                .skip_while(|p| !p.writes.contains(read))
                .skip(1)
                .any(|p| !p.barrier_before.is_empty());
            if !barrier_between {
                return Err(format!(
                    "pass '{}' reads {:?} without a barrier after its writer",
                    pass.name, read
                ));
            }
        }
    }
    Ok(())
}

/// The compute lightning effect.
#[derive(Debug)]
pub struct ComputeLightning {
    inited: bool,
    lightning_count: u32,

    vao: Option<VertexArrayId>,
    render_buffer: Option<BufferId>,
    lightning_buffer: Option<BufferId>,
    endpoint_buffer: Option<BufferId>,
    lights_buffer: Option<BufferId>,
    noise_texture: Option<TextureId>,

    shader_simulate: Option<ShaderId>,
    shader_expand: Option<ShaderId>,
    shader_render: Option<ShaderId>,

    endpoints: Vec<Vec4>,
    ground_endpoint_offset: usize,
    sky_endpoint_offset: usize,
    bone_segments: Vec<Vec4>,
}

/// Input sources for [`ComputeLightning::init`]; any may be absent.
#[derive(Debug, Default)]
pub struct LightningSources {
    /// Pole endpoint file content.
    pub pole_endpoints: Option<String>,
    /// Sky endpoint file content.
    pub sky_endpoints: Option<String>,
    /// Upward endpoint file content.
    pub up_endpoints: Option<String>,
    /// The three pass shaders, pre-linked by the caller.
    pub shaders: Option<(ShaderId, ShaderId, ShaderId)>,
    /// Noise texture sampled by the simulate pass.
    pub noise_texture: Option<TextureId>,
}

impl ComputeLightning {
    /// Creates the effect in its uninitialized state.
    pub fn new() -> Self {
        Self {
            inited: false,
            lightning_count: 0,
            vao: None,
            render_buffer: None,
            lightning_buffer: None,
            endpoint_buffer: None,
            lights_buffer: None,
            noise_texture: None,
            shader_simulate: None,
            shader_expand: None,
            shader_render: None,
            endpoints: Vec::new(),
            ground_endpoint_offset: 0,
            sky_endpoint_offset: 0,
            bone_segments: Vec::new(),
        }
    }

    /// Builds the GPU resources. Missing inputs log and leave the
    /// effect uninitialized; the run continues without lightning.
    pub fn init(
        &mut self,
        device: &mut dyn GraphicsDevice,
        lights_buffer: BufferId,
        sources: LightningSources,
    ) {
        self.lights_buffer = Some(lights_buffer);

        for (name, content) in [
            ("pole endpoints", &sources.pole_endpoints),
            ("sky endpoints", &sources.sky_endpoints),
            ("up endpoints", &sources.up_endpoints),
        ] {
            match content {
                Some(text) => {
                    self.endpoints.extend(parse_endpoints(text));
                }
                None => warn!("ComputeLightning: {name} missing"),
            }
            if name == "pole endpoints" {
                self.ground_endpoint_offset = self.endpoints.len();
            } else if name == "sky endpoints" {
                self.sky_endpoint_offset = self.endpoints.len();
            }
        }

        if self.endpoints.is_empty() {
            error!("ComputeLightning: no endpoints loaded, effect disabled");
            return;
        }
        let Some((simulate, expand, render)) = sources.shaders else {
            error!("ComputeLightning: shaders missing, effect disabled");
            return;
        };

        let render_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("lightning-render".into()),
            size: RENDER_BUFFER_SIZE * 16 + INDIRECT_COMMAND_SIZE,
            usage: BufferUsage::Storage,
            access: BufferAccess::Dynamic,
        });
        let lightning_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("lightning-headers".into()),
            size: HEADER_FLOATS * 4 + LIGHTNING_COUNT as usize * LIGHTNING_BUFFER_SIZE * 16,
            usage: BufferUsage::Storage,
            access: BufferAccess::Dynamic,
        });
        let endpoint_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("lightning-endpoints".into()),
            size: self.endpoints.len() * 16,
            usage: BufferUsage::Storage,
            access: BufferAccess::Static,
        });

        let (Ok(render_buffer), Ok(lightning_buffer), Ok(endpoint_buffer)) =
            (render_buffer, lightning_buffer, endpoint_buffer)
        else {
            error!("ComputeLightning: buffer allocation failed, effect disabled");
            return;
        };

        // Zeroed headers so frame one sees empty bolts.
        device.write_buffer(lightning_buffer, 0, &vec![0u8; HEADER_FLOATS * 4]);
        device.write_buffer(endpoint_buffer, 0, bytemuck::cast_slice(&self.endpoints));

        let vao = device.create_vertex_array(&VertexArrayDescriptor {
            label: Some("lightning-vao".into()),
            layouts: vec![VertexBufferLayout {
                buffer: render_buffer,
                base_offset: INDIRECT_COMMAND_SIZE as u32,
                stride: 32,
                attributes: vec![
                    VertexAttribute {
                        location: 0,
                        format: VertexFormat::Float32x4,
                        offset: 0,
                        divisor: 0,
                    },
                    VertexAttribute {
                        location: 1,
                        format: VertexFormat::Float32x4,
                        offset: 16,
                        divisor: 0,
                    },
                ],
            }],
            index_buffer: None,
        });
        let Ok(vao) = vao else {
            error!("ComputeLightning: vertex array creation failed, effect disabled");
            return;
        };

        self.render_buffer = Some(render_buffer);
        self.lightning_buffer = Some(lightning_buffer);
        self.endpoint_buffer = Some(endpoint_buffer);
        self.vao = Some(vao);
        self.shader_simulate = Some(simulate);
        self.shader_expand = Some(expand);
        self.shader_render = Some(render);
        self.noise_texture = sources.noise_texture;
        self.inited = true;
    }

    /// Whether init succeeded; every pass gates on this.
    pub fn is_inited(&self) -> bool {
        self.inited
    }

    /// Deferred lights contributed this frame: two per bolt (one at
    /// each end of the arc).
    pub fn light_count(&self) -> u32 {
        self.lightning_count * 2
    }

    /// Bolt anchor segments harvested for the current frame.
    pub fn bone_segments(&self) -> &[Vec4] {
        &self.bone_segments
    }

    /// Pass 1: grow bolts between the actor and the endpoint cloud.
    pub fn simulate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        animation_time_ms: f32,
        actor_world: Mat4,
        skeleton: &SkeletonNode,
        stats: &mut RenderStats,
    ) {
        if !self.inited {
            return;
        }

        self.lightning_count = bolt_count_for_time(animation_time_ms);

        let actor_pos = actor_world.translation();
        // Model-space Z points to the actor's right.
        let actor_right =
            actor_world.transform_point(Vec3::new(0.0, 0.0, 42.0)) - actor_pos;

        self.bone_segments = harvest_bone_segments(skeleton);

        let (Some(shader), Some(lightning), Some(endpoints), Some(lights)) = (
            self.shader_simulate,
            self.lightning_buffer,
            self.endpoint_buffer,
            self.lights_buffer,
        ) else {
            return;
        };

        let passes = effect_passes();
        device.bind_shader(shader);
        if !passes[0].barrier_before.is_empty() {
            device.memory_barrier(passes[0].barrier_before);
        }

        if let Some(location) = device.uniform_location(shader, "animation_time") {
            device.set_uniform(location, UniformValue::Float(animation_time_ms));
        }
        if let Some(location) = device.uniform_location(shader, "actor_pos") {
            device.set_uniform(location, UniformValue::Vec3(actor_pos));
        }
        if let Some(location) = device.uniform_location(shader, "actor_right") {
            device.set_uniform(location, UniformValue::Vec3(actor_right));
        }
        if let Some(location) = device.uniform_location(shader, "bone_segment_count") {
            device.set_uniform(
                location,
                UniformValue::Int((self.bone_segments.len() / 2) as i32),
            );
        }
        if let Some(location) = device.uniform_location(shader, "bone_segments") {
            device.set_uniform(location, UniformValue::Vec4Array(&self.bone_segments));
        }

        device.bind_storage_buffer(0, lightning);
        device.bind_storage_buffer(1, endpoints);
        device.bind_storage_buffer(2, lights);
        if let Some(noise) = self.noise_texture {
            device.bind_texture(0, noise, None);
        }

        device.dispatch_compute(self.lightning_count, 1, 1);
        stats.record_dispatch();
    }

    /// Pass 2 and 3: expand polylines into quads, then draw them with
    /// the GPU-written indirect command.
    pub fn draw(
        &mut self,
        device: &mut dyn GraphicsDevice,
        view_projection: Mat4,
        stats: &mut RenderStats,
    ) {
        if !self.inited {
            return;
        }

        let (Some(expand), Some(render_shader), Some(vao), Some(lightning), Some(render_buffer)) = (
            self.shader_expand,
            self.shader_render,
            self.vao,
            self.lightning_buffer,
            self.render_buffer,
        ) else {
            return;
        };

        let passes = effect_passes();
        device.bind_shader(expand);
        if let Some(location) = device.uniform_location(expand, "lightning_count") {
            device.set_uniform(location, UniformValue::Int(self.lightning_count as i32));
        }
        if let Some(location) = device.uniform_location(expand, "mvp") {
            device.set_uniform(location, UniformValue::Mat4(view_projection));
        }
        device.bind_storage_buffer(0, lightning);
        device.bind_storage_buffer(1, render_buffer);

        device.memory_barrier(passes[1].barrier_before);
        device.dispatch_compute(self.lightning_count, 1, 1);
        stats.record_dispatch();

        device.bind_shader(render_shader);
        device.bind_vertex_array(vao);

        device.memory_barrier(passes[2].barrier_before);
        device.set_depth_state(true, false, CompareFunction::LessEqual);
        device.draw_arrays_indirect(PrimitiveTopology::TriangleList, render_buffer, 0);
        // Vertex counts live in the GPU-written command; only the call
        // itself is counted.
        stats.record_draw(RenderStage::LightningRender, 0, 0);
        device.set_depth_state(true, true, CompareFunction::LessEqual);
    }
}

impl Default for ComputeLightning {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint(name: &str, pos: Vec3, children: Vec<SkeletonNode>) -> SkeletonNode {
        SkeletonNode {
            category: BoneCategory::from_name(name),
            world_pos: pos,
            children,
        }
    }

    #[test]
    fn bolt_ramp_follows_animation_time() {
        assert_eq!(bolt_count_for_time(0.0), 1);
        assert_eq!(bolt_count_for_time(1999.0), 1);
        assert_eq!(bolt_count_for_time(2000.0), 5);
        assert_eq!(bolt_count_for_time(2999.0), 5);
        assert_eq!(bolt_count_for_time(3000.0), 7);
        assert_eq!(bolt_count_for_time(8999.0), 7);
        assert_eq!(bolt_count_for_time(9000.0), 9);
        assert_eq!(bolt_count_for_time(1.0e9), LIGHTNING_COUNT);
    }

    #[test]
    fn endpoint_parsing_filters_low_points() {
        let text = "1.0 2.0 3.0\n4.0 0.4 5.0\n6.0 0.6 7.0";
        let pts = parse_endpoints(text);
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0], Vec4::new(1.0, 2.0, 3.0, 0.0));
        assert_eq!(pts[1], Vec4::new(6.0, 0.6, 7.0, 0.0));
    }

    #[test]
    fn harvest_excludes_limbs_and_non_joints() {
        let root = joint(
            "spine_jnt",
            Vec3::ZERO,
            vec![
                joint("leg_L_jnt", Vec3::X, vec![]),
                joint("arm_R_jnt", Vec3::Y, vec![]),
                joint("prop_mesh", Vec3::Z, vec![joint("arm_L_jnt", Vec3::Z, vec![])]),
            ],
        );
        let segments = harvest_bone_segments(&root);
        // Only the arm contributes: leg is excluded, the prop subtree
        // is pruned entirely.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Vec3::ZERO.extend(1.0));
        assert_eq!(segments[1], Vec3::Y.extend(1.0));
    }

    #[test]
    fn excluded_bone_does_not_prune_subtree() {
        let root = joint(
            "spine_jnt",
            Vec3::ZERO,
            vec![joint(
                "hip_jnt",
                Vec3::X,
                vec![joint("arm_R_jnt", Vec3::Y, vec![])],
            )],
        );
        let segments = harvest_bone_segments(&root);
        // The hip itself contributes nothing, but its child still
        // produces a segment back to the hip.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Vec3::X.extend(1.0));
        assert_eq!(segments[1], Vec3::Y.extend(1.0));
    }

    #[test]
    fn gun_segment_is_pushed_four_times() {
        let root = joint(
            "arm_R_jnt",
            Vec3::ZERO,
            vec![joint("gun_jnt", Vec3::X, vec![])],
        );
        let segments = harvest_bone_segments(&root);
        assert_eq!(segments.len(), 8);
    }

    #[test]
    fn chest_child_segment_is_flipped() {
        let root = joint(
            "chest_jnt",
            Vec3::X,
            vec![joint("neck_jnt", Vec3::Y, vec![])],
        );
        let segments = harvest_bone_segments(&root);
        assert_eq!(segments[0], Vec3::Y.extend(1.0));
        assert_eq!(segments[1], Vec3::X.extend(1.0));
    }

    #[test]
    fn pass_graph_has_no_unbarriered_hazard() {
        validate_passes(&effect_passes()).unwrap();
    }

    #[test]
    fn missing_barrier_is_detected() {
        let mut passes = effect_passes().to_vec();
        passes[1].barrier_before = BarrierBits::NONE;
        passes[2].barrier_before = BarrierBits::NONE;
        assert!(validate_passes(&passes).is_err());
    }

    #[test]
    fn uninitialized_effect_reports_zero_lights() {
        let effect = ComputeLightning::new();
        assert!(!effect.is_inited());
        assert_eq!(effect.light_count(), 0);
    }
}
