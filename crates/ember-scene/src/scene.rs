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

//! The deferred render orchestrator.
//!
//! One frame runs a fixed stage pipeline:
//!
//! > shadow depth → planar reflection → G-buffer solids → particle
//! > advect → lightning simulate → lens flare queries → lighting → sky
//! > → reflection combine → shadow decal blend → decals → lightning
//! > render → particle render → light shafts → transparents → lens
//! > flare draw → post
//!
//! Every stage can be masked off through `disabled_render_bits`, and
//! stages whose hardware requirement the backend lacks are skipped via
//! the capability table rather than per-API subclassing. The frame is
//! split in two phases: a prepare phase writes every uniform block the
//! frame will need and uploads the pool once, then the draw phases only
//! bind ranges and issue draws.
//!
//! Per-frame device calls are never error-checked here: a degraded
//! frame beats an aborted benchmark run. Shader reloads are the
//! exception and propagate compile errors to the harness.

use ember_core::math::{LinearRgba, Mat4, Plane, Vec2, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, RenderError, ShaderError};
use log::{debug, info};

use crate::filter::{BlurDirection, Filter, FilterDescriptor};
use crate::light::{Light, LightKind};
use crate::lightning::{ComputeLightning, LightningSources, SkeletonNode};
use crate::material::{Material, MeshKind, PassBank};
use crate::mesh::{collect_batches, Mesh};
use crate::particles::{Emitter, ParticleKind, SubstepRange, MAX_SUBSTEPS};
use crate::texture::SamplerCache;
use crate::ubo::{
    slots, CameraContext, UboCamera, UboEmitterAdvect, UboEmitterRender,
    UboEnvmapInterpolator, UboFilter, UboFrame, UboHandle, UboLensFlare, UboLightShaft,
    UboManager,
};

/// A view into the scene: the matrices and derived constants one camera
/// contributes to the frame.
#[derive(Debug, Clone, Copy)]
pub struct SceneCamera {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// Camera position.
    pub eye: Vec3,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// Depth-of-field focus distance, 0 to disable.
    pub focus_distance: f32,
}

impl SceneCamera {
    /// An identity camera with sane clip distances.
    pub fn identity() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye: Vec3::ZERO,
            near: 0.1,
            far: 1000.0,
            focus_distance: 0.0,
        }
    }

    /// The combined view-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View direction: negative view-space Z in world space.
    pub fn view_dir(&self) -> Vec3 {
        Vec3::new(-self.view.cols[0].z, -self.view.cols[1].z, -self.view.cols[2].z)
            .normalize_or_zero()
    }

    /// Depth linearization factors consumed by the deferred shaders.
    pub fn depth_parameters(&self) -> Vec4 {
        let q = self.far / (self.far - self.near).max(1.0e-6);
        Vec4::new(q, -q * self.near, self.near, self.far)
    }

    /// The camera's near plane in world space, the transparent sort key.
    pub fn near_plane(&self) -> Plane {
        let dir = self.view_dir();
        Plane::new(dir, -dir.dot(self.eye) - self.near)
    }

    /// The camera constant block.
    pub fn camera_block(&self, inv_resolution: Vec2, normalized_time: f32) -> UboCamera {
        UboCamera {
            depth_parameters: self.depth_parameters(),
            view_dir: self.view_dir().extend(0.0),
            view_pos_time: self.eye.extend(normalized_time),
            inv_resolution: Vec4::new(inv_resolution.x, inv_resolution.y, 0.0, 0.0),
            view_projection: self.view_projection(),
        }
    }
}

/// The scene content the orchestrator renders. Loading, animation, and
/// visibility culling happen outside; the renderer consumes the visible
/// index lists as given.
#[derive(Debug)]
pub struct Scene {
    /// All mesh instances.
    pub meshes: Vec<Mesh>,
    /// The material registry meshes index into.
    pub materials: Vec<Material>,
    /// All lights.
    pub lights: Vec<Light>,
    /// Particle emitters.
    pub emitters: Vec<Emitter>,

    /// Visible opaque meshes, G-buffer bound.
    pub solids: Vec<usize>,
    /// Visible transparent meshes, sorted at draw time.
    pub transparents: Vec<usize>,
    /// Visible decal meshes.
    pub decals: Vec<usize>,
    /// Meshes receiving the planar reflection.
    pub reflection_receivers: Vec<usize>,
    /// The sky dome mesh, if the scene has one.
    pub sky_mesh: Option<usize>,

    /// The lightning actor: world transform plus pre-classified skeleton.
    pub actor: Option<(Mat4, SkeletonNode)>,

    /// The main camera.
    pub camera: SceneCamera,
    /// The shadow-map camera.
    pub shadow_camera: SceneCamera,

    /// Scene time in milliseconds.
    pub time_ms: u32,
    /// Frame delta in seconds.
    pub dt_sec: f32,
    /// Animation time in milliseconds (drives the lightning ramp).
    pub animation_time_ms: f32,
    /// Blend factor between the two nearest environment probes.
    pub envmap_blend: f32,
}

impl Scene {
    /// Creates an empty scene with identity cameras.
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            materials: Vec::new(),
            lights: Vec::new(),
            emitters: Vec::new(),
            solids: Vec::new(),
            transparents: Vec::new(),
            decals: Vec::new(),
            reflection_receivers: Vec::new(),
            sky_mesh: None,
            actor: None,
            camera: SceneCamera::identity(),
            shadow_camera: SceneCamera::identity(),
            time_ms: 0,
            dt_sec: 0.0,
            animation_time_ms: 0.0,
            envmap_blend: 0.0,
        }
    }

    /// Visible meshes that render into the shadow map.
    pub fn shadow_casters(&self) -> impl Iterator<Item = usize> + '_ {
        self.solids
            .iter()
            .copied()
            .filter(|&i| self.meshes[i].casts_shadows)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit per-frame render state threaded through the pass functions.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    /// When set, passes that would target the HDR scene buffer render
    /// to the default framebuffer instead. Raised when the post chain
    /// is disabled and nothing would otherwise reach the screen.
    pub force_screen_render: bool,
    /// Render resolution.
    pub width: u32,
    /// Render resolution.
    pub height: u32,
}

/// Creation parameters of the renderer.
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Shadow map edge length in texels.
    pub shadow_map_size: u32,
    /// Bloom pyramid depth; 0 disables bloom.
    pub bloom_levels: u32,
    /// Whether the depth-of-field pass runs.
    pub enable_dof: bool,
    /// Requested multisample count, 1 to disable.
    pub fsaa: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            shadow_map_size: 1024,
            bloom_levels: 4,
            enable_dof: false,
            fsaa: 1,
        }
    }
}

/// Source descriptors for every program the pipeline links. The
/// harness fills these from its asset pack; defaults carry labels only
/// so the null backend can link a complete set.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    /// G-buffer attribute output.
    pub gbuffer: ShaderDescriptor,
    /// Shadow-map depth only.
    pub shadow_depth: ShaderDescriptor,
    /// Full-screen directional light.
    pub lighting_directional: ShaderDescriptor,
    /// Omni light volume.
    pub lighting_omni: ShaderDescriptor,
    /// Spot light volume.
    pub lighting_spot: ShaderDescriptor,
    /// Projected blob shadow volume.
    pub shadow_decal: ShaderDescriptor,
    /// Sky dome.
    pub sky: ShaderDescriptor,
    /// Forward transparents and decals.
    pub forward: ShaderDescriptor,
    /// Planar reflection color.
    pub reflection: ShaderDescriptor,
    /// Reflection/emission composite.
    pub reflection_combine: ShaderDescriptor,
    /// Particle advection (transform feedback, no fragment stage).
    pub particle_advect: ShaderDescriptor,
    /// Instanced particle billboards.
    pub particle_render: ShaderDescriptor,
    /// Radial light shafts.
    pub light_shaft: ShaderDescriptor,
    /// Lens flare sprite.
    pub lens_flare: ShaderDescriptor,
    /// One-point occlusion probe.
    pub occlusion_point: ShaderDescriptor,
    /// Separable gaussian blur.
    pub blur: ShaderDescriptor,
    /// HDR tone-map combine.
    pub combine: ShaderDescriptor,
    /// Depth of field.
    pub dof: ShaderDescriptor,
    /// Lightning bolt growth (compute).
    pub lightning_simulate: ShaderDescriptor,
    /// Lightning quad expansion (compute).
    pub lightning_expand: ShaderDescriptor,
    /// Lightning indirect draw.
    pub lightning_render: ShaderDescriptor,
}

fn labeled(label: &'static str) -> ShaderDescriptor {
    ShaderDescriptor {
        label: Some(label.into()),
        ..ShaderDescriptor::default()
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        let mut particle_advect = labeled("particle_advect");
        particle_advect.transform_feedback_varyings = [
            "out_position",
            "out_age",
            "out_amplitude",
            "out_phase",
            "out_frequency",
            "out_tangent",
            "out_bitangent",
            "out_normal",
            "out_velocity",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self {
            gbuffer: labeled("gbuffer"),
            shadow_depth: labeled("shadow_depth"),
            lighting_directional: labeled("lighting_directional"),
            lighting_omni: labeled("lighting_omni"),
            lighting_spot: labeled("lighting_spot"),
            shadow_decal: labeled("shadow_decal"),
            sky: labeled("sky"),
            forward: labeled("forward"),
            reflection: labeled("reflection"),
            reflection_combine: labeled("reflection_combine"),
            particle_advect,
            particle_render: labeled("particle_render"),
            light_shaft: labeled("light_shaft"),
            lens_flare: labeled("lens_flare"),
            occlusion_point: labeled("occlusion_point"),
            blur: labeled("blur"),
            combine: labeled("combine"),
            dof: labeled("dof"),
            lightning_simulate: labeled("lightning_simulate"),
            lightning_expand: labeled("lightning_expand"),
            lightning_render: labeled("lightning_render"),
        }
    }
}

/// Linked programs of the pipeline.
#[derive(Debug, Clone, Copy)]
struct ShaderSet {
    gbuffer: ShaderId,
    shadow_depth: ShaderId,
    lighting_directional: ShaderId,
    lighting_omni: ShaderId,
    lighting_spot: ShaderId,
    shadow_decal: ShaderId,
    sky: ShaderId,
    forward: ShaderId,
    reflection: ShaderId,
    particle_advect: ShaderId,
    particle_render: ShaderId,
    light_shaft: ShaderId,
    lens_flare: ShaderId,
    occlusion_point: ShaderId,
    lightning_simulate: ShaderId,
    lightning_expand: ShaderId,
    lightning_render: ShaderId,
}

#[derive(Debug, Clone, Copy)]
struct GBuffer {
    color: TextureId,
    normal: TextureId,
    params: TextureId,
    depth: TextureId,
    target: RenderTargetId,
}

#[derive(Debug, Clone, Copy)]
struct HdrTarget {
    color: TextureId,
    target: RenderTargetId,
}

#[derive(Debug, Clone, Copy)]
struct ShadowMap {
    depth: TextureId,
    target: RenderTargetId,
    size: u32,
}

#[derive(Debug, Clone, Copy)]
struct LightVolume {
    vertex_array: VertexArrayId,
    index_count: u32,
}

/// The per-frame render pipeline.
pub struct SceneRenderer {
    config: RendererConfig,
    caps: BackendCapabilities,
    disabled_render_bits: RenderBits,

    ubo: UboManager,
    /// Deduplicated sampler objects for the scene's textures.
    pub samplers: SamplerCache,
    stats: RenderStats,

    quad_vao: VertexArrayId,
    point_vbo: BufferId,
    point_vao: VertexArrayId,
    sphere_volume: LightVolume,
    cone_volume: LightVolume,

    gbuffer: GBuffer,
    hdr: HdrTarget,
    shadow: ShadowMap,
    planar: HdrTarget,

    bloom_h: Filter,
    bloom_v: Filter,
    reflect_combine: Filter,
    dof: Option<Filter>,
    tonemap: Filter,

    /// The compute lightning effect, soft-failing when unavailable.
    pub lightning: ComputeLightning,
    lightning_lights: BufferId,

    shaders: Option<ShaderSet>,
    envmap_handle: Option<UboHandle>,
    transparent_order: Vec<usize>,
    frame_index: u64,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("config", &self.config)
            .field("disabled_render_bits", &self.disabled_render_bits)
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl SceneRenderer {
    /// Builds the pipeline's GPU resources. Shaders are loaded
    /// separately through [`Self::reload_shaders`].
    pub fn new(
        device: &mut dyn GraphicsDevice,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        let limits = device.limits();
        if config.fsaa > limits.max_samples {
            return Err(RenderError::FsaaUnsupported {
                requested: config.fsaa,
            });
        }
        let caps = device.capabilities();
        info!(
            "SceneRenderer: {}x{} shadow {} bloom {} caps {caps:?}",
            config.width, config.height, config.shadow_map_size, config.bloom_levels
        );

        let quad_vao = create_quad(device)?;
        let (point_vbo, point_vao) = create_point(device)?;
        let sphere_volume = create_sphere_volume(device, 12, 8)?;
        let cone_volume = create_cone_volume(device, 16)?;

        let gbuffer = create_gbuffer(device, config.width, config.height)?;
        let hdr = create_hdr_target(device, config.width, config.height, gbuffer.depth)?;
        let shadow = create_shadow_map(device, config.shadow_map_size)?;
        let planar = create_planar_target(device, config.width / 2, config.height / 2)?;

        let bloom_levels = config.bloom_levels.max(1);
        let bloom_h = Filter::new(
            device,
            &FilterDescriptor {
                width: config.width / 2,
                height: config.height / 2,
                onscreen: false,
                max_mip_count: bloom_levels,
                direction: Some(BlurDirection::Horizontal),
                format: TextureFormat::Rgba16Float,
                depth_attachment: None,
            },
        )?;
        let bloom_v = Filter::new(
            device,
            &FilterDescriptor {
                width: config.width / 2,
                height: config.height / 2,
                onscreen: false,
                max_mip_count: bloom_levels,
                direction: Some(BlurDirection::Vertical),
                format: TextureFormat::Rgba16Float,
                depth_attachment: None,
            },
        )?;
        let reflect_combine = Filter::new(
            device,
            &FilterDescriptor {
                width: config.width,
                height: config.height,
                onscreen: false,
                max_mip_count: 1,
                direction: None,
                format: TextureFormat::Rgba16Float,
                depth_attachment: None,
            },
        )?;
        let dof = if config.enable_dof {
            Some(Filter::new(
                device,
                &FilterDescriptor {
                    width: config.width,
                    height: config.height,
                    onscreen: false,
                    max_mip_count: 1,
                    direction: None,
                    format: TextureFormat::Rgba16Float,
                    depth_attachment: None,
                },
            )?)
        } else {
            None
        };
        let tonemap = Filter::new(
            device,
            &FilterDescriptor {
                width: config.width,
                height: config.height,
                onscreen: true,
                max_mip_count: 1,
                direction: None,
                format: TextureFormat::Rgba8Unorm,
                depth_attachment: None,
            },
        )?;

        let lightning_lights = device
            .create_buffer(&BufferDescriptor {
                label: Some("lightning-lights".into()),
                size: 2 * crate::lightning::LIGHTNING_COUNT as usize * 32,
                usage: BufferUsage::Storage,
                access: BufferAccess::Dynamic,
            })
            .map_err(RenderError::from)?;

        let ubo = UboManager::new(device);

        Ok(Self {
            config,
            caps,
            disabled_render_bits: RenderBits::NONE,
            ubo,
            samplers: SamplerCache::new(),
            stats: RenderStats::default(),
            quad_vao,
            point_vbo,
            point_vao,
            sphere_volume,
            cone_volume,
            gbuffer,
            hdr,
            shadow,
            planar,
            bloom_h,
            bloom_v,
            reflect_combine,
            dof,
            tonemap,
            lightning: ComputeLightning::new(),
            lightning_lights,
            shaders: None,
            envmap_handle: None,
            transparent_order: Vec::new(),
            frame_index: 0,
        })
    }

    /// Masks pipeline stages off; bits set here are skipped each frame.
    pub fn set_disabled_render_bits(&mut self, bits: RenderBits) {
        self.disabled_render_bits = bits;
    }

    /// The buffer the lightning simulation appends deferred lights to.
    pub fn lightning_lights_buffer(&self) -> BufferId {
        self.lightning_lights
    }

    /// Frames rendered since creation.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Initializes the lightning effect from its asset sources. Missing
    /// sources disable the effect; the run continues without it.
    pub fn init_lightning(&mut self, device: &mut dyn GraphicsDevice, sources: LightningSources) {
        self.lightning.init(device, self.lightning_lights, sources);
    }

    /// Statistics of the last rendered frame.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Compiles and links every pipeline program, then re-resolves the
    /// filter uniforms. Compile and link failures propagate; the caller
    /// turns them into a failed-test result.
    pub fn reload_shaders(
        &mut self,
        device: &mut dyn GraphicsDevice,
        sources: &ShaderSources,
    ) -> Result<(), ShaderError> {
        let set = ShaderSet {
            gbuffer: device.create_shader(&sources.gbuffer)?,
            shadow_depth: device.create_shader(&sources.shadow_depth)?,
            lighting_directional: device.create_shader(&sources.lighting_directional)?,
            lighting_omni: device.create_shader(&sources.lighting_omni)?,
            lighting_spot: device.create_shader(&sources.lighting_spot)?,
            shadow_decal: device.create_shader(&sources.shadow_decal)?,
            sky: device.create_shader(&sources.sky)?,
            forward: device.create_shader(&sources.forward)?,
            reflection: device.create_shader(&sources.reflection)?,
            particle_advect: device.create_shader(&sources.particle_advect)?,
            particle_render: device.create_shader(&sources.particle_render)?,
            light_shaft: device.create_shader(&sources.light_shaft)?,
            lens_flare: device.create_shader(&sources.lens_flare)?,
            occlusion_point: device.create_shader(&sources.occlusion_point)?,
            lightning_simulate: device.create_shader(&sources.lightning_simulate)?,
            lightning_expand: device.create_shader(&sources.lightning_expand)?,
            lightning_render: device.create_shader(&sources.lightning_render)?,
        };

        let blur = device.create_shader(&sources.blur)?;
        let combine = device.create_shader(&sources.combine)?;
        self.bloom_h.set_shader(device, blur);
        self.bloom_v.set_shader(device, blur);
        let reflection_combine = device.create_shader(&sources.reflection_combine)?;
        self.reflect_combine.set_shader(device, reflection_combine);
        if let Some(dof) = &mut self.dof {
            let shader = device.create_shader(&sources.dof)?;
            dof.set_shader(device, shader);
        }
        self.tonemap.set_shader(device, combine);

        self.shaders = Some(set);
        debug!("SceneRenderer: shader set reloaded");
        Ok(())
    }

    /// Pre-walks the scene once: material blocks into static buffers,
    /// pass programs onto materials, query rings onto flare lights, and
    /// the dynamic pool sized ahead of the first frame.
    pub fn precache(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        let blocks: Vec<_> = scene.materials.iter().map(|m| m.material_block()).collect();
        let binds = self.ubo.precache_materials(device, &blocks);
        for (material, bind) in scene.materials.iter_mut().zip(binds) {
            material.static_bind = Some(bind);
        }

        if let Some(set) = self.shaders {
            for material in &mut scene.materials {
                material.set_pass_shader(PassBank::GBuffer, set.gbuffer);
                material.set_pass_shader(PassBank::ShadowDepth, set.shadow_depth);
                material.set_pass_shader(PassBank::Forward, set.forward);
                material.set_pass_shader(PassBank::Reflection, set.reflection);
            }
        }

        for light in &mut scene.lights {
            if light.has_lens_flare {
                // A light without its ring simply never draws a flare.
                let _ = light.create_queries(device);
            }
        }

        self.ubo.preallocate(device);
    }

    /// The lightning pass shaders, available after a successful reload.
    pub fn lightning_shaders(&self) -> Option<(ShaderId, ShaderId, ShaderId)> {
        self.shaders.map(|s| {
            (
                s.lightning_simulate,
                s.lightning_expand,
                s.lightning_render,
            )
        })
    }

    fn stage_on(&self, stage: RenderStage, bit: RenderBits) -> bool {
        !self.disabled_render_bits.contains(bit) && self.caps.supports_stage(stage)
    }

    /// Renders one frame of the scene. Stages run in fixed order; the
    /// disabled-bits mask and the capability table decide which execute.
    pub fn render_frame(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        let Some(shaders) = self.shaders else {
            return;
        };
        self.stats.reset();
        for mesh in &mut scene.meshes {
            mesh.rendered = false;
        }

        let ctx = RenderContext {
            force_screen_render: self.disabled_render_bits.contains(RenderBits::POST),
            width: self.config.width,
            height: self.config.height,
        };

        self.prepare_frame(device, scene);

        if self.stage_on(RenderStage::ShadowDepth, RenderBits::SHADOW_DEPTH) {
            self.shadow_pass(device, scene, shaders);
        }
        if self.stage_on(RenderStage::PlanarReflection, RenderBits::PLANAR_REFLECTION) {
            self.planar_pass(device, scene);
        }
        if self.stage_on(RenderStage::GBufferSolids, RenderBits::GBUFFER_SOLIDS) {
            self.gbuffer_pass(device, scene);
        }
        // Later forward passes depth-test against the G-buffer depth; when
        // the post chain is off they draw to the default framebuffer, so
        // the depth has to be carried over explicitly.
        if ctx.force_screen_render {
            device.blit_depth(Some(self.gbuffer.target), None, ctx.width, ctx.height);
        }
        if self.stage_on(RenderStage::ParticleAdvect, RenderBits::PARTICLES) {
            self.advect_particles(device, scene, shaders);
        } else {
            // Buffers still swap on skipped advection so the ping-pong
            // phase stays aligned with the frame counter.
            for emitter in &mut scene.emitters {
                emitter.switch_buffers();
            }
        }
        if self.stage_on(RenderStage::LightningSimulate, RenderBits::COMPUTE_LIGHTNING) {
            if let Some((actor_world, skeleton)) = scene.actor.take() {
                self.lightning.simulate(
                    device,
                    scene.animation_time_ms,
                    actor_world,
                    &skeleton,
                    &mut self.stats,
                );
                scene.actor = Some((actor_world, skeleton));
            }
        }
        if self.stage_on(RenderStage::LensFlareQuery, RenderBits::LENS_FLARE_QUERY) {
            self.lens_flare_query_pass(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::Lighting, RenderBits::LIGHTING) {
            self.lighting_pass(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::Sky, RenderBits::SKY) {
            self.sky_pass(device, scene, shaders, &ctx);
        }
        if !scene.reflection_receivers.is_empty()
            && self.stage_on(
                RenderStage::ReflectionEmissionCombine,
                RenderBits::PLANAR_REFLECTION,
            )
        {
            self.reflect_combine.set_input(0, self.hdr.color, None);
            self.reflect_combine.set_input(1, self.planar.color, None);
            self.reflect_combine.render(
                device,
                &self.ubo,
                self.quad_vao,
                &mut self.stats,
                RenderStage::ReflectionEmissionCombine,
            );
        }
        // The blob shadow blend reads the shadow map; without the depth
        // pass it would sample garbage, so both bits gate it.
        if self.stage_on(RenderStage::ShadowDecalBlend, RenderBits::SHADOW_DECAL)
            && !self.disabled_render_bits.contains(RenderBits::SHADOW_DEPTH)
        {
            self.shadow_decal_pass(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::Decals, RenderBits::DECALS) {
            let decals = scene.decals.clone();
            self.forward_mesh_pass(
                device,
                scene,
                &decals,
                RenderStage::Decals,
                BlendMode::Alpha,
                &ctx,
            );
        }
        if self.stage_on(RenderStage::LightningRender, RenderBits::COMPUTE_LIGHTNING) {
            let vp = scene.camera.view_projection();
            self.lightning.draw(device, vp, &mut self.stats);
        }
        if self.stage_on(RenderStage::ParticleRender, RenderBits::PARTICLES) {
            self.render_particles(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::LightShafts, RenderBits::LIGHT_SHAFTS) {
            self.light_shaft_pass(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::Transparents, RenderBits::TRANSPARENTS) {
            let near_plane = scene.camera.near_plane();
            let mut order = std::mem::take(&mut self.transparent_order);
            sort_transparents(scene, &mut order, &near_plane);
            self.forward_mesh_pass(
                device,
                scene,
                &order,
                RenderStage::Transparents,
                BlendMode::Alpha,
                &ctx,
            );
            self.transparent_order = order;
        }
        if self.stage_on(RenderStage::LensFlareDraw, RenderBits::LENS_FLARES)
            && !self
                .disabled_render_bits
                .contains(RenderBits::LENS_FLARE_QUERY)
        {
            self.lens_flare_draw_pass(device, scene, shaders, &ctx);
        }
        if self.stage_on(RenderStage::Post, RenderBits::POST) {
            self.post_pass(device, scene);
        }

        device.bind_render_target(None);
        self.frame_index += 1;
    }

    /// Phase one: write every constant block the frame needs and flush
    /// the pool to the GPU once, before any draw binds a range.
    fn prepare_frame(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        self.ubo.begin_frame();

        let time_sec = scene.time_ms as f32 / 1000.0;
        self.ubo.set_frame(&UboFrame {
            shadow_matrix: scene.shadow_camera.view_projection(),
            time_dt: Vec4::new(time_sec, scene.dt_sec, 0.0, 0.0),
            tone_abcd: Vec4::new(0.22, 0.30, 0.10, 0.20),
            tone_efw_tau: Vec4::new(0.01, 0.30, 11.2, 1.25),
            exposure_bloom_white: Vec4::new(1.0, 1.0, 11.2, 0.0),
        });

        let inv_res = Vec2::new(
            1.0 / self.config.width as f32,
            1.0 / self.config.height as f32,
        );
        let normalized_time = scene.animation_time_ms / 1000.0;

        // Shadow context first so the Normal context is current when the
        // per-light and per-emitter blocks are written below.
        self.ubo.set_camera(
            CameraContext::Shadow,
            &scene.shadow_camera.camera_block(inv_res, normalized_time),
        );
        let shadow_view = scene.shadow_camera.view;
        let shadow_vp = scene.shadow_camera.view_projection();
        let casters: Vec<usize> = scene.shadow_casters().collect();
        for i in casters {
            let block = scene.meshes[i].mesh_block(&shadow_view, &shadow_vp);
            let static_block = scene.meshes[i].static_block();
            self.ubo
                .set_mesh(device, &mut scene.meshes[i].ubo_handle, &block, &static_block);
        }

        self.ubo.set_camera(
            CameraContext::Normal,
            &scene.camera.camera_block(inv_res, normalized_time),
        );
        let view = scene.camera.view;
        let vp = scene.camera.view_projection();
        let visible: Vec<usize> = scene
            .solids
            .iter()
            .chain(scene.transparents.iter())
            .chain(scene.decals.iter())
            .chain(scene.reflection_receivers.iter())
            .chain(scene.sky_mesh.iter())
            .copied()
            .collect();
        for i in visible {
            let block = scene.meshes[i].mesh_block(&view, &vp);
            let static_block = scene.meshes[i].static_block();
            self.ubo
                .set_mesh(device, &mut scene.meshes[i].ubo_handle, &block, &static_block);
        }

        for light in &mut scene.lights {
            let block = light.light_block(1.0);
            self.ubo.set_block(device, &mut light.ubo_handle, &block);
            if light.has_lens_flare {
                let flare = UboLensFlare {
                    light_color: light.diffuse.extend(0.0),
                    light_pos: light.position().extend(0.0),
                };
                self.ubo.set_block(device, &mut light.flare_handle, &flare);
            }
            if light.kind == LightKind::Spot && light.casts_shadows {
                let shaft = light_shaft_block(light, &view, &vp, &shadow_vp);
                self.ubo.set_block(device, &mut light.shaft_handle, &shaft);
            }
        }

        for emitter in &mut scene.emitters {
            emitter.simulate(scene.time_ms);
            let advect = emitter_advect_block(emitter);
            self.ubo
                .set_block(device, &mut emitter.advect_handle, &advect);
            let render = emitter_render_block(emitter, &view, &vp);
            self.ubo
                .set_block(device, &mut emitter.render_handle, &render);
        }

        for material in &mut scene.materials {
            if let Some(track) = material.uv_scroll {
                let block = track.block_at(time_sec);
                self.ubo
                    .set_block(device, &mut material.translate_handle, &block);
            }
        }

        let tone_filter = self.tonemap.filter_block();
        let mut tonemap_handle = self.tonemap.ubo_handle;
        self.ubo.set_block(device, &mut tonemap_handle, &tone_filter);
        self.tonemap.ubo_handle = tonemap_handle;
        for filter in [&mut self.bloom_h, &mut self.bloom_v] {
            let block: UboFilter = filter.filter_block();
            let mut handle = filter.ubo_handle;
            self.ubo.set_block(device, &mut handle, &block);
            filter.ubo_handle = handle;
        }

        self.ubo.set_block(
            device,
            &mut self.envmap_handle,
            &UboEnvmapInterpolator {
                interpolator: Vec4::new(scene.envmap_blend, 0.0, 0.0, 0.0),
            },
        );

        self.ubo.upload(device);
    }

    fn shadow_pass(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene, set: ShaderSet) {
        let casters: Vec<usize> = scene.shadow_casters().collect();
        if casters.is_empty() {
            return;
        }
        device.bind_render_target(Some(self.shadow.target));
        device.set_viewport(0, 0, self.shadow.size, self.shadow.size);
        device.clear(None, Some(1.0));
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_cull(Some(Face::Front));
        device.set_blend(BlendMode::Opaque);
        device.bind_shader(set.shadow_depth);
        self.ubo.bind_camera(device, CameraContext::Shadow);

        for i in casters {
            let mesh = &scene.meshes[i];
            let Some(handle) = mesh.ubo_handle else { continue };
            let Some(bind) = scene.materials[mesh.material].static_bind else {
                continue;
            };
            self.ubo.bind_mesh(device, handle, bind);
            device.bind_vertex_array(mesh.geometry.vertex_array);
            device.draw_elements(
                PrimitiveTopology::TriangleList,
                mesh.geometry.index_count,
                mesh.geometry.index_format,
                0,
            );
            self.stats.record_draw(
                RenderStage::ShadowDepth,
                mesh.geometry.index_count as u64,
                mesh.triangle_count(),
            );
        }
        device.set_cull(Some(Face::Back));
    }

    fn planar_pass(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        if scene.reflection_receivers.is_empty() {
            return;
        }
        device.bind_render_target(Some(self.planar.target));
        device.set_viewport(0, 0, self.config.width / 2, self.config.height / 2);
        device.clear(Some(LinearRgba::TRANSPARENT), Some(1.0));
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
        self.ubo.bind_camera(device, CameraContext::Normal);

        let receivers = scene.reflection_receivers.clone();
        self.draw_mesh_list(
            device,
            scene,
            &receivers,
            PassBank::Reflection,
            RenderStage::PlanarReflection,
        );
    }

    fn gbuffer_pass(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        device.bind_render_target(Some(self.gbuffer.target));
        device.set_viewport(0, 0, self.config.width, self.config.height);
        device.clear(Some(LinearRgba::TRANSPARENT), Some(1.0));
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
        device.set_cull(Some(Face::Back));
        self.ubo.bind_camera(device, CameraContext::Normal);

        let solids = scene.solids.clone();
        self.draw_mesh_list(
            device,
            scene,
            &solids,
            PassBank::GBuffer,
            RenderStage::GBufferSolids,
        );
    }

    /// Draws a visible list with material batching: a material seen with
    /// more than one compatible instance becomes one instanced draw, and
    /// every member is marked rendered so the batch is not re-issued.
    fn draw_mesh_list(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        visible: &[usize],
        bank: PassBank,
        stage: RenderStage,
    ) {
        let batches = collect_batches(&scene.meshes, visible);
        for batch in batches {
            let first = batch.members[0];
            if scene.meshes[first].rendered {
                continue;
            }
            let material = &scene.materials[batch.material];
            let kind = if batch.is_instanced() {
                MeshKind::InstancedBatch
            } else {
                scene.meshes[first].kind
            };
            let shader = material
                .shader(bank, kind)
                .or_else(|| material.shader(bank, scene.meshes[first].kind));
            let Some(shader) = shader else { continue };
            device.bind_shader(shader);
            bind_material_textures(device, material);
            if material.uv_scroll.is_some() {
                if let Some(handle) = material.translate_handle {
                    self.ubo.bind_block(device, handle, slots::TRANSLATE_UV);
                }
            }

            let mesh = &scene.meshes[first];
            let Some(handle) = mesh.ubo_handle else { continue };
            let Some(bind) = material.static_bind else { continue };
            self.ubo.bind_mesh(device, handle, bind);
            device.bind_vertex_array(mesh.geometry.vertex_array);

            let instances = batch.members.len() as u32;
            if batch.is_instanced() {
                device.draw_elements_instanced(
                    PrimitiveTopology::TriangleList,
                    mesh.geometry.index_count,
                    mesh.geometry.index_format,
                    0,
                    instances,
                );
            } else {
                device.draw_elements(
                    PrimitiveTopology::TriangleList,
                    mesh.geometry.index_count,
                    mesh.geometry.index_format,
                    0,
                );
            }
            self.stats.record_draw(
                stage,
                mesh.geometry.index_count as u64 * instances as u64,
                mesh.triangle_count() * instances as u64,
            );
            for &member in &batch.members {
                scene.meshes[member].rendered = true;
            }
        }
    }

    fn advect_particles(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
    ) {
        if scene.emitters.is_empty() {
            return;
        }
        device.bind_shader(set.particle_advect);
        device.set_rasterizer_discard(true);

        for emitter in &mut scene.emitters {
            let substeps = emitter.num_substeps();
            if substeps > 0 {
                let mut headers = [Vec4::ZERO; MAX_SUBSTEPS];
                for header in headers.iter_mut().take(substeps as usize) {
                    let range: SubstepRange = emitter.simulate_substep();
                    *header = range.as_vec4();
                }
                if let Some(location) =
                    device.uniform_location(set.particle_advect, "substep_ranges")
                {
                    device.set_uniform(
                        location,
                        UniformValue::Vec4Array(&headers[..substeps as usize]),
                    );
                }
                if let Some(handle) = emitter.advect_handle {
                    self.ubo.bind_block(device, handle, slots::EMITTER_ADVECT);
                }

                let buffers = emitter.buffers();
                device.bind_vertex_array(buffers.advect_vao);
                device.bind_transform_feedback_buffer(0, buffers.capture_buffer);
                device.begin_transform_feedback(PrimitiveTopology::Points);
                device.draw_arrays(
                    PrimitiveTopology::Points,
                    0,
                    emitter.visible_particle_count(),
                );
                device.end_transform_feedback();
                self.stats.record_draw(
                    RenderStage::ParticleAdvect,
                    emitter.visible_particle_count() as u64,
                    0,
                );
            }
            emitter.switch_buffers();
        }
        device.set_rasterizer_discard(false);
    }

    fn render_particles(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        device.bind_render_target(self.scene_target(ctx));
        device.set_viewport(0, 0, ctx.width, ctx.height);
        device.set_depth_state(true, false, CompareFunction::LessEqual);
        device.bind_shader(set.particle_render);
        self.ubo.bind_camera(device, CameraContext::Normal);

        for emitter in &scene.emitters {
            if emitter.visible_particle_count() == 0 {
                continue;
            }
            device.set_blend(match emitter.kind() {
                ParticleKind::Fire | ParticleKind::Spark => BlendMode::Additive,
                ParticleKind::Smoke | ParticleKind::Soot => BlendMode::Alpha,
            });
            if let Some(handle) = emitter.render_handle {
                self.ubo.bind_block(device, handle, slots::EMITTER_RENDER);
            }
            let buffers = emitter.buffers();
            device.bind_vertex_array(buffers.render_vao);
            device.draw_arrays_instanced(
                PrimitiveTopology::TriangleFan,
                0,
                4,
                emitter.visible_particle_count(),
            );
            self.stats.record_draw(
                RenderStage::ParticleRender,
                4 * emitter.visible_particle_count() as u64,
                2 * emitter.visible_particle_count() as u64,
            );
        }
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn lens_flare_query_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        // Driver workaround carried from the field: flushing before the
        // query batch avoids a transform-feedback related crash on some
        // devices. Not a correctness requirement.
        device.flush();

        device.bind_render_target(self.scene_target(ctx));
        device.set_color_mask(false);
        device.set_depth_state(true, false, CompareFunction::LessEqual);
        device.bind_shader(set.occlusion_point);
        self.ubo.bind_camera(device, CameraContext::Normal);

        for light in &mut scene.lights {
            if !light.wants_lens_flare_query() {
                continue;
            }
            light.next_query_object();
            let Some(query) = light.current_query_object() else {
                continue;
            };
            let pos = light.position();
            device.write_buffer(
                self.point_vbo,
                0,
                bytemuck::cast_slice(&[pos.x, pos.y, pos.z]),
            );
            device.begin_query(query);
            device.bind_vertex_array(self.point_vao);
            device.draw_arrays(PrimitiveTopology::Points, 0, 1);
            device.end_query();
            self.stats.record_draw(RenderStage::LensFlareQuery, 1, 0);
        }

        device.set_color_mask(true);
        device.set_depth_state(true, true, CompareFunction::LessEqual);
    }

    fn lighting_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        device.bind_render_target(self.scene_target(ctx));
        device.set_viewport(0, 0, ctx.width, ctx.height);
        if !ctx.force_screen_render {
            device.clear(Some(LinearRgba::TRANSPARENT), None);
        }
        self.ubo.bind_camera(device, CameraContext::Normal);

        let mut first = true;
        for index in 0..scene.lights.len() {
            let (kind, handle, volume) = {
                let light = &scene.lights[index];
                (light.kind, light.ubo_handle, light.volume_transform())
            };
            if kind == LightKind::ShadowDecal {
                continue; // blended in its own stage
            }
            let shader = match kind {
                LightKind::Directional | LightKind::Ambient | LightKind::Ssao => {
                    set.lighting_directional
                }
                LightKind::Omni => set.lighting_omni,
                LightKind::Spot => set.lighting_spot,
                LightKind::ShadowDecal => unreachable!(),
            };
            device.bind_shader(shader);
            self.bind_gbuffer_inputs(device, shader);
            if let Some(handle) = handle {
                self.ubo.bind_block(device, handle, slots::LIGHT);
            }
            // The base layer replaces, every further light accumulates.
            device.set_blend(if first {
                BlendMode::Opaque
            } else {
                BlendMode::Additive
            });
            first = false;

            match volume {
                None => {
                    // Unbounded kinds cover the whole screen.
                    device.set_depth_state(false, false, CompareFunction::Always);
                    device.bind_vertex_array(self.quad_vao);
                    device.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);
                    self.stats.record_draw(RenderStage::Lighting, 4, 2);
                }
                Some(model) => {
                    // Front-face cull plus reversed depth test shades
                    // exactly the pixels inside the volume without a
                    // stencil pass.
                    if let Some(location) = device.uniform_location(shader, "volume_mvp") {
                        let mvp = scene.camera.view_projection() * model;
                        device.set_uniform(location, UniformValue::Mat4(mvp));
                    }
                    device.set_cull(Some(Face::Front));
                    device.set_depth_state(true, false, CompareFunction::GreaterEqual);
                    let volume_geom = if kind == LightKind::Spot {
                        self.cone_volume
                    } else {
                        self.sphere_volume
                    };
                    device.bind_vertex_array(volume_geom.vertex_array);
                    device.draw_elements(
                        PrimitiveTopology::TriangleList,
                        volume_geom.index_count,
                        IndexFormat::Uint16,
                        0,
                    );
                    self.stats.record_draw(
                        RenderStage::Lighting,
                        volume_geom.index_count as u64,
                        volume_geom.index_count as u64 / 3,
                    );
                    device.set_cull(Some(Face::Back));
                }
            }
        }
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn sky_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        let Some(sky) = scene.sky_mesh else { return };
        device.bind_render_target(self.scene_target(ctx));
        device.set_depth_state(true, false, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
        device.bind_shader(set.sky);
        self.ubo.bind_camera(device, CameraContext::Normal);
        if let Some(handle) = self.envmap_handle {
            self.ubo
                .bind_block(device, handle, slots::ENVMAP_INTERPOLATOR);
        }

        let mesh = &scene.meshes[sky];
        if let (Some(handle), Some(bind)) = (
            mesh.ubo_handle,
            scene.materials[mesh.material].static_bind,
        ) {
            self.ubo.bind_mesh(device, handle, bind);
            device.bind_vertex_array(mesh.geometry.vertex_array);
            device.draw_elements(
                PrimitiveTopology::TriangleList,
                mesh.geometry.index_count,
                mesh.geometry.index_format,
                0,
            );
            self.stats.record_draw(
                RenderStage::Sky,
                mesh.geometry.index_count as u64,
                mesh.triangle_count(),
            );
        }
        device.set_depth_state(true, true, CompareFunction::LessEqual);
    }

    fn shadow_decal_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        device.bind_render_target(self.scene_target(ctx));
        device.bind_shader(set.shadow_decal);
        self.bind_gbuffer_inputs(device, set.shadow_decal);
        device.bind_texture(5, self.shadow.depth, None);
        self.ubo.bind_camera(device, CameraContext::Normal);
        device.set_blend(BlendMode::Alpha);
        device.set_cull(Some(Face::Front));
        device.set_depth_state(true, false, CompareFunction::GreaterEqual);

        for index in 0..scene.lights.len() {
            let (kind, handle, volume) = {
                let light = &scene.lights[index];
                (light.kind, light.ubo_handle, light.volume_transform())
            };
            if kind != LightKind::ShadowDecal {
                continue;
            }
            if let Some(handle) = handle {
                self.ubo.bind_block(device, handle, slots::LIGHT);
            }
            if let (Some(model), Some(location)) = (
                volume,
                device.uniform_location(set.shadow_decal, "volume_mvp"),
            ) {
                let mvp = scene.camera.view_projection() * model;
                device.set_uniform(location, UniformValue::Mat4(mvp));
            }
            device.bind_vertex_array(self.sphere_volume.vertex_array);
            device.draw_elements(
                PrimitiveTopology::TriangleList,
                self.sphere_volume.index_count,
                IndexFormat::Uint16,
                0,
            );
            self.stats.record_draw(
                RenderStage::ShadowDecalBlend,
                self.sphere_volume.index_count as u64,
                self.sphere_volume.index_count as u64 / 3,
            );
        }
        device.set_cull(Some(Face::Back));
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn forward_mesh_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        visible: &[usize],
        stage: RenderStage,
        blend: BlendMode,
        ctx: &RenderContext,
    ) {
        if visible.is_empty() {
            return;
        }
        device.bind_render_target(self.scene_target(ctx));
        device.set_viewport(0, 0, ctx.width, ctx.height);
        device.set_depth_state(true, false, CompareFunction::LessEqual);
        device.set_blend(blend);
        self.ubo.bind_camera(device, CameraContext::Normal);
        self.draw_mesh_list(device, scene, visible, PassBank::Forward, stage);
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn light_shaft_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        device.bind_render_target(self.scene_target(ctx));
        device.bind_shader(set.light_shaft);
        device.bind_texture(0, self.shadow.depth, None);
        self.ubo.bind_camera(device, CameraContext::Normal);
        device.set_blend(BlendMode::Additive);
        device.set_depth_state(true, false, CompareFunction::LessEqual);

        for light in &scene.lights {
            if light.kind != LightKind::Spot || !light.casts_shadows {
                continue;
            }
            let Some(handle) = light.shaft_handle else { continue };
            self.ubo.bind_block(device, handle, slots::LIGHT_SHAFT);
            device.bind_vertex_array(self.cone_volume.vertex_array);
            device.draw_elements(
                PrimitiveTopology::TriangleList,
                self.cone_volume.index_count,
                IndexFormat::Uint16,
                0,
            );
            self.stats.record_draw(
                RenderStage::LightShafts,
                self.cone_volume.index_count as u64,
                self.cone_volume.index_count as u64 / 3,
            );
        }
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn lens_flare_draw_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        set: ShaderSet,
        ctx: &RenderContext,
    ) {
        device.bind_render_target(self.scene_target(ctx));
        device.bind_shader(set.lens_flare);
        device.set_blend(BlendMode::Additive);
        device.set_depth_state(false, false, CompareFunction::Always);
        self.ubo.bind_camera(device, CameraContext::Normal);

        for light in &scene.lights {
            if !light.wants_lens_flare_query() {
                continue;
            }
            // Consume the oldest query in the ring; an unfinished result
            // keeps last frame's visibility instead of stalling.
            if !light.is_previous_query_object_initialized() {
                continue;
            }
            let Some(query) = light.previous_query_object() else {
                continue;
            };
            if !device.query_result_available(query) || device.query_result(query) == 0 {
                continue;
            }
            if let Some(handle) = light.flare_handle {
                self.ubo.bind_block(device, handle, slots::LENS_FLARE);
            }
            device.bind_vertex_array(self.quad_vao);
            device.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);
            self.stats.record_draw(RenderStage::LensFlareDraw, 4, 2);
        }
        device.set_depth_state(true, true, CompareFunction::LessEqual);
        device.set_blend(BlendMode::Opaque);
    }

    fn post_pass(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) {
        device.set_depth_state(false, false, CompareFunction::Always);
        device.set_blend(BlendMode::Opaque);

        let depth_parameters = scene.camera.depth_parameters();
        let eye = scene.camera.eye;
        let focus = scene.camera.focus_distance;

        if self.config.bloom_levels > 0 {
            for level in 0..self.config.bloom_levels.min(self.bloom_h.mip_count()) {
                self.bloom_h.set_render_target_level(level);
                self.bloom_h.set_gauss_lod_level(level as i32);
                self.bloom_h.set_input(0, self.hdr.color, None);
                self.bloom_h.render(
                    device,
                    &self.ubo,
                    self.quad_vao,
                    &mut self.stats,
                    RenderStage::Post,
                );
                self.bloom_v.set_render_target_level(level);
                self.bloom_v.set_gauss_lod_level(level as i32);
                let Some(blurred) = self.bloom_h.color_texture() else {
                    break;
                };
                self.bloom_v.set_input(0, blurred, None);
                self.bloom_v.render(
                    device,
                    &self.ubo,
                    self.quad_vao,
                    &mut self.stats,
                    RenderStage::Post,
                );
            }
        }

        let mut scene_color = self.hdr.color;
        if let Some(dof) = &mut self.dof {
            dof.set_input(0, scene_color, None);
            dof.set_depth_input(0, self.gbuffer.depth);
            dof.set_camera(depth_parameters, eye, focus);
            dof.render(
                device,
                &self.ubo,
                self.quad_vao,
                &mut self.stats,
                RenderStage::Post,
            );
            if let Some(color) = dof.color_texture() {
                scene_color = color;
            }
        }

        self.tonemap.set_input(0, scene_color, None);
        if self.config.bloom_levels > 0 {
            if let Some(bloom) = self.bloom_v.color_texture() {
                self.tonemap.set_input(1, bloom, None);
            }
        }
        self.tonemap.set_depth_input(0, self.gbuffer.depth);
        self.tonemap.set_camera(depth_parameters, eye, focus);
        self.tonemap.render(
            device,
            &self.ubo,
            self.quad_vao,
            &mut self.stats,
            RenderStage::Post,
        );
        device.set_depth_state(true, true, CompareFunction::LessEqual);
    }

    fn scene_target(&self, ctx: &RenderContext) -> Option<RenderTargetId> {
        if ctx.force_screen_render {
            None
        } else {
            Some(self.hdr.target)
        }
    }

    fn bind_gbuffer_inputs(&self, device: &mut dyn GraphicsDevice, shader: ShaderId) {
        let inputs = [
            self.gbuffer.color,
            self.gbuffer.normal,
            self.gbuffer.params,
            self.gbuffer.depth,
        ];
        for (unit, texture) in inputs.iter().enumerate() {
            let name = format!("texture_unit{unit}");
            if let Some(location) = device.uniform_location(shader, &name) {
                device.set_uniform(location, UniformValue::Int(unit as i32));
                device.bind_texture(unit as u32, *texture, None);
            }
        }
    }
}

fn sort_transparents(scene: &Scene, order: &mut Vec<usize>, near_plane: &Plane) {
    // Sort the bucket's indices, not a dense 0..n range.
    let bucket = &scene.transparents;
    order.clear();
    order.extend(bucket.iter().copied());
    order.sort_by(|&a, &b| {
        let da = scene.meshes[a].near_plane_distance(near_plane);
        let db = scene.meshes[b].near_plane_distance(near_plane);
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn bind_material_textures(device: &mut dyn GraphicsDevice, material: &Material) {
    for (slot, entry) in material.textures.iter().enumerate() {
        if let Some((texture, sampler)) = entry {
            device.bind_texture(slot as u32, *texture, *sampler);
        }
    }
}

fn light_shaft_block(light: &Light, view: &Mat4, vp: &Mat4, shadow_vp: &Mat4) -> UboLightShaft {
    let model = light.volume_transform().unwrap_or(Mat4::IDENTITY);
    let spot_cos = (0.5 * light.spot_angle).cos();
    UboLightShaft {
        mvp: *vp * model,
        mv: *view * model,
        shadow_matrix: *shadow_vp,
        light_color: light.diffuse.extend(0.0),
        light_pos: light.position().extend(1.0),
        light_x: light.world.cols[0],
        spot_cos_attenuation: Vec4::new(
            spot_cos,
            1.0 / (1.0 - spot_cos).max(1.0e-6),
            -1.0 / (light.radius * light.radius).max(1.0e-6),
            0.0,
        ),
    }
}

fn emitter_advect_block(emitter: &Emitter) -> UboEmitterAdvect {
    let p = &emitter.params;
    UboEmitterAdvect {
        aperture_focus: p.aperture_focus,
        world: emitter.world,
        min_freq_speed: p.min_freq_speed,
        max_freq_speed: p.max_freq_speed,
        min_amp_accel: p.min_amp_accel,
        max_amp_accel: p.max_amp_accel,
        external_velocity_gravity: p.external_velocity_gravity,
        max_life_size_substeps: Vec4::new(
            p.max_life,
            p.size.0,
            p.size.1,
            emitter.num_substeps() as f32,
        ),
    }
}

fn emitter_render_block(emitter: &Emitter, view: &Mat4, vp: &Mat4) -> UboEmitterRender {
    let p = &emitter.params;
    UboEmitterRender {
        mvp: *vp * emitter.world,
        mv: *view * emitter.world,
        max_life_size: Vec4::new(p.max_life, p.size.0, p.size.1, 0.0),
        color: p.color.extend(1.0),
    }
}

// --- GPU resource creation ---

fn create_quad(device: &mut dyn GraphicsDevice) -> Result<VertexArrayId, RenderError> {
    let vertices: [f32; 16] = [
        -1.0, -1.0, 0.0, 0.0, //
        1.0, -1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0, //
        1.0, 1.0, 1.0, 1.0,
    ];
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some("fullscreen-quad".into()),
        size: std::mem::size_of_val(&vertices),
        usage: BufferUsage::Vertex,
        access: BufferAccess::Static,
    })?;
    device.write_buffer(buffer, 0, bytemuck::cast_slice(&vertices));
    let vao = device.create_vertex_array(&VertexArrayDescriptor {
        label: Some("fullscreen-quad".into()),
        layouts: vec![VertexBufferLayout {
            buffer,
            base_offset: 0,
            stride: 16,
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x4,
                offset: 0,
                divisor: 0,
            }],
        }],
        index_buffer: None,
    })?;
    Ok(vao)
}

fn create_point(
    device: &mut dyn GraphicsDevice,
) -> Result<(BufferId, VertexArrayId), RenderError> {
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some("occlusion-point".into()),
        size: 12,
        usage: BufferUsage::Vertex,
        access: BufferAccess::Dynamic,
    })?;
    let vao = device.create_vertex_array(&VertexArrayDescriptor {
        label: Some("occlusion-point".into()),
        layouts: vec![VertexBufferLayout {
            buffer,
            base_offset: 0,
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
                divisor: 0,
            }],
        }],
        index_buffer: None,
    })?;
    Ok((buffer, vao))
}

fn create_volume(
    device: &mut dyn GraphicsDevice,
    label: &'static str,
    positions: Vec<f32>,
    indices: Vec<u16>,
) -> Result<LightVolume, RenderError> {
    let vbo = device.create_buffer(&BufferDescriptor {
        label: Some(label.into()),
        size: positions.len() * 4,
        usage: BufferUsage::Vertex,
        access: BufferAccess::Static,
    })?;
    device.write_buffer(vbo, 0, bytemuck::cast_slice(&positions));
    let ibo = device.create_buffer(&BufferDescriptor {
        label: Some(label.into()),
        size: indices.len() * 2,
        usage: BufferUsage::Index,
        access: BufferAccess::Static,
    })?;
    device.write_buffer(ibo, 0, bytemuck::cast_slice(&indices));
    let vao = device.create_vertex_array(&VertexArrayDescriptor {
        label: Some(label.into()),
        layouts: vec![VertexBufferLayout {
            buffer: vbo,
            base_offset: 0,
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
                divisor: 0,
            }],
        }],
        index_buffer: Some(ibo),
    })?;
    Ok(LightVolume {
        vertex_array: vao,
        index_count: indices.len() as u32,
    })
}

/// A coarse unit UV-sphere; the volume shader only needs containment,
/// and the 1.25 radius scale covers the faceting error.
fn create_sphere_volume(
    device: &mut dyn GraphicsDevice,
    segments: u32,
    rings: u32,
) -> Result<LightVolume, RenderError> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        for segment in 0..=segments {
            let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
            positions.extend_from_slice(&[
                phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            ]);
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = (ring * stride + segment) as u16;
            let b = a + stride as u16;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    create_volume(device, "light-sphere", positions, indices)
}

/// A unit cone: apex at the origin, unit-radius base at `z = 1`, plus
/// the base cap.
fn create_cone_volume(
    device: &mut dyn GraphicsDevice,
    segments: u32,
) -> Result<LightVolume, RenderError> {
    let mut positions = vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
    let mut indices = Vec::new();
    for segment in 0..segments {
        let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
        positions.extend_from_slice(&[theta.cos(), theta.sin(), 1.0]);
    }
    for segment in 0..segments {
        let a = (2 + segment) as u16;
        let b = (2 + (segment + 1) % segments) as u16;
        indices.extend_from_slice(&[0, a, b]); // side
        indices.extend_from_slice(&[1, b, a]); // cap
    }
    create_volume(device, "light-cone", positions, indices)
}

fn create_gbuffer(
    device: &mut dyn GraphicsDevice,
    width: u32,
    height: u32,
) -> Result<GBuffer, RenderError> {
    let make = |device: &mut dyn GraphicsDevice, label: &'static str, format| {
        device.create_texture(&TextureDescriptor {
            label: Some(label.into()),
            width,
            height,
            format,
            mip_count: 1,
            samples: 1,
        })
    };
    let color = make(device, "gbuffer-color", TextureFormat::Rgba8Unorm)?;
    let normal = make(device, "gbuffer-normal", TextureFormat::Rgba16Float)?;
    let params = make(device, "gbuffer-params", TextureFormat::Rgba8Unorm)?;
    let depth = make(device, "gbuffer-depth", TextureFormat::Depth24Stencil8)?;
    let target = device.create_render_target(&RenderTargetDescriptor {
        label: Some("gbuffer".into()),
        colors: vec![color, normal, params],
        level: 0,
        depth: Some(depth),
    })?;
    Ok(GBuffer {
        color,
        normal,
        params,
        depth,
        target,
    })
}

fn create_hdr_target(
    device: &mut dyn GraphicsDevice,
    width: u32,
    height: u32,
    depth: TextureId,
) -> Result<HdrTarget, RenderError> {
    let color = device.create_texture(&TextureDescriptor {
        label: Some("hdr-color".into()),
        width,
        height,
        format: TextureFormat::Rgba16Float,
        mip_count: 1,
        samples: 1,
    })?;
    // Shares the G-buffer depth so forward passes depth-test against
    // the solids.
    let target = device.create_render_target(&RenderTargetDescriptor {
        label: Some("hdr".into()),
        colors: vec![color],
        level: 0,
        depth: Some(depth),
    })?;
    Ok(HdrTarget { color, target })
}

fn create_planar_target(
    device: &mut dyn GraphicsDevice,
    width: u32,
    height: u32,
) -> Result<HdrTarget, RenderError> {
    let color = device.create_texture(&TextureDescriptor {
        label: Some("planar-color".into()),
        width,
        height,
        format: TextureFormat::Rgba8Unorm,
        mip_count: 1,
        samples: 1,
    })?;
    let depth = device.create_texture(&TextureDescriptor {
        label: Some("planar-depth".into()),
        width,
        height,
        format: TextureFormat::Depth24Stencil8,
        mip_count: 1,
        samples: 1,
    })?;
    let target = device.create_render_target(&RenderTargetDescriptor {
        label: Some("planar".into()),
        colors: vec![color],
        level: 0,
        depth: Some(depth),
    })?;
    Ok(HdrTarget { color, target })
}

fn create_shadow_map(
    device: &mut dyn GraphicsDevice,
    size: u32,
) -> Result<ShadowMap, RenderError> {
    let depth = device.create_texture(&TextureDescriptor {
        label: Some("shadow-depth".into()),
        width: size,
        height: size,
        format: TextureFormat::Depth32Float,
        mip_count: 1,
        samples: 1,
    })?;
    let target = device.create_render_target(&RenderTargetDescriptor {
        label: Some("shadow".into()),
        colors: Vec::new(),
        level: 0,
        depth: Some(depth),
    })?;
    Ok(ShadowMap {
        depth,
        target,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Geometry;
    use ember_infra::null::NullDevice;

    fn test_renderer(device: &mut NullDevice, bloom_levels: u32) -> SceneRenderer {
        let mut renderer = SceneRenderer::new(
            device,
            RendererConfig {
                width: 640,
                height: 360,
                shadow_map_size: 256,
                bloom_levels,
                enable_dof: false,
                fsaa: 1,
            },
        )
        .unwrap();
        renderer
            .reload_shaders(device, &ShaderSources::default())
            .unwrap();
        renderer
    }

    fn cube_geometry(device: &mut NullDevice) -> Geometry {
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 1024,
                usage: BufferUsage::Vertex,
                access: BufferAccess::Static,
            })
            .unwrap();
        let vao = device
            .create_vertex_array(&VertexArrayDescriptor {
                label: None,
                layouts: vec![VertexBufferLayout {
                    buffer,
                    base_offset: 0,
                    stride: 12,
                    attributes: vec![],
                }],
                index_buffer: None,
            })
            .unwrap();
        Geometry {
            vertex_array: vao,
            index_count: 36,
            index_format: IndexFormat::Uint16,
        }
    }

    /// One caster mesh, one sky mesh, one directional light, no
    /// particles.
    fn minimal_scene(device: &mut NullDevice) -> Scene {
        let mut scene = Scene::new();
        scene.materials.push(Material::new("wall"));
        scene.materials.push(Material::new("sky"));

        let geometry = cube_geometry(device);
        let mut wall = Mesh::new("wall", geometry, 0);
        wall.casts_shadows = true;
        scene.meshes.push(wall);
        scene.solids.push(0);

        let sky_geometry = cube_geometry(device);
        scene.meshes.push(Mesh::new("sky_dome", sky_geometry, 1));
        scene.sky_mesh = Some(1);

        scene
            .lights
            .push(Light::new(LightKind::Directional, Mat4::IDENTITY, Vec3::ONE, 0.0));
        scene
    }

    #[test]
    fn end_to_end_draw_call_accounting() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        renderer.precache(&mut device, &mut scene);

        renderer.render_frame(&mut device, &mut scene);
        let stats = renderer.stats();

        assert_eq!(stats.stage_draws(RenderStage::ShadowDepth), 1);
        assert_eq!(stats.stage_draws(RenderStage::GBufferSolids), 1);
        assert_eq!(stats.stage_draws(RenderStage::Lighting), 1);
        assert_eq!(stats.stage_draws(RenderStage::Sky), 1);
        assert_eq!(stats.stage_draws(RenderStage::Post), 1);
        assert_eq!(stats.draw_calls, 5);
        assert_eq!(stats.draw_calls as u64, device.draw_calls());
    }

    #[test]
    fn disabling_a_bit_zeroes_exactly_that_stage() {
        let cases = [
            (RenderBits::SHADOW_DEPTH, RenderStage::ShadowDepth),
            (RenderBits::GBUFFER_SOLIDS, RenderStage::GBufferSolids),
            (RenderBits::LIGHTING, RenderStage::Lighting),
            (RenderBits::SKY, RenderStage::Sky),
            (RenderBits::POST, RenderStage::Post),
        ];
        for (bit, stage) in cases {
            let mut device = NullDevice::new();
            let mut renderer = test_renderer(&mut device, 0);
            let mut scene = minimal_scene(&mut device);
            renderer.precache(&mut device, &mut scene);

            renderer.render_frame(&mut device, &mut scene);
            let baseline = *renderer.stats();

            renderer.set_disabled_render_bits(bit);
            renderer.render_frame(&mut device, &mut scene);
            let masked = *renderer.stats();

            assert_eq!(masked.stage_draws(stage), 0, "{stage:?}");
            for other in RenderStage::ORDER {
                if other == stage {
                    continue;
                }
                assert_eq!(
                    masked.stage_draws(other),
                    baseline.stage_draws(other),
                    "disabling {stage:?} changed {other:?}"
                );
            }
        }
    }

    #[test]
    fn disabling_shadow_depth_also_skips_shadow_decals() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        let mut blob = Light::new(
            LightKind::ShadowDecal,
            Mat4::from_translation(Vec3::X),
            Vec3::ONE,
            2.0,
        );
        blob.casts_shadows = false;
        scene.lights.push(blob);
        renderer.precache(&mut device, &mut scene);

        renderer.render_frame(&mut device, &mut scene);
        assert_eq!(renderer.stats().stage_draws(RenderStage::ShadowDecalBlend), 1);

        renderer.set_disabled_render_bits(RenderBits::SHADOW_DEPTH);
        renderer.render_frame(&mut device, &mut scene);
        assert_eq!(renderer.stats().stage_draws(RenderStage::ShadowDepth), 0);
        assert_eq!(
            renderer.stats().stage_draws(RenderStage::ShadowDecalBlend),
            0
        );
    }

    #[test]
    fn post_disabled_blits_gbuffer_depth_to_screen() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        renderer.precache(&mut device, &mut scene);

        renderer.render_frame(&mut device, &mut scene);
        assert_eq!(device.depth_blits(), 0);

        renderer.set_disabled_render_bits(RenderBits::POST);
        renderer.render_frame(&mut device, &mut scene);
        assert_eq!(device.depth_blits(), 1);
    }

    #[test]
    fn shared_material_instances_collapse_to_one_draw() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        // Two more walls on the same geometry and material.
        let geometry = scene.meshes[0].geometry;
        for i in 0..2 {
            let mut mesh = Mesh::new(&format!("wall_{i}"), geometry, 0);
            mesh.casts_shadows = false;
            scene.meshes.push(mesh);
            scene.solids.push(scene.meshes.len() - 1);
        }
        renderer.precache(&mut device, &mut scene);
        renderer.render_frame(&mut device, &mut scene);

        // 3 solids sharing one material and geometry: one instanced draw.
        assert_eq!(renderer.stats().stage_draws(RenderStage::GBufferSolids), 1);
        assert_eq!(device.instanced_draws(), 1);
        assert!(scene.meshes.iter().take(1).all(|m| m.rendered));
    }

    #[test]
    fn bloom_pyramid_draw_count_scales_with_levels() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 3);
        let mut scene = minimal_scene(&mut device);
        renderer.precache(&mut device, &mut scene);
        renderer.render_frame(&mut device, &mut scene);
        // 3 levels * (horizontal + vertical) + tonemap combine.
        assert_eq!(renderer.stats().stage_draws(RenderStage::Post), 7);
    }

    #[test]
    fn flare_draw_waits_for_query_ring() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        let mut lamp = Light::new(
            LightKind::Omni,
            Mat4::from_translation(Vec3::Y),
            Vec3::ONE,
            3.0,
        );
        lamp.has_lens_flare = true;
        scene.lights.push(lamp);
        renderer.precache(&mut device, &mut scene);

        for frame in 0..5 {
            renderer.render_frame(&mut device, &mut scene);
            let flare_draws = renderer.stats().stage_draws(RenderStage::LensFlareDraw);
            assert_eq!(
                renderer.stats().stage_draws(RenderStage::LensFlareQuery),
                1
            );
            if frame < 3 {
                assert_eq!(flare_draws, 0, "frame {frame}: ring not full yet");
            } else {
                assert_eq!(flare_draws, 1, "frame {frame}");
            }
        }
    }

    #[test]
    fn flush_precedes_lens_flare_queries() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        renderer.precache(&mut device, &mut scene);
        renderer.render_frame(&mut device, &mut scene);
        assert_eq!(device.flushes(), 1);
    }

    #[test]
    fn emitters_swap_even_when_particles_are_masked() {
        let mut device = NullDevice::new();
        let mut renderer = test_renderer(&mut device, 0);
        let mut scene = minimal_scene(&mut device);
        scene
            .emitters
            .push(Emitter::new(&mut device, "smoke_main", 10.0, 64).unwrap());
        renderer.precache(&mut device, &mut scene);
        renderer.set_disabled_render_bits(RenderBits::PARTICLES);

        let before = scene.emitters[0].buffers().capture_buffer;
        renderer.render_frame(&mut device, &mut scene);
        let after = scene.emitters[0].buffers().capture_buffer;
        assert_ne!(before, after);
        assert_eq!(renderer.stats().stage_draws(RenderStage::ParticleAdvect), 0);
        assert_eq!(renderer.stats().stage_draws(RenderStage::ParticleRender), 0);
    }

    #[test]
    fn fsaa_beyond_device_limit_is_rejected() {
        let mut device = NullDevice::new();
        let err = SceneRenderer::new(
            &mut device,
            RendererConfig {
                fsaa: 64,
                ..RendererConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::FsaaUnsupported { requested: 64 }));
    }
}
