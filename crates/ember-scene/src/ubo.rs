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

//! Constant-block sub-allocation for the deferred pipeline.
//!
//! Every draw reads its parameters from uniform-block ranges bound out of
//! a small pool of large buffers. [`UboManager`] owns that pool: per
//! frame it packs all dynamic blocks into CPU shadow copies at aligned
//! offsets, uploads each touched buffer once, and binds sub-ranges per
//! draw with redundant-bind suppression. Material blocks and
//! world-static mesh blocks are written once at precache time into
//! separate static buffers.
//!
//! The block structs must stay field-for-field in sync with the uniform
//! blocks declared in the shader sources.

use bytemuck::Pod;
use ember_core::math::{Mat4, Vec4};
use ember_core::renderer::api::{
    BufferAccess, BufferDescriptor, BufferId, BufferUsage,
};
use ember_core::renderer::GraphicsDevice;
use log::{debug, error};

/// Uniform-block binding slots. Kept in sync with the `binding =` layout
/// qualifiers in the shader sources.
pub mod slots {
    /// Per-frame constants.
    pub const FRAME: u32 = 0;
    /// Per-camera constants.
    pub const CAMERA: u32 = 1;
    /// Material constants.
    pub const MATERIAL: u32 = 2;
    /// Per-mesh dynamic matrices.
    pub const MESH: u32 = 3;
    /// Per-mesh static matrices.
    pub const STATIC_MESH: u32 = 4;
    /// Particle advection parameters.
    pub const EMITTER_ADVECT: u32 = 5;
    /// Particle rendering parameters.
    pub const EMITTER_RENDER: u32 = 6;
    /// Light shaft parameters.
    pub const LIGHT_SHAFT: u32 = 7;
    /// Lens flare parameters.
    pub const LENS_FLARE: u32 = 8;
    /// Full-screen filter parameters.
    pub const FILTER: u32 = 9;
    /// UV scroll parameters.
    pub const TRANSLATE_UV: u32 = 10;
    /// Environment map interpolation weights.
    pub const ENVMAP_INTERPOLATOR: u32 = 11;
    /// Deferred light parameters.
    pub const LIGHT: u32 = 12;
}

/// Per-frame constants, written once per frame at the start of buffer 0.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboFrame {
    /// World-to-shadow-map matrix of the main shadow caster.
    pub shadow_matrix: Mat4,
    /// `x` = scene time, `y` = frame delta in seconds.
    pub time_dt: Vec4,
    /// Filmic curve shoulder/linear strength, linear angle, toe strength.
    pub tone_abcd: Vec4,
    /// Filmic toe numerator/denominator, linear white, adaptation range.
    pub tone_efw_tau: Vec4,
    /// Exposure, bloom threshold, tone-map white point.
    pub exposure_bloom_white: Vec4,
}

/// Per-camera constants; two instances live after the frame block in
/// buffer 0, one per camera context.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboCamera {
    /// Near/far-derived depth linearization parameters.
    pub depth_parameters: Vec4,
    /// Camera view direction.
    pub view_dir: Vec4,
    /// Camera position, `w` = normalized animation time.
    pub view_pos_time: Vec4,
    /// Reciprocal render target resolution.
    pub inv_resolution: Vec4,
    /// View-projection matrix.
    pub view_projection: Mat4,
}

/// Material constants, precached into static buffers.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboMaterial {
    /// Fresnel parameters, `w` = transparency.
    pub fresnel_transparency: Vec4,
    /// Diffuse/specular intensity, specular exponent, reflect intensity.
    pub params: Vec4,
}

/// Per-mesh dynamic matrices, rewritten every frame per camera context.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboMesh {
    /// Model-view-projection matrix.
    pub mvp: Mat4,
    /// Model-view matrix.
    pub mv: Mat4,
    /// Inverse model-view matrix.
    pub inv_modelview: Mat4,
}

/// Per-mesh static matrices; precached for world geometry, dynamic for
/// movers.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboStaticMesh {
    /// Model-to-world matrix.
    pub model: Mat4,
    /// Inverse model matrix.
    pub inv_model: Mat4,
    /// Mesh tint color.
    pub color: Vec4,
}

/// Particle advection parameters for one emitter.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboEmitterAdvect {
    /// Emission aperture, `w` = focus distance.
    pub aperture_focus: Vec4,
    /// Emitter world matrix.
    pub world: Mat4,
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
    /// `x` = max particle life, `yz` = size, `w` = substep count.
    pub max_life_size_substeps: Vec4,
}

/// Particle rendering parameters for one emitter.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboEmitterRender {
    /// Model-view-projection matrix.
    pub mvp: Mat4,
    /// Model-view matrix.
    pub mv: Mat4,
    /// `x` = max particle life, `yz` = size.
    pub max_life_size: Vec4,
    /// Particle tint color.
    pub color: Vec4,
}

/// Light shaft parameters for one shaft-casting light.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboLightShaft {
    /// Model-view-projection matrix of the shaft cone.
    pub mvp: Mat4,
    /// Model-view matrix of the shaft cone.
    pub mv: Mat4,
    /// World-to-shadow-map matrix.
    pub shadow_matrix: Mat4,
    /// Light color.
    pub light_color: Vec4,
    /// Light position.
    pub light_pos: Vec4,
    /// Light basis X axis.
    pub light_x: Vec4,
    /// Spot cosine cutoff and attenuation parameter.
    pub spot_cos_attenuation: Vec4,
}

/// Deferred light parameters, rewritten per light volume draw.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboLight {
    /// Light color scaled by the animated intensity.
    pub light_color: Vec4,
    /// Light world position.
    pub light_pos: Vec4,
    /// Light direction (negative local Z), `w` = light z position.
    pub light_x: Vec4,
    /// `x` = spot cosine cutoff, `y` = 1/(1-x), `z` = -1/radius².
    pub spot_cos_attenuation: Vec4,
}

/// Lens flare parameters for one flare-carrying light.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboLensFlare {
    /// Light color.
    pub light_color: Vec4,
    /// Light position.
    pub light_pos: Vec4,
}

/// Full-screen filter parameters.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboFilter {
    /// `xy` = separable blur texel step for the selected direction.
    pub offset_2d: Vec4,
}

/// UV scroll parameters for conveyor-style materials.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboTranslateUv {
    /// `xy` = UV translation this frame.
    pub translate_uv: Vec4,
}

/// Environment map interpolation weights.
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UboEnvmapInterpolator {
    /// `x` = blend factor between the two nearest probes.
    pub interpolator: Vec4,
}

/// The camera context a dynamic mesh block belongs to. Meshes are
/// written once per context per frame (main view and shadow view see
/// different matrices), so the bind tables are duplicated per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CameraContext {
    /// The main view.
    Normal = 0,
    /// The shadow-map view.
    Shadow = 1,
}

impl CameraContext {
    /// Number of camera contexts.
    pub const COUNT: usize = 2;
}

/// A persistent handle into the per-context bind tables.
///
/// Objects store `Option<UboHandle>` and get one lazily the first time a
/// block is written for them; the handle stays valid for the object's
/// lifetime and indexes both context tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UboHandle(u32);

/// A precached bind location in a static buffer (materials, world
/// meshes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticBind {
    /// The static buffer.
    pub buffer: BufferId,
    /// Byte offset of the block.
    pub offset: u32,
}

/// Where one object's blocks currently live.
#[derive(Debug, Clone, Copy, Default)]
struct BufferBind {
    buffer: Option<BufferId>,
    offset: u32,
    struct_size: u32,
    aligned_size: u32,
    static_buffer: Option<BufferId>,
    static_offset: u32,
    precached: bool,
}

struct DynamicBuffer {
    id: BufferId,
    shadow: Vec<u8>,
}

const DEFAULT_HANDLE_COUNT: usize = 550;
const PREALLOCATED_KIB: usize = 384;

/// Rounds `size` up to the next multiple of `alignment`.
///
/// The result is always ≥ `size` and a multiple of `alignment`; every
/// block offset handed to `bind_uniform_range` is produced from these.
pub fn aligned_size(size: u32, alignment: u32) -> u32 {
    let rem = size % alignment;
    if rem == 0 {
        size
    } else {
        size + alignment - rem
    }
}

fn aligned_size_of<T>(alignment: u32) -> u32 {
    aligned_size(std::mem::size_of::<T>() as u32, alignment)
}

/// Sub-allocates and binds all uniform blocks of a frame.
pub struct UboManager {
    alignment: u32,
    buffer_size: u32,

    frame_asize: u32,
    camera_asize: u32,
    material_asize: u32,
    static_mesh_asize: u32,

    binds: [Vec<BufferBind>; CameraContext::COUNT],
    handle_counter: u32,

    static_buffers: Vec<BufferId>,
    buffers: Vec<DynamicBuffer>,
    buffer_index: usize,
    cursor: u32,

    current_camera: CameraContext,
    prev_camera_bind: Option<CameraContext>,
    prev_mesh_bind: Option<UboHandle>,
    prev_material_bind: Option<StaticBind>,
}

impl UboManager {
    /// Creates a manager sized from the device's uniform limits.
    pub fn new(device: &dyn GraphicsDevice) -> Self {
        let limits = device.limits();
        let alignment = limits.uniform_offset_alignment;
        // Very large advertised block sizes waste shadow memory.
        let buffer_size = limits.max_uniform_block_size.min(65536);

        debug!(
            "UboManager: alignment {alignment}, buffer size {buffer_size}"
        );

        Self {
            alignment,
            buffer_size,
            frame_asize: aligned_size_of::<UboFrame>(alignment),
            camera_asize: aligned_size_of::<UboCamera>(alignment),
            material_asize: aligned_size_of::<UboMaterial>(alignment),
            static_mesh_asize: aligned_size_of::<UboStaticMesh>(alignment),
            binds: [
                vec![BufferBind::default(); DEFAULT_HANDLE_COUNT],
                vec![BufferBind::default(); DEFAULT_HANDLE_COUNT],
            ],
            handle_counter: 0,
            static_buffers: Vec::new(),
            buffers: Vec::new(),
            buffer_index: 0,
            cursor: 0,
            current_camera: CameraContext::Normal,
            prev_camera_bind: None,
            prev_mesh_bind: None,
            prev_material_bind: None,
        }
    }

    /// The byte alignment of block offsets.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Number of dynamic pool buffers currently allocated.
    pub fn dynamic_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Writes material blocks into static buffers and returns one
    /// [`StaticBind`] per input, in order. Rolls to a fresh static
    /// buffer whenever the current one fills up.
    pub fn precache_materials(
        &mut self,
        device: &mut dyn GraphicsDevice,
        materials: &[UboMaterial],
    ) -> Vec<StaticBind> {
        let mut binds = Vec::with_capacity(materials.len());
        let mut buffer = self.create_static_buffer(device);
        let mut offset = 0u32;

        for data in materials {
            if self.buffer_size - offset < self.material_asize {
                buffer = self.create_static_buffer(device);
                offset = 0;
            }
            device.write_buffer(buffer, offset as usize, bytemuck::bytes_of(data));
            binds.push(StaticBind { buffer, offset });
            offset += self.material_asize;
        }
        binds
    }

    /// Writes world-static mesh blocks into static buffers, pre-creating
    /// a handle per mesh with the static part marked precached in both
    /// camera contexts. Returns one handle per input, in order.
    pub fn precache_static_meshes(
        &mut self,
        device: &mut dyn GraphicsDevice,
        meshes: &[UboStaticMesh],
    ) -> Vec<UboHandle> {
        let mut handles = Vec::with_capacity(meshes.len());
        let mut buffer = self.create_static_buffer(device);
        let mut offset = 0u32;

        for data in meshes {
            if self.buffer_size - offset < self.static_mesh_asize {
                buffer = self.create_static_buffer(device);
                offset = 0;
            }
            device.write_buffer(buffer, offset as usize, bytemuck::bytes_of(data));

            let handle = self.create_handle();
            for context in 0..CameraContext::COUNT {
                let bind = &mut self.binds[context][handle.0 as usize];
                bind.static_buffer = Some(buffer);
                bind.static_offset = offset;
                bind.precached = true;
            }
            handles.push(handle);
            offset += self.static_mesh_asize;
        }
        handles
    }

    /// Preallocates the dynamic pool and establishes the frame-block
    /// bind. Called once after the static precache.
    pub fn preallocate(&mut self, device: &mut dyn GraphicsDevice) {
        let count = (PREALLOCATED_KIB * 1024 - 1) / self.buffer_size as usize + 1;
        while self.buffers.len() < count {
            self.create_new_buffer(device);
        }
        device.bind_uniform_range(
            slots::FRAME,
            self.buffers[0].id,
            0,
            self.frame_asize as usize,
        );
    }

    /// Resets the write cursor past the frame and camera region of
    /// buffer 0.
    pub fn begin_frame(&mut self) {
        self.buffer_index = 0;
        self.cursor = self.frame_asize + CameraContext::COUNT as u32 * self.camera_asize;
        self.prev_mesh_bind = None;
    }

    /// Writes the per-frame block into its fixed slot in buffer 0.
    pub fn set_frame(&mut self, data: &UboFrame) {
        let bytes = bytemuck::bytes_of(data);
        self.buffers[0].shadow[..bytes.len()].copy_from_slice(bytes);
    }

    /// Writes a camera block into its fixed slot and makes that context
    /// current for subsequent mesh writes.
    pub fn set_camera(&mut self, context: CameraContext, data: &UboCamera) {
        self.current_camera = context;
        let offset = (self.frame_asize + context as u32 * self.camera_asize) as usize;
        let bytes = bytemuck::bytes_of(data);
        self.buffers[0].shadow[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Switches the current camera context without rewriting the block.
    pub fn set_camera_context(&mut self, context: CameraContext) {
        self.current_camera = context;
    }

    /// Writes a mesh's dynamic block for the current camera context; the
    /// static block is only stored when the mesh was not precached.
    pub fn set_mesh(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: &mut Option<UboHandle>,
        data: &UboMesh,
        static_data: &UboStaticMesh,
    ) {
        let handle = self.ensure_handle(handle);
        let context = self.current_camera as usize;

        let (buffer, offset) = self.store_block(device, data);
        let bind = &mut self.binds[context][handle.0 as usize];
        bind.buffer = Some(buffer);
        bind.offset = offset;
        bind.struct_size = std::mem::size_of::<UboMesh>() as u32;
        bind.aligned_size = aligned_size(bind.struct_size, self.alignment);

        if !self.binds[context][handle.0 as usize].precached {
            let (buffer, offset) = self.store_block(device, static_data);
            let bind = &mut self.binds[context][handle.0 as usize];
            bind.static_buffer = Some(buffer);
            bind.static_offset = offset;
        }
    }

    /// Writes a single dynamic block for an object; the handle's bind in
    /// the Normal context tracks it.
    pub fn set_block<T: Pod>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: &mut Option<UboHandle>,
        data: &T,
    ) {
        let handle = self.ensure_handle(handle);
        let (buffer, offset) = self.store_block(device, data);
        let bind = &mut self.binds[CameraContext::Normal as usize][handle.0 as usize];
        bind.buffer = Some(buffer);
        bind.offset = offset;
        bind.struct_size = std::mem::size_of::<T>() as u32;
        bind.aligned_size = aligned_size(bind.struct_size, self.alignment);
    }

    /// Flushes every touched shadow copy to its GPU buffer, one upload
    /// per buffer.
    pub fn upload(&mut self, device: &mut dyn GraphicsDevice) {
        for i in 0..=self.buffer_index.min(self.buffers.len().saturating_sub(1)) {
            let size = if i < self.buffer_index {
                self.buffer_size as usize
            } else {
                self.cursor as usize
            };
            device.write_buffer(self.buffers[i].id, 0, &self.buffers[i].shadow[..size]);
        }
    }

    /// Binds a camera block range, suppressing redundant rebinds.
    pub fn bind_camera(&mut self, device: &mut dyn GraphicsDevice, context: CameraContext) {
        self.current_camera = context;
        if self.prev_camera_bind != Some(context) {
            self.prev_camera_bind = Some(context);
            device.bind_uniform_range(
                slots::CAMERA,
                self.buffers[0].id,
                (self.frame_asize + context as u32 * self.camera_asize) as usize,
                std::mem::size_of::<UboCamera>(),
            );
        }
    }

    /// Binds a mesh's material, dynamic, and static block ranges,
    /// suppressing rebinds when the mesh or material repeats.
    pub fn bind_mesh(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: UboHandle,
        material: StaticBind,
    ) {
        if self.prev_material_bind != Some(material) {
            self.prev_material_bind = Some(material);
            device.bind_uniform_range(
                slots::MATERIAL,
                material.buffer,
                material.offset as usize,
                std::mem::size_of::<UboMaterial>(),
            );
        }

        if self.prev_mesh_bind != Some(handle) {
            self.prev_mesh_bind = Some(handle);
            let bind = self.binds[self.current_camera as usize][handle.0 as usize];
            if let Some(buffer) = bind.buffer {
                device.bind_uniform_range(
                    slots::MESH,
                    buffer,
                    bind.offset as usize,
                    std::mem::size_of::<UboMesh>(),
                );
            }
            if let Some(buffer) = bind.static_buffer {
                device.bind_uniform_range(
                    slots::STATIC_MESH,
                    buffer,
                    bind.static_offset as usize,
                    std::mem::size_of::<UboStaticMesh>(),
                );
            }
        }
    }

    /// Binds an object's single dynamic block to an explicit slot.
    pub fn bind_block(&self, device: &mut dyn GraphicsDevice, handle: UboHandle, slot: u32) {
        let bind = self.binds[CameraContext::Normal as usize][handle.0 as usize];
        if let Some(buffer) = bind.buffer {
            device.bind_uniform_range(slot, buffer, bind.offset as usize, bind.struct_size as usize);
        }
    }

    fn ensure_handle(&mut self, handle: &mut Option<UboHandle>) -> UboHandle {
        match *handle {
            Some(h) => h,
            None => {
                let h = self.create_handle();
                *handle = Some(h);
                h
            }
        }
    }

    fn create_handle(&mut self) -> UboHandle {
        let handle = UboHandle(self.handle_counter);
        self.handle_counter += 1;
        if self.handle_counter as usize >= self.binds[0].len() {
            let new_len = self.handle_counter as usize * 2;
            debug!("UboManager: growing handle tables to {new_len}");
            for table in &mut self.binds {
                table.resize(new_len, BufferBind::default());
            }
        }
        handle
    }

    fn store_block<T: Pod>(&mut self, device: &mut dyn GraphicsDevice, data: &T) -> (BufferId, u32) {
        let bytes = bytemuck::bytes_of(data);
        let asize = aligned_size(bytes.len() as u32, self.alignment);
        self.store_data(device, bytes, asize)
    }

    /// Copies `data` into the current shadow buffer at the cursor,
    /// rolling to the next (or a freshly created) pool buffer when the
    /// current one cannot fit `asize` more bytes. Running out of space
    /// grows the pool; it is never an error.
    fn store_data(
        &mut self,
        device: &mut dyn GraphicsDevice,
        data: &[u8],
        asize: u32,
    ) -> (BufferId, u32) {
        if self.buffers.is_empty() {
            self.create_new_buffer(device);
            self.buffer_index = 0;
            self.cursor = 0;
        } else if self.buffer_size - self.cursor < asize {
            if self.buffer_index + 1 < self.buffers.len() {
                self.buffer_index += 1;
            } else {
                self.create_new_buffer(device);
                self.buffer_index = self.buffers.len() - 1;
            }
            self.cursor = 0;
        }

        let offset = self.cursor;
        let shadow = &mut self.buffers[self.buffer_index].shadow;
        shadow[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        self.cursor += asize;
        (self.buffers[self.buffer_index].id, offset)
    }

    fn create_static_buffer(&mut self, device: &mut dyn GraphicsDevice) -> BufferId {
        let id = match device.create_buffer(&BufferDescriptor {
            label: Some("ubo-static".into()),
            size: self.buffer_size as usize,
            usage: BufferUsage::Uniform,
            access: BufferAccess::Static,
        }) {
            Ok(id) => id,
            Err(err) => {
                error!("UboManager: static buffer allocation failed: {err}");
                self.static_buffers.last().copied().unwrap_or(BufferId(0))
            }
        };
        self.static_buffers.push(id);
        id
    }

    fn create_new_buffer(&mut self, device: &mut dyn GraphicsDevice) {
        let id = match device.create_buffer(&BufferDescriptor {
            label: Some("ubo-dynamic".into()),
            size: self.buffer_size as usize,
            usage: BufferUsage::Uniform,
            access: BufferAccess::Dynamic,
        }) {
            Ok(id) => id,
            Err(err) => {
                // Keep writing into the last buffer rather than aborting
                // the frame; content corrupts, the run continues.
                error!("UboManager: pool buffer allocation failed: {err}");
                self.buffers.last().map(|b| b.id).unwrap_or(BufferId(0))
            }
        };
        debug!(
            "UboManager: new dynamic pool buffer {:?} (count {})",
            id,
            self.buffers.len() + 1
        );
        self.buffers.push(DynamicBuffer {
            id,
            shadow: vec![0; self.buffer_size as usize],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::null::NullDevice;

    #[test]
    fn aligned_size_is_padded_multiple() {
        for (size, alignment) in [(1u32, 256u32), (255, 256), (256, 256), (257, 256), (64, 16)] {
            let a = aligned_size(size, alignment);
            assert!(a >= size);
            assert_eq!(a % alignment, 0);
            assert!(a - size < alignment);
        }
    }

    #[test]
    fn mesh_offsets_respect_device_alignment() {
        let mut device = NullDevice::new();
        let mut ubo = UboManager::new(&device);
        ubo.preallocate(&mut device);
        ubo.begin_frame();

        let alignment = ubo.alignment();
        let mut handle = None;
        ubo.set_mesh(
            &mut device,
            &mut handle,
            &UboMesh::default(),
            &UboStaticMesh::default(),
        );
        let bind = ubo.binds[CameraContext::Normal as usize][handle.unwrap().0 as usize];
        assert_eq!(bind.offset % alignment, 0);
        assert_eq!(bind.static_offset % alignment, 0);
        assert_eq!(bind.aligned_size % alignment, 0);
        assert!(bind.aligned_size >= bind.struct_size);
    }

    #[test]
    fn pool_rolls_over_instead_of_failing() {
        let mut device = NullDevice::new();
        let mut ubo = UboManager::new(&device);
        ubo.preallocate(&mut device);
        ubo.begin_frame();

        let preallocated = ubo.dynamic_buffer_count();
        // Write far more blocks than the preallocated pool can hold.
        let block_count = preallocated as u32 * ubo.buffer_size
            / aligned_size(std::mem::size_of::<UboMesh>() as u32, ubo.alignment())
            + 16;
        for _ in 0..block_count {
            let mut handle = None;
            ubo.set_mesh(
                &mut device,
                &mut handle,
                &UboMesh::default(),
                &UboStaticMesh::default(),
            );
        }
        assert!(ubo.dynamic_buffer_count() > preallocated);
        ubo.upload(&mut device);
    }

    #[test]
    fn precached_static_mesh_is_not_restored() {
        let mut device = NullDevice::new();
        let mut ubo = UboManager::new(&device);
        let handles = ubo.precache_static_meshes(&mut device, &[UboStaticMesh::default()]);
        ubo.preallocate(&mut device);
        ubo.begin_frame();

        let precached_bind =
            ubo.binds[CameraContext::Normal as usize][handles[0].0 as usize];
        let mut handle = Some(handles[0]);
        ubo.set_mesh(
            &mut device,
            &mut handle,
            &UboMesh::default(),
            &UboStaticMesh::default(),
        );
        let bind = ubo.binds[CameraContext::Normal as usize][handles[0].0 as usize];
        assert!(bind.precached);
        assert_eq!(bind.static_buffer, precached_bind.static_buffer);
        assert_eq!(bind.static_offset, precached_bind.static_offset);
    }

    #[test]
    fn handle_tables_grow_in_lockstep() {
        let mut device = NullDevice::new();
        let mut ubo = UboManager::new(&device);
        ubo.preallocate(&mut device);
        ubo.begin_frame();
        for _ in 0..DEFAULT_HANDLE_COUNT + 10 {
            let mut handle = None;
            ubo.set_block(&mut device, &mut handle, &UboFilter::default());
        }
        assert_eq!(ubo.binds[0].len(), ubo.binds[1].len());
        assert!(ubo.binds[0].len() > DEFAULT_HANDLE_COUNT);
    }
}
