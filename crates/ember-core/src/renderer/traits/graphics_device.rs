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

use crate::math::LinearRgba;
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};

/// The command interface every graphics backend implements.
///
/// Command submission is single-threaded: all calls happen from the render
/// thread, so the trait takes `&mut self` and implementations keep plain
/// mutable state. Resource creation returns `Result` and is only done at
/// load/init time; per-frame methods are infallible by contract — a
/// backend hitting an error mid-frame logs it and degrades rather than
/// aborting the run.
pub trait GraphicsDevice: std::fmt::Debug {
    /// Device limits the caller must respect when sub-allocating.
    fn limits(&self) -> DeviceLimits;

    /// Features this backend supports, probed at init.
    fn capabilities(&self) -> BackendCapabilities;

    // --- Buffers ---

    /// Creates a buffer.
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Writes bytes into a buffer at a byte offset.
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);

    /// Destroys a buffer.
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Binds a sub-range of a buffer to an indexed uniform slot. `offset`
    /// must be a multiple of [`DeviceLimits::uniform_offset_alignment`].
    fn bind_uniform_range(&mut self, slot: u32, buffer: BufferId, offset: usize, size: usize);

    /// Binds a whole buffer to an indexed shader-storage slot.
    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId);

    // --- Textures and samplers ---

    /// Creates a texture.
    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&mut self, texture: TextureId);

    /// Creates a sampler object.
    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler object.
    fn destroy_sampler(&mut self, sampler: SamplerId);

    /// Binds a texture (and optionally a sampler) to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: TextureId, sampler: Option<SamplerId>);

    // --- Render targets ---

    /// Creates a render target from existing attachments.
    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError>;

    /// Destroys a render target (not its attachments).
    fn destroy_render_target(&mut self, target: RenderTargetId);

    /// Binds a render target for drawing; `None` binds the default
    /// framebuffer.
    fn bind_render_target(&mut self, target: Option<RenderTargetId>);

    /// Copies the depth attachment of `from` into `to` (`None` = default
    /// framebuffer). Used when the post chain is disabled and later
    /// forward passes need the G-buffer depth on screen.
    fn blit_depth(&mut self, from: Option<RenderTargetId>, to: Option<RenderTargetId>, width: u32, height: u32);

    // --- Shaders and uniforms ---

    /// Compiles and links a shader program.
    fn create_shader(&mut self, desc: &ShaderDescriptor) -> Result<ShaderId, ShaderError>;

    /// Destroys a shader program.
    fn destroy_shader(&mut self, shader: ShaderId);

    /// Makes a shader program current.
    fn bind_shader(&mut self, shader: ShaderId);

    /// Resolves a loose uniform by name. Returns `None` when the program
    /// does not use the uniform; callers skip the associated binding work.
    fn uniform_location(&self, shader: ShaderId, name: &str) -> Option<UniformLocation>;

    /// Sets a loose uniform on the currently bound program.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    // --- Vertex input ---

    /// Creates a vertex array from a complete input layout.
    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> Result<VertexArrayId, ResourceError>;

    /// Destroys a vertex array (not the buffers it references).
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Binds a vertex array for subsequent draws.
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    // --- Fixed-function state ---

    /// Sets the viewport rectangle.
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Configures the depth test and write mask.
    fn set_depth_state(&mut self, test: bool, write: bool, func: CompareFunction);

    /// Sets face culling; `None` disables it.
    fn set_cull(&mut self, face: Option<Face>);

    /// Enables or disables color channel writes. Occlusion query draws
    /// run with writes off so the probe geometry never shows.
    fn set_color_mask(&mut self, enabled: bool);

    /// Sets the framebuffer blend mode.
    fn set_blend(&mut self, mode: BlendMode);

    /// Enables or disables rasterizer discard (transform-feedback advect
    /// passes produce no fragments).
    fn set_rasterizer_discard(&mut self, enabled: bool);

    /// Clears the bound render target.
    fn clear(&mut self, color: Option<LinearRgba>, depth: Option<f32>);

    // --- Draws ---

    /// Draws non-indexed vertices.
    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32);

    /// Draws indexed vertices.
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
    );

    /// Draws non-indexed vertices, instanced.
    fn draw_arrays_instanced(
        &mut self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    );

    /// Draws indexed vertices, instanced.
    fn draw_elements_instanced(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
        instances: u32,
    );

    /// Draws with parameters fetched from a GPU-written command in
    /// `buffer` at `offset`. The CPU never observes the command.
    fn draw_arrays_indirect(&mut self, topology: PrimitiveTopology, buffer: BufferId, offset: usize);

    // --- Transform feedback ---

    /// Binds a buffer to an indexed transform-feedback capture slot.
    fn bind_transform_feedback_buffer(&mut self, slot: u32, buffer: BufferId);

    /// Begins capturing vertex outputs.
    fn begin_transform_feedback(&mut self, topology: PrimitiveTopology);

    /// Ends capturing vertex outputs.
    fn end_transform_feedback(&mut self);

    // --- Compute ---

    /// Dispatches a compute grid.
    fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);

    /// Orders prior shader writes against subsequent reads of the given
    /// kinds.
    fn memory_barrier(&mut self, bits: BarrierBits);

    // --- Occlusion queries ---

    /// Creates an any-samples-passed query object.
    fn create_query(&mut self) -> Result<QueryId, ResourceError>;

    /// Destroys a query object.
    fn destroy_query(&mut self, query: QueryId);

    /// Begins an occlusion query scope.
    fn begin_query(&mut self, query: QueryId);

    /// Ends the active occlusion query scope.
    fn end_query(&mut self);

    /// Whether a query's result can be read without stalling.
    fn query_result_available(&self, query: QueryId) -> bool;

    /// Reads a query result (1 = samples passed). Callers only read
    /// results that reported available.
    fn query_result(&self, query: QueryId) -> u32;

    // --- Submission ---

    /// Flushes queued commands to the driver without waiting for them.
    fn flush(&mut self);
}
