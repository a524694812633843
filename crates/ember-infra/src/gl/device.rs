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

use std::collections::{HashMap, HashSet};
use std::ffi::CString;
use std::ptr;
use std::sync::Once;

use ember_core::math::LinearRgba;
use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, RenderError, ResourceError, ShaderError};
use gl::types::{GLchar, GLenum, GLint, GLuint};
use log::{debug, info, warn};

use super::convert;

// Core since GL 4.6 / EXT elsewhere; same value either way.
const TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FE;

static LOAD_GL: Once = Once::new();

/// The OpenGL ES graphics device.
///
/// Resource IDs handed to callers are the raw GL object names. The device
/// keeps only the bookkeeping GL itself cannot answer cheaply: the default
/// bind target of each buffer and the texture target / depth-stencil split
/// needed at attach time.
#[derive(Debug)]
pub struct GlDevice {
    limits: DeviceLimits,
    buffer_targets: HashMap<u32, GLenum>,
    texture_targets: HashMap<u32, GLenum>,
    stencil_textures: HashSet<u32>,
    tf_buffers: HashSet<u32>,
}

impl GlDevice {
    /// Creates a device on the context current on this thread.
    ///
    /// Loads GL function pointers on first use and probes device limits.
    pub fn new() -> Result<Self, RenderError> {
        LOAD_GL.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|symbol| gl_loader::get_proc_address(symbol) as *const _);
        });

        if !gl::Viewport::is_loaded() {
            return Err(RenderError::InitializationFailed(
                "could not load GL function pointers; is a context current?".to_string(),
            ));
        }

        unsafe {
            let version = gl::GetString(gl::VERSION);
            if !version.is_null() {
                info!(
                    "GL context: {}",
                    std::ffi::CStr::from_ptr(version.cast()).to_string_lossy()
                );
            }
        }

        let mut alignment: GLint = 0;
        let mut max_block: GLint = 0;
        let mut max_samples: GLint = 0;
        unsafe {
            gl::GetIntegerv(gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT, &mut alignment);
            gl::GetIntegerv(gl::MAX_UNIFORM_BLOCK_SIZE, &mut max_block);
            gl::GetIntegerv(gl::MAX_SAMPLES, &mut max_samples);
        }
        let limits = DeviceLimits {
            uniform_offset_alignment: alignment.max(1) as u32,
            max_uniform_block_size: max_block.max(16384) as u32,
            max_samples: max_samples.max(1) as u32,
        };
        debug!(
            "device limits: ubo alignment {}, max block {}, max samples {}",
            limits.uniform_offset_alignment, limits.max_uniform_block_size, limits.max_samples
        );

        Ok(Self {
            limits,
            buffer_targets: HashMap::new(),
            texture_targets: HashMap::new(),
            stencil_textures: HashSet::new(),
            tf_buffers: HashSet::new(),
        })
    }
}

fn label_of(label: &Option<std::borrow::Cow<'static, str>>) -> String {
    label
        .as_ref()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unlabeled".to_string())
}

fn compile_stage(kind: GLenum, source: &str, label: &str) -> Result<GLuint, ShaderError> {
    let shader = unsafe { gl::CreateShader(kind) };
    let c_source = CString::new(source).map_err(|_| ShaderError::CompilationError {
        label: label.to_string(),
        details: "source contains an interior NUL byte".to_string(),
    })?;
    unsafe {
        gl::ShaderSource(shader, 1, &c_source.as_ptr(), ptr::null());
        gl::CompileShader(shader);
    }

    let mut status: GLint = 0;
    unsafe { gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status) };
    if status == 0 {
        let details = shader_info_log(shader);
        unsafe { gl::DeleteShader(shader) };
        return Err(ShaderError::CompilationError {
            label: label.to_string(),
            details,
        });
    }
    Ok(shader)
}

fn shader_info_log(shader: GLuint) -> String {
    let mut len: GLint = 0;
    unsafe { gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len) };
    let mut log = vec![0u8; len.max(1) as usize];
    unsafe {
        gl::GetShaderInfoLog(shader, len, ptr::null_mut(), log.as_mut_ptr() as *mut GLchar);
    }
    String::from_utf8_lossy(&log)
        .trim_end_matches('\0')
        .trim_end()
        .to_string()
}

fn program_info_log(program: GLuint) -> String {
    let mut len: GLint = 0;
    unsafe { gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len) };
    let mut log = vec![0u8; len.max(1) as usize];
    unsafe {
        gl::GetProgramInfoLog(program, len, ptr::null_mut(), log.as_mut_ptr() as *mut GLchar);
    }
    String::from_utf8_lossy(&log)
        .trim_end_matches('\0')
        .trim_end()
        .to_string()
}

impl GraphicsDevice for GlDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::GLES31
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let target = convert::buffer_target(desc.usage);
        let mut id: GLuint = 0;
        unsafe {
            gl::GenBuffers(1, &mut id);
            gl::BindBuffer(target, id);
            gl::BufferData(
                target,
                desc.size as isize,
                ptr::null(),
                convert::access_hint(desc.access),
            );
            gl::BindBuffer(target, 0);
        }
        if id == 0 {
            return Err(ResourceError::BackendError(format!(
                "glGenBuffers failed for '{}'",
                label_of(&desc.label)
            )));
        }
        self.buffer_targets.insert(id, target);
        if desc.usage == BufferUsage::TransformFeedback {
            self.tf_buffers.insert(id);
        }
        debug!("buffer {} '{}' ({} bytes)", id, label_of(&desc.label), desc.size);
        Ok(BufferId(id))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        // Feedback buffers double as vertex input; upload through the
        // array target to avoid touching an active capture binding.
        let target = if self.tf_buffers.contains(&buffer.0) {
            gl::ARRAY_BUFFER
        } else {
            self.buffer_targets
                .get(&buffer.0)
                .copied()
                .unwrap_or(gl::ARRAY_BUFFER)
        };
        unsafe {
            gl::BindBuffer(target, buffer.0);
            gl::BufferSubData(
                target,
                offset as isize,
                data.len() as isize,
                data.as_ptr().cast(),
            );
            gl::BindBuffer(target, 0);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffer_targets.remove(&buffer.0);
        self.tf_buffers.remove(&buffer.0);
        unsafe { gl::DeleteBuffers(1, &buffer.0) };
    }

    fn bind_uniform_range(&mut self, slot: u32, buffer: BufferId, offset: usize, size: usize) {
        unsafe {
            gl::BindBufferRange(
                gl::UNIFORM_BUFFER,
                slot,
                buffer.0,
                offset as isize,
                size as isize,
            );
        }
    }

    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId) {
        unsafe { gl::BindBufferBase(gl::SHADER_STORAGE_BUFFER, slot, buffer.0) };
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let target = if desc.samples > 1 {
            gl::TEXTURE_2D_MULTISAMPLE
        } else {
            gl::TEXTURE_2D
        };
        let format = convert::internal_format(desc.format);
        let mut id: GLuint = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(target, id);
            if desc.samples > 1 {
                gl::TexStorage2DMultisample(
                    target,
                    desc.samples as i32,
                    format,
                    desc.width as i32,
                    desc.height as i32,
                    gl::TRUE,
                );
            } else {
                gl::TexStorage2D(
                    target,
                    desc.mip_count.max(1) as i32,
                    format,
                    desc.width as i32,
                    desc.height as i32,
                );
            }
            gl::BindTexture(target, 0);
        }
        if id == 0 {
            return Err(ResourceError::BackendError(format!(
                "glGenTextures failed for '{}'",
                label_of(&desc.label)
            )));
        }
        self.texture_targets.insert(id, target);
        if desc.format == TextureFormat::Depth24Stencil8 {
            self.stencil_textures.insert(id);
        }
        debug!(
            "texture {} '{}' {}x{} {:?}",
            id,
            label_of(&desc.label),
            desc.width,
            desc.height,
            desc.format
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.texture_targets.remove(&texture.0);
        self.stencil_textures.remove(&texture.0);
        unsafe { gl::DeleteTextures(1, &texture.0) };
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenSamplers(1, &mut id);
            gl::SamplerParameteri(
                id,
                gl::TEXTURE_MIN_FILTER,
                convert::min_filter(desc.min_filter, desc.mip_filter) as GLint,
            );
            gl::SamplerParameteri(
                id,
                gl::TEXTURE_MAG_FILTER,
                convert::mag_filter(desc.mag_filter) as GLint,
            );
            gl::SamplerParameteri(id, gl::TEXTURE_WRAP_S, convert::wrap(desc.wrap_u) as GLint);
            gl::SamplerParameteri(id, gl::TEXTURE_WRAP_T, convert::wrap(desc.wrap_v) as GLint);
            if desc.anisotropy > 1 {
                gl::SamplerParameterf(id, TEXTURE_MAX_ANISOTROPY, desc.anisotropy as f32);
            }
        }
        if id == 0 {
            return Err(ResourceError::BackendError(
                "glGenSamplers failed".to_string(),
            ));
        }
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&mut self, sampler: SamplerId) {
        unsafe { gl::DeleteSamplers(1, &sampler.0) };
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId, sampler: Option<SamplerId>) {
        let target = self
            .texture_targets
            .get(&texture.0)
            .copied()
            .unwrap_or(gl::TEXTURE_2D);
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(target, texture.0);
            gl::BindSampler(unit, sampler.map_or(0, |s| s.0));
        }
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError> {
        let mut fbo: GLuint = 0;
        unsafe {
            gl::GenFramebuffers(1, &mut fbo);
            gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);

            let mut draw_buffers: Vec<GLenum> = Vec::with_capacity(desc.colors.len());
            for (index, color) in desc.colors.iter().enumerate() {
                let attachment = gl::COLOR_ATTACHMENT0 + index as u32;
                let target = self
                    .texture_targets
                    .get(&color.0)
                    .copied()
                    .unwrap_or(gl::TEXTURE_2D);
                gl::FramebufferTexture2D(
                    gl::FRAMEBUFFER,
                    attachment,
                    target,
                    color.0,
                    desc.level as i32,
                );
                draw_buffers.push(attachment);
            }
            if draw_buffers.is_empty() {
                gl::DrawBuffers(1, [gl::NONE].as_ptr());
                gl::ReadBuffer(gl::NONE);
            } else {
                gl::DrawBuffers(draw_buffers.len() as i32, draw_buffers.as_ptr());
            }

            if let Some(depth) = desc.depth {
                let attachment = if self.stencil_textures.contains(&depth.0) {
                    gl::DEPTH_STENCIL_ATTACHMENT
                } else {
                    gl::DEPTH_ATTACHMENT
                };
                let target = self
                    .texture_targets
                    .get(&depth.0)
                    .copied()
                    .unwrap_or(gl::TEXTURE_2D);
                gl::FramebufferTexture2D(gl::FRAMEBUFFER, attachment, target, depth.0, 0);
            }

            let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            if status != gl::FRAMEBUFFER_COMPLETE {
                gl::DeleteFramebuffers(1, &fbo);
                return Err(ResourceError::BackendError(format!(
                    "framebuffer '{}' incomplete: 0x{status:04x}",
                    label_of(&desc.label)
                )));
            }
        }
        debug!(
            "render target {} '{}' ({} color)",
            fbo,
            label_of(&desc.label),
            desc.colors.len()
        );
        Ok(RenderTargetId(fbo))
    }

    fn destroy_render_target(&mut self, target: RenderTargetId) {
        unsafe { gl::DeleteFramebuffers(1, &target.0) };
    }

    fn bind_render_target(&mut self, target: Option<RenderTargetId>) {
        unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, target.map_or(0, |t| t.0)) };
    }

    fn blit_depth(
        &mut self,
        from: Option<RenderTargetId>,
        to: Option<RenderTargetId>,
        width: u32,
        height: u32,
    ) {
        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, from.map_or(0, |t| t.0));
            gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, to.map_or(0, |t| t.0));
            gl::BlitFramebuffer(
                0,
                0,
                width as i32,
                height as i32,
                0,
                0,
                width as i32,
                height as i32,
                gl::DEPTH_BUFFER_BIT,
                gl::NEAREST,
            );
        }
    }

    fn create_shader(&mut self, desc: &ShaderDescriptor) -> Result<ShaderId, ShaderError> {
        let label = label_of(&desc.label);
        let program = unsafe { gl::CreateProgram() };
        let mut stages: Vec<GLuint> = Vec::with_capacity(2);

        let result = (|| -> Result<(), ShaderError> {
            if let Some(source) = &desc.compute {
                stages.push(compile_stage(gl::COMPUTE_SHADER, source, &label)?);
            } else {
                let vertex = desc.vertex.as_ref().ok_or_else(|| ShaderError::LinkError {
                    label: label.clone(),
                    details: "program has neither a vertex nor a compute stage".to_string(),
                })?;
                stages.push(compile_stage(gl::VERTEX_SHADER, vertex, &label)?);
                if let Some(fragment) = &desc.fragment {
                    stages.push(compile_stage(gl::FRAGMENT_SHADER, fragment, &label)?);
                }
            }

            unsafe {
                for stage in &stages {
                    gl::AttachShader(program, *stage);
                }
            }

            if !desc.transform_feedback_varyings.is_empty() {
                let names: Vec<CString> = desc
                    .transform_feedback_varyings
                    .iter()
                    .map(|name| {
                        CString::new(name.as_str()).map_err(|_| ShaderError::LinkError {
                            label: label.clone(),
                            details: format!("varying name '{name}' contains a NUL byte"),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                let pointers: Vec<*const GLchar> = names.iter().map(|n| n.as_ptr()).collect();
                unsafe {
                    gl::TransformFeedbackVaryings(
                        program,
                        pointers.len() as i32,
                        pointers.as_ptr(),
                        gl::INTERLEAVED_ATTRIBS,
                    );
                }
            }

            unsafe { gl::LinkProgram(program) };
            let mut status: GLint = 0;
            unsafe { gl::GetProgramiv(program, gl::LINK_STATUS, &mut status) };
            if status == 0 {
                return Err(ShaderError::LinkError {
                    label: label.clone(),
                    details: program_info_log(program),
                });
            }
            Ok(())
        })();

        unsafe {
            for stage in stages {
                gl::DeleteShader(stage);
            }
        }
        if let Err(err) = result {
            unsafe { gl::DeleteProgram(program) };
            return Err(err);
        }
        debug!("shader program {program} '{label}'");
        Ok(ShaderId(program))
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        unsafe { gl::DeleteProgram(shader.0) };
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        unsafe { gl::UseProgram(shader.0) };
    }

    fn uniform_location(&self, shader: ShaderId, name: &str) -> Option<UniformLocation> {
        let c_name = CString::new(name).ok()?;
        let location = unsafe { gl::GetUniformLocation(shader.0, c_name.as_ptr()) };
        (location >= 0).then_some(UniformLocation(location))
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        unsafe {
            match value {
                UniformValue::Float(v) => gl::Uniform1f(location.0, v),
                UniformValue::Int(v) => gl::Uniform1i(location.0, v),
                UniformValue::Vec2(v) => gl::Uniform2f(location.0, v.x, v.y),
                UniformValue::Vec3(v) => gl::Uniform3f(location.0, v.x, v.y, v.z),
                UniformValue::Vec4(v) => gl::Uniform4f(location.0, v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => {
                    gl::UniformMatrix4fv(location.0, 1, gl::FALSE, m.cols.as_ptr().cast())
                }
                UniformValue::FloatArray(values) => {
                    gl::Uniform1fv(location.0, values.len() as i32, values.as_ptr())
                }
                UniformValue::Vec4Array(values) => {
                    gl::Uniform4fv(location.0, values.len() as i32, values.as_ptr().cast())
                }
            }
        }
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> Result<VertexArrayId, ResourceError> {
        let mut vao: GLuint = 0;
        unsafe {
            gl::GenVertexArrays(1, &mut vao);
            gl::BindVertexArray(vao);
            for layout in &desc.layouts {
                gl::BindBuffer(gl::ARRAY_BUFFER, layout.buffer.0);
                for attribute in &layout.attributes {
                    let (components, component_type, normalized) =
                        convert::vertex_format(attribute.format);
                    gl::EnableVertexAttribArray(attribute.location);
                    gl::VertexAttribPointer(
                        attribute.location,
                        components,
                        component_type,
                        if normalized { gl::TRUE } else { gl::FALSE },
                        layout.stride as i32,
                        (layout.base_offset as usize + attribute.offset as usize) as *const _,
                    );
                    gl::VertexAttribDivisor(attribute.location, attribute.divisor);
                }
            }
            if let Some(index_buffer) = desc.index_buffer {
                gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, index_buffer.0);
            }
            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
        }
        if vao == 0 {
            return Err(ResourceError::BackendError(format!(
                "glGenVertexArrays failed for '{}'",
                label_of(&desc.label)
            )));
        }
        Ok(VertexArrayId(vao))
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        unsafe { gl::DeleteVertexArrays(1, &vertex_array.0) };
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        unsafe { gl::BindVertexArray(vertex_array.0) };
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { gl::Viewport(x, y, width as i32, height as i32) };
    }

    fn set_depth_state(&mut self, test: bool, write: bool, func: CompareFunction) {
        unsafe {
            if test {
                gl::Enable(gl::DEPTH_TEST);
                gl::DepthFunc(convert::compare(func));
            } else {
                gl::Disable(gl::DEPTH_TEST);
            }
            gl::DepthMask(if write { gl::TRUE } else { gl::FALSE });
        }
    }

    fn set_cull(&mut self, face: Option<Face>) {
        unsafe {
            match face {
                Some(face) => {
                    gl::Enable(gl::CULL_FACE);
                    gl::CullFace(convert::cull_face(face));
                }
                None => gl::Disable(gl::CULL_FACE),
            }
        }
    }

    fn set_color_mask(&mut self, enabled: bool) {
        let flag = if enabled { gl::TRUE } else { gl::FALSE };
        unsafe { gl::ColorMask(flag, flag, flag, flag) };
    }

    fn set_blend(&mut self, mode: BlendMode) {
        unsafe {
            match mode {
                BlendMode::Opaque => gl::Disable(gl::BLEND),
                BlendMode::Alpha => {
                    gl::Enable(gl::BLEND);
                    gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
                }
                BlendMode::Additive => {
                    gl::Enable(gl::BLEND);
                    gl::BlendFunc(gl::ONE, gl::ONE);
                }
            }
        }
    }

    fn set_rasterizer_discard(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                gl::Enable(gl::RASTERIZER_DISCARD);
            } else {
                gl::Disable(gl::RASTERIZER_DISCARD);
            }
        }
    }

    fn clear(&mut self, color: Option<LinearRgba>, depth: Option<f32>) {
        let mut mask = 0;
        unsafe {
            if let Some(color) = color {
                gl::ClearColor(color.r, color.g, color.b, color.a);
                mask |= gl::COLOR_BUFFER_BIT;
            }
            if let Some(depth) = depth {
                // Depth clears go through the write mask.
                gl::DepthMask(gl::TRUE);
                gl::ClearDepthf(depth);
                mask |= gl::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                gl::Clear(mask);
            }
        }
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32) {
        unsafe { gl::DrawArrays(convert::topology(topology), first as i32, count as i32) };
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
    ) {
        unsafe {
            gl::DrawElements(
                convert::topology(topology),
                count as i32,
                convert::index_type(format),
                offset as *const _,
            );
        }
    }

    fn draw_arrays_instanced(
        &mut self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    ) {
        unsafe {
            gl::DrawArraysInstanced(
                convert::topology(topology),
                first as i32,
                count as i32,
                instances as i32,
            );
        }
    }

    fn draw_elements_instanced(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
        instances: u32,
    ) {
        unsafe {
            gl::DrawElementsInstanced(
                convert::topology(topology),
                count as i32,
                convert::index_type(format),
                offset as *const _,
                instances as i32,
            );
        }
    }

    fn draw_arrays_indirect(&mut self, topology: PrimitiveTopology, buffer: BufferId, offset: usize) {
        unsafe {
            gl::BindBuffer(gl::DRAW_INDIRECT_BUFFER, buffer.0);
            gl::DrawArraysIndirect(convert::topology(topology), offset as *const _);
            gl::BindBuffer(gl::DRAW_INDIRECT_BUFFER, 0);
        }
    }

    fn bind_transform_feedback_buffer(&mut self, slot: u32, buffer: BufferId) {
        unsafe { gl::BindBufferBase(gl::TRANSFORM_FEEDBACK_BUFFER, slot, buffer.0) };
    }

    fn begin_transform_feedback(&mut self, topology: PrimitiveTopology) {
        unsafe { gl::BeginTransformFeedback(convert::topology(topology)) };
    }

    fn end_transform_feedback(&mut self) {
        unsafe { gl::EndTransformFeedback() };
    }

    fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        unsafe { gl::DispatchCompute(groups_x, groups_y, groups_z) };
    }

    fn memory_barrier(&mut self, bits: BarrierBits) {
        let mask = convert::barrier_mask(bits);
        if mask != 0 {
            unsafe { gl::MemoryBarrier(mask) };
        }
    }

    fn create_query(&mut self) -> Result<QueryId, ResourceError> {
        let mut id: GLuint = 0;
        unsafe { gl::GenQueries(1, &mut id) };
        if id == 0 {
            return Err(ResourceError::BackendError(
                "glGenQueries failed".to_string(),
            ));
        }
        Ok(QueryId(id))
    }

    fn destroy_query(&mut self, query: QueryId) {
        unsafe { gl::DeleteQueries(1, &query.0) };
    }

    fn begin_query(&mut self, query: QueryId) {
        unsafe { gl::BeginQuery(gl::ANY_SAMPLES_PASSED, query.0) };
    }

    fn end_query(&mut self) {
        unsafe { gl::EndQuery(gl::ANY_SAMPLES_PASSED) };
    }

    fn query_result_available(&self, query: QueryId) -> bool {
        let mut available: GLuint = 0;
        unsafe { gl::GetQueryObjectuiv(query.0, gl::QUERY_RESULT_AVAILABLE, &mut available) };
        available != 0
    }

    fn query_result(&self, query: QueryId) -> u32 {
        let mut result: GLuint = 0;
        unsafe { gl::GetQueryObjectuiv(query.0, gl::QUERY_RESULT, &mut result) };
        result
    }

    fn flush(&mut self) {
        unsafe { gl::Flush() };
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        if !self.buffer_targets.is_empty() || !self.texture_targets.is_empty() {
            warn!(
                "device dropped with {} buffers and {} textures still alive",
                self.buffer_targets.len(),
                self.texture_targets.len()
            );
        }
    }
}
