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

//! Mappings from the backend-agnostic API enums onto GL enums.

use ember_core::renderer::api::{
    BarrierBits, BufferAccess, BufferUsage, CompareFunction, Face, FilterMode, IndexFormat,
    PrimitiveTopology, TextureFormat, VertexFormat, WrapMode,
};
use gl::types::GLenum;

pub(super) fn topology(topology: PrimitiveTopology) -> GLenum {
    match topology {
        PrimitiveTopology::Points => gl::POINTS,
        PrimitiveTopology::Lines => gl::LINES,
        PrimitiveTopology::TriangleList => gl::TRIANGLES,
        PrimitiveTopology::TriangleStrip => gl::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => gl::TRIANGLE_FAN,
    }
}

pub(super) fn index_type(format: IndexFormat) -> GLenum {
    match format {
        IndexFormat::Uint16 => gl::UNSIGNED_SHORT,
        IndexFormat::Uint32 => gl::UNSIGNED_INT,
    }
}

pub(super) fn compare(func: CompareFunction) -> GLenum {
    match func {
        CompareFunction::Never => gl::NEVER,
        CompareFunction::Less => gl::LESS,
        CompareFunction::Equal => gl::EQUAL,
        CompareFunction::LessEqual => gl::LEQUAL,
        CompareFunction::Greater => gl::GREATER,
        CompareFunction::NotEqual => gl::NOTEQUAL,
        CompareFunction::GreaterEqual => gl::GEQUAL,
        CompareFunction::Always => gl::ALWAYS,
    }
}

pub(super) fn cull_face(face: Face) -> GLenum {
    match face {
        Face::Front => gl::FRONT,
        Face::Back => gl::BACK,
    }
}

pub(super) fn buffer_target(usage: BufferUsage) -> GLenum {
    match usage {
        BufferUsage::Vertex => gl::ARRAY_BUFFER,
        BufferUsage::Index => gl::ELEMENT_ARRAY_BUFFER,
        BufferUsage::Uniform => gl::UNIFORM_BUFFER,
        BufferUsage::Storage => gl::SHADER_STORAGE_BUFFER,
        BufferUsage::Indirect => gl::DRAW_INDIRECT_BUFFER,
        BufferUsage::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
    }
}

pub(super) fn access_hint(access: BufferAccess) -> GLenum {
    match access {
        BufferAccess::Static => gl::STATIC_DRAW,
        BufferAccess::Dynamic => gl::DYNAMIC_DRAW,
    }
}

pub(super) fn internal_format(format: TextureFormat) -> GLenum {
    match format {
        TextureFormat::Rgba8Unorm => gl::RGBA8,
        TextureFormat::Srgba8 => gl::SRGB8_ALPHA8,
        TextureFormat::Rgba16Float => gl::RGBA16F,
        TextureFormat::R11g11b10Float => gl::R11F_G11F_B10F,
        TextureFormat::R8Unorm => gl::R8,
        TextureFormat::Depth24Stencil8 => gl::DEPTH24_STENCIL8,
        TextureFormat::Depth32Float => gl::DEPTH_COMPONENT32F,
    }
}

pub(super) fn mag_filter(filter: FilterMode) -> GLenum {
    match filter {
        FilterMode::Nearest => gl::NEAREST,
        FilterMode::Linear => gl::LINEAR,
    }
}

pub(super) fn min_filter(filter: FilterMode, mip: Option<FilterMode>) -> GLenum {
    match (filter, mip) {
        (FilterMode::Nearest, None) => gl::NEAREST,
        (FilterMode::Linear, None) => gl::LINEAR,
        (FilterMode::Nearest, Some(FilterMode::Nearest)) => gl::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Nearest, Some(FilterMode::Linear)) => gl::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, Some(FilterMode::Nearest)) => gl::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Linear, Some(FilterMode::Linear)) => gl::LINEAR_MIPMAP_LINEAR,
    }
}

pub(super) fn wrap(mode: WrapMode) -> GLenum {
    match mode {
        WrapMode::ClampToEdge => gl::CLAMP_TO_EDGE,
        WrapMode::Repeat => gl::REPEAT,
        WrapMode::MirroredRepeat => gl::MIRRORED_REPEAT,
    }
}

/// Component count, component type and normalized flag of a vertex format.
pub(super) fn vertex_format(format: VertexFormat) -> (i32, GLenum, bool) {
    match format {
        VertexFormat::Float32 => (1, gl::FLOAT, false),
        VertexFormat::Float32x2 => (2, gl::FLOAT, false),
        VertexFormat::Float32x3 => (3, gl::FLOAT, false),
        VertexFormat::Float32x4 => (4, gl::FLOAT, false),
        VertexFormat::Unorm8x4 => (4, gl::UNSIGNED_BYTE, true),
    }
}

pub(super) fn barrier_mask(bits: BarrierBits) -> gl::types::GLbitfield {
    let mut mask = 0;
    if bits.contains(BarrierBits::SHADER_STORAGE) {
        mask |= gl::SHADER_STORAGE_BARRIER_BIT;
    }
    if bits.contains(BarrierBits::VERTEX_ATTRIB_ARRAY) {
        mask |= gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT;
    }
    if bits.contains(BarrierBits::COMMAND) {
        mask |= gl::COMMAND_BARRIER_BIT;
    }
    if bits.contains(BarrierBits::UNIFORM) {
        mask |= gl::UNIFORM_BARRIER_BIT;
    }
    if bits.contains(BarrierBits::TEXTURE_FETCH) {
        mask |= gl::TEXTURE_FETCH_BARRIER_BIT;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_mask_combines_bits() {
        let mask = barrier_mask(BarrierBits::VERTEX_ATTRIB_ARRAY | BarrierBits::COMMAND);
        assert_eq!(
            mask,
            gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT | gl::COMMAND_BARRIER_BIT
        );
        assert_eq!(barrier_mask(BarrierBits::NONE), 0);
    }

    #[test]
    fn mipped_min_filters_select_mipmap_variants() {
        assert_eq!(
            min_filter(FilterMode::Linear, Some(FilterMode::Linear)),
            gl::LINEAR_MIPMAP_LINEAR
        );
        assert_eq!(min_filter(FilterMode::Linear, None), gl::LINEAR);
    }
}
