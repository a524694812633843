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

//! Descriptors used to create GPU resources through a `GraphicsDevice`.

use super::handle::{BufferId, TextureId};
use std::borrow::Cow;

/// The primary role of a buffer. The GL backend maps this to a default
/// binding target; other backends may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex attribute data.
    Vertex,
    /// Index data.
    Index,
    /// Uniform (constant) block data, sub-allocated with aligned offsets.
    Uniform,
    /// Shader storage, written by compute passes.
    Storage,
    /// Indirect draw commands, written by compute passes.
    Indirect,
    /// Transform feedback capture target.
    TransformFeedback,
}

/// How often the buffer contents are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    /// Written once at load time (precached material and mesh blocks).
    Static,
    /// Rewritten every frame.
    Dynamic,
}

/// Describes a buffer to be created.
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Size of the buffer in bytes.
    pub size: usize,
    /// The primary role of the buffer.
    pub usage: BufferUsage,
    /// Expected update frequency.
    pub access: BufferAccess,
}

/// Pixel formats the benchmark scenes render into or sample from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA.
    Rgba8Unorm,
    /// 8-bit sRGB RGBA.
    Srgba8,
    /// 16-bit float RGBA, the HDR working format.
    Rgba16Float,
    /// Packed 11/11/10 float RGB.
    R11g11b10Float,
    /// Single-channel 8-bit.
    R8Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Whether this format is a depth (or depth/stencil) format.
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth24Stencil8 | Self::Depth32Float)
    }
}

/// Describes a 2D texture to be created.
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Width in texels of mip level 0.
    pub width: u32,
    /// Height in texels of mip level 0.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Number of mip levels to allocate (≥ 1).
    pub mip_count: u32,
    /// Multisample count (1 = single-sampled).
    pub samples: u32,
}

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest-texel sampling.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Texture coordinate wrapping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Clamp coordinates to the edge texel.
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
    /// Repeat with mirroring.
    MirroredRepeat,
}

/// Describes a sampler object.
///
/// This struct is `Eq + Hash` on purpose: it is the deduplication key of
/// the sampler cache, so two textures asking for identical sampling state
/// share one backend sampler object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Filter applied between mip levels, `None` to disable mipmapping.
    pub mip_filter: Option<FilterMode>,
    /// Wrap mode along U.
    pub wrap_u: WrapMode,
    /// Wrap mode along V.
    pub wrap_v: WrapMode,
    /// Maximum anisotropy (1 = isotropic).
    pub anisotropy: u8,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: None,
            wrap_u: WrapMode::ClampToEdge,
            wrap_v: WrapMode::ClampToEdge,
            anisotropy: 1,
        }
    }
}

/// Describes a render target: zero or more color attachments (at a chosen
/// mip level) and an optional depth attachment.
///
/// The G-buffer attaches three color textures written by one draw; depth-only
/// shadow maps attach none. Blur pyramids create one target per mip level of
/// the same color texture, so `level` is part of the descriptor rather than a
/// bind-time parameter.
#[derive(Debug, Clone)]
pub struct RenderTargetDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Color attachments, in fragment output order.
    pub colors: Vec<TextureId>,
    /// Mip level of the color attachments to render into.
    pub level: u32,
    /// The depth attachment, if any.
    pub depth: Option<TextureId>,
}

/// Per-attribute format of vertex data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Four 8-bit normalized unsigned integers.
    Unorm8x4,
}

impl VertexFormat {
    /// Size of one attribute of this format in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float32 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
            Self::Unorm8x4 => 4,
        }
    }
}

/// A single vertex attribute within a buffer layout.
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    /// Shader attribute location.
    pub location: u32,
    /// Component format.
    pub format: VertexFormat,
    /// Byte offset within one vertex.
    pub offset: u32,
    /// Instance divisor; 0 = per-vertex, 1 = per-instance.
    pub divisor: u32,
}

/// One vertex buffer and the attributes read from it.
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    /// The buffer the attributes are sourced from.
    pub buffer: BufferId,
    /// Base byte offset of vertex 0. Nonzero when vertex data sits past
    /// a GPU-written header in the same buffer.
    pub base_offset: u32,
    /// Byte stride between consecutive vertices.
    pub stride: u32,
    /// The attributes read from this buffer.
    pub attributes: Vec<VertexAttribute>,
}

/// Describes a vertex array (complete vertex input configuration).
#[derive(Debug, Clone)]
pub struct VertexArrayDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// The vertex buffers and their attribute layouts.
    pub layouts: Vec<VertexBufferLayout>,
    /// The index buffer, if indexed drawing is used.
    pub index_buffer: Option<BufferId>,
}

/// Device limits the render core must respect.
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Required alignment of uniform-range bind offsets, in bytes.
    pub uniform_offset_alignment: u32,
    /// Largest uniform block the device accepts, in bytes.
    pub max_uniform_block_size: u32,
    /// Largest supported multisample count.
    pub max_samples: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        // GLES 3.1 minimum guarantees.
        Self {
            uniform_offset_alignment: 256,
            max_uniform_block_size: 16384,
            max_samples: 4,
        }
    }
}
