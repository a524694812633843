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

//! Fixed-function pipeline state enums and memory barrier flags.

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// One point per vertex (particle advect draws).
    Points,
    /// Independent line segments.
    Lines,
    /// Independent triangles.
    TriangleList,
    /// A strip of triangles (full-screen quads).
    TriangleStrip,
    /// A fan of triangles (instanced particle quads).
    TriangleFan,
}

/// Index element width for indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes when incoming depth is less.
    Less,
    /// Passes when depths are equal.
    Equal,
    /// Passes when incoming depth is less or equal.
    LessEqual,
    /// Passes when incoming depth is greater. Used with front-face culling
    /// to shade light volumes the camera sits inside of.
    Greater,
    /// Passes when depths differ.
    NotEqual,
    /// Passes when incoming depth is greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Which triangle faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    /// Cull front faces (light volume passes).
    Front,
    /// Cull back faces (the common case).
    Back,
}

/// Framebuffer blend mode. The deferred pipeline only ever needs these
/// three fixed configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blending disabled.
    Opaque,
    /// Classic `src_alpha / one_minus_src_alpha` blending.
    Alpha,
    /// Additive `one / one` blending (light accumulation).
    Additive,
}

/// Memory barrier flags for ordering compute writes against later reads.
///
/// Each constant corresponds to one `glMemoryBarrier` bit on the GL
/// backend; the null backend records and ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierBits {
    bits: u32,
}

impl BarrierBits {
    /// No barrier.
    pub const NONE: Self = Self { bits: 0 };
    /// Shader storage buffer writes become visible.
    pub const SHADER_STORAGE: Self = Self { bits: 1 << 0 };
    /// Buffer writes become visible to vertex attribute fetches.
    pub const VERTEX_ATTRIB_ARRAY: Self = Self { bits: 1 << 1 };
    /// Buffer writes become visible to indirect command fetches.
    pub const COMMAND: Self = Self { bits: 1 << 2 };
    /// Buffer writes become visible to uniform reads.
    pub const UNIFORM: Self = Self { bits: 1 << 3 };
    /// Image/buffer writes become visible to texture fetches.
    pub const TEXTURE_FETCH: Self = Self { bits: 1 << 4 };

    /// Creates a set of barrier flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks whether all bits of `other` are set in `self`.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks whether no bits are set.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl std::ops::BitOr for BarrierBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for BarrierBits {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_bits_union_and_contains() {
        let combined = BarrierBits::VERTEX_ATTRIB_ARRAY | BarrierBits::COMMAND;
        assert!(combined.contains(BarrierBits::VERTEX_ATTRIB_ARRAY));
        assert!(combined.contains(BarrierBits::COMMAND));
        assert!(!combined.contains(BarrierBits::SHADER_STORAGE));
        assert!(BarrierBits::NONE.is_empty());
    }
}
