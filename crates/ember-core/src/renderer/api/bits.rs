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

//! Render feature flags used to mask individual pipeline stages.

/// A bit set of render features.
///
/// The test configuration carries a `disabled_render_bits` mask; the scene
/// orchestrator skips any stage whose feature bit is disabled. Disabling a
/// feature that other stages depend on (e.g. `SHADOW_DEPTH`) degrades
/// those stages rather than crashing: the shadow-decal blend requires both
/// `SHADOW_DEPTH` and `SHADOW_DECAL`, and lighting samples a cleared
/// shadow map when the depth pass is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderBits {
    bits: u32,
}

impl RenderBits {
    /// No features.
    pub const NONE: Self = Self { bits: 0 };
    /// The shadow-map depth pre-pass.
    pub const SHADOW_DEPTH: Self = Self { bits: 1 << 0 };
    /// Opaque geometry into the G-buffer.
    pub const GBUFFER_SOLIDS: Self = Self { bits: 1 << 1 };
    /// Particle simulation and rendering.
    pub const PARTICLES: Self = Self { bits: 1 << 2 };
    /// Deferred light volume accumulation.
    pub const LIGHTING: Self = Self { bits: 1 << 3 };
    /// Sky dome.
    pub const SKY: Self = Self { bits: 1 << 4 };
    /// Screen-space shadow decal blend.
    pub const SHADOW_DECAL: Self = Self { bits: 1 << 5 };
    /// Forward decal geometry.
    pub const DECALS: Self = Self { bits: 1 << 6 };
    /// Sorted transparent geometry.
    pub const TRANSPARENTS: Self = Self { bits: 1 << 7 };
    /// Lens flare occlusion queries.
    pub const LENS_FLARE_QUERY: Self = Self { bits: 1 << 8 };
    /// Lens flare sprites.
    pub const LENS_FLARES: Self = Self { bits: 1 << 9 };
    /// Radial light shafts.
    pub const LIGHT_SHAFTS: Self = Self { bits: 1 << 10 };
    /// The post-processing chain. When disabled the combine pass renders
    /// straight to the default framebuffer and the G-buffer depth is
    /// blitted out explicitly.
    pub const POST: Self = Self { bits: 1 << 11 };
    /// Compute-simulated lightning bolts.
    pub const COMPUTE_LIGHTNING: Self = Self { bits: 1 << 12 };
    /// Compute-based depth of field.
    pub const COMPUTE_DOF: Self = Self { bits: 1 << 13 };
    /// Planar reflection pre-pass.
    pub const PLANAR_REFLECTION: Self = Self { bits: 1 << 14 };
    /// All features.
    pub const ALL: Self = Self {
        bits: (1 << 15) - 1,
    };

    /// Creates a set of render bits from raw bits.
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

    /// Removes the bits of `other` from `self`.
    pub const fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
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

impl std::ops::BitOr for RenderBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for RenderBits {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_feature() {
        assert!(RenderBits::ALL.contains(RenderBits::SHADOW_DEPTH));
        assert!(RenderBits::ALL.contains(RenderBits::PLANAR_REFLECTION));
        assert!(RenderBits::ALL.contains(RenderBits::POST | RenderBits::LIGHTING));
    }

    #[test]
    fn difference_removes_bits() {
        let enabled = RenderBits::ALL.difference(RenderBits::PARTICLES);
        assert!(!enabled.contains(RenderBits::PARTICLES));
        assert!(enabled.contains(RenderBits::LIGHTING));
    }
}
