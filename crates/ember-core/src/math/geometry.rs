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

//! Planes and bounding boxes, used for near-plane depth sorting.

use super::{Vec3, Vec4};

/// A plane in constant-normal form: `dot(normal, p) + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// The (not necessarily unit-length) plane normal.
    pub normal: Vec3,
    /// Distance term.
    pub d: f32,
}

impl Plane {
    /// Creates a plane from a normal and distance term.
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Signed distance of a point from the plane (positive on the normal
    /// side). This is the transparent-sort key: distance of a mesh's vertex
    /// center from the camera near plane.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.as_vec4().dot(p.extend(1.0))
    }

    /// The plane as a `(normal.xyz, d)` vector, matching the uniform layout.
    #[inline]
    pub fn as_vec4(&self) -> Vec4 {
        self.normal.extend(self.d)
    }
}

/// An axis-aligned bounding box.
///
/// Actors carry an infinite box (their skinned extents are not tracked on
/// the CPU); [`Aabb::is_infinite`] lets the transparent sort force them to
/// the front of the draw order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// A box covering everything.
    pub const INFINITE: Self = Self {
        min: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        max: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
    };

    /// Creates a box from two corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Whether any extent is unbounded.
    #[inline]
    pub fn is_infinite(&self) -> bool {
        !self.min.x.is_finite() || !self.max.x.is_finite()
    }

    /// Center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn signed_distance_sign_matches_normal_side() {
        let plane = Plane::new(Vec3::Z, 0.0);
        assert!(plane.signed_distance(Vec3::new(0.0, 0.0, 2.0)) > 0.0);
        assert!(plane.signed_distance(Vec3::new(0.0, 0.0, -2.0)) < 0.0);
        assert_relative_eq!(plane.signed_distance(Vec3::ZERO), 0.0);
    }

    #[test]
    fn infinite_aabb_is_detected() {
        assert!(Aabb::INFINITE.is_infinite());
        assert!(!Aabb::new(Vec3::ZERO, Vec3::ONE).is_infinite());
    }
}
