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

//! Defines the `Mat4` type and the operations the render core needs.

use super::{Vec3, Vec4};
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Column-major matches both the GL uniform upload convention and the
/// layout the uniform-buffer blocks are declared with, so a `Mat4` can be
/// memcpy'd into a constant block directly.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[3]` carries the translation.
    pub cols: [Vec4; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };

    /// A 4x4 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO; 4],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = t.extend(1.0);
        m
    }

    /// Creates a non-uniform scaling matrix.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Returns the translation part of the matrix.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// Transforms a point (assumes `w = 1`), performing the perspective
    /// divide if the matrix has a projective part.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let v = *self * p.extend(1.0);
        if v.w.abs() > super::EPSILON && (v.w - 1.0).abs() > super::EPSILON {
            Vec3::new(v.x / v.w, v.y / v.w, v.z / v.w)
        } else {
            v.truncate()
        }
    }

    /// Transforms a direction (assumes `w = 0`; ignores translation).
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        (*self * d.extend(0.0)).truncate()
    }

    /// Returns the transpose of the matrix.
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// Inverts an affine transform (rotation/scale + translation, no
    /// projective part). This is the only inverse the renderer needs: the
    /// `inv_model` and `inv_modelview` constant blocks are built from world
    /// and view matrices, which are always affine.
    pub fn invert_affine(&self) -> Self {
        // Invert the upper-left 3x3 via the adjugate.
        let a = self.cols[0].truncate();
        let b = self.cols[1].truncate();
        let c = self.cols[2].truncate();

        let r0 = b.cross(c);
        let r1 = c.cross(a);
        let r2 = a.cross(b);

        let det = a.dot(r0);
        let inv_det = if det.abs() <= super::EPSILON {
            0.0
        } else {
            1.0 / det
        };

        let r0 = r0 * inv_det;
        let r1 = r1 * inv_det;
        let r2 = r2 * inv_det;

        let t = self.translation();
        Self::from_cols(
            Vec4::new(r0.x, r1.x, r2.x, 0.0),
            Vec4::new(r0.y, r1.y, r2.y, 0.0),
            Vec4::new(r0.z, r1.z, r2.z, 0.0),
            Vec4::new(-r0.dot(t), -r1.dot(t), -r2.dot(t), 1.0),
        )
    }
}

impl Vec4 {
    #[inline]
    fn get(self, index: usize) -> f32 {
        match index {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }
}

impl Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut cols = [Vec4::ZERO; 4];
        for (i, col) in cols.iter_mut().enumerate() {
            *col = self * rhs.cols[i];
        }
        Self { cols }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    fn mul(self, v: Vec4) -> Vec4 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z + self.cols[3] * v.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_is_noop() {
        let p = Vec3::new(1.0, -2.0, 3.0);
        assert_eq!(Mat4::IDENTITY.transform_point(p), p);
    }

    #[test]
    fn translation_roundtrip_through_affine_inverse() {
        let m = Mat4::from_translation(Vec3::new(5.0, -3.0, 2.0))
            * Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let inv = m.invert_affine();
        let p = Vec3::new(0.5, 1.5, -4.0);
        let q = inv.transform_point(m.transform_point(p));
        assert_relative_eq!(q.x, p.x, epsilon = 1.0e-5);
        assert_relative_eq!(q.y, p.y, epsilon = 1.0e-5);
        assert_relative_eq!(q.z, p.z, epsilon = 1.0e-5);
    }

    #[test]
    fn matrix_product_applies_right_to_left() {
        let t = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let s = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        // (t * s) scales first, then translates.
        let p = (t * s).transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 3.0);
    }
}
