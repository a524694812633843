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

//! Minimal linear-algebra toolkit for the render core.
//!
//! Only the operations the renderer actually issues are implemented:
//! column-major matrices for transforms, vectors for uniform data, and a
//! plane type for near-plane depth sorting.

mod color;
mod geometry;
mod matrix;
mod vector;

pub use color::LinearRgba;
pub use geometry::{Aabb, Plane};
pub use matrix::Mat4;
pub use vector::{Vec2, Vec3, Vec4};

/// Tolerance used for approximate float comparisons across the math module.
pub const EPSILON: f32 = 1.0e-6;
