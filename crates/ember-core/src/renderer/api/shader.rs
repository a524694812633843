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

//! Shader program descriptors and the loose-uniform value protocol.

use crate::math::{Mat4, Vec2, Vec3, Vec4};
use std::borrow::Cow;

/// Describes a shader program to be compiled and linked.
///
/// Either `compute` is set (compute program) or `vertex` is, optionally
/// with `fragment` (a transform-feedback advect program has no fragment
/// stage).
#[derive(Debug, Clone, Default)]
pub struct ShaderDescriptor {
    /// An optional debug label, reported in compile/link errors.
    pub label: Option<Cow<'static, str>>,
    /// Vertex stage source.
    pub vertex: Option<String>,
    /// Fragment stage source.
    pub fragment: Option<String>,
    /// Compute stage source.
    pub compute: Option<String>,
    /// Output varyings to capture with transform feedback, in interleaved
    /// order. Empty for ordinary programs.
    pub transform_feedback_varyings: Vec<String>,
}

/// A resolved location of a loose (non-block) uniform within a program.
///
/// Locations are only handed out for uniforms the compiled program
/// actually declares and uses: `uniform_location` returns `None` for
/// anything the compiler optimized away, and callers skip the
/// corresponding work. Full-screen filters rely on this to bind only the
/// inputs a given shader reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation(pub i32);

/// A value for a loose uniform.
///
/// Array variants borrow their data; a whole frame's substep headers go
/// to the GPU through one `Vec4Array` set without an intermediate copy.
#[derive(Debug, Clone, Copy)]
pub enum UniformValue<'a> {
    /// A single float.
    Float(f32),
    /// A single signed integer (also used for sampler units).
    Int(i32),
    /// A 2-component float vector.
    Vec2(Vec2),
    /// A 3-component float vector.
    Vec3(Vec3),
    /// A 4-component float vector.
    Vec4(Vec4),
    /// A 4x4 column-major matrix.
    Mat4(Mat4),
    /// An array of floats.
    FloatArray(&'a [f32]),
    /// An array of 4-component vectors.
    Vec4Array(&'a [Vec4]),
}
