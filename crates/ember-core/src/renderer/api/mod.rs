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

//! The backend-agnostic renderer API: handles, descriptors, state enums,
//! capability flags, and frame statistics.

mod bits;
mod caps;
mod descriptor;
mod handle;
mod shader;
mod state;
mod stats;

pub use bits::RenderBits;
pub use caps::{BackendCapabilities, StageRequirement};
pub use descriptor::{
    BufferAccess, BufferDescriptor, BufferUsage, DeviceLimits, FilterMode, RenderTargetDescriptor,
    SamplerDescriptor, TextureDescriptor, TextureFormat, VertexArrayDescriptor, VertexAttribute,
    VertexBufferLayout, VertexFormat, WrapMode,
};
pub use handle::{
    BufferId, QueryId, RenderTargetId, SamplerId, ShaderId, TextureId, VertexArrayId,
};
pub use shader::{ShaderDescriptor, UniformLocation, UniformValue};
pub use state::{BarrierBits, BlendMode, CompareFunction, Face, IndexFormat, PrimitiveTopology};
pub use stats::{RenderStage, RenderStats};
