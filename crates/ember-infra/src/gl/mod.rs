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

//! The OpenGL ES backend.
//!
//! [`GlDevice`] is a thin, stateless-as-possible mapping from the
//! [`ember_core::renderer::GraphicsDevice`] commands onto GL calls. It
//! assumes a GL ES 3.1 (or compatible desktop) context is already
//! current on the calling thread; context and surface management belong
//! to the embedding application.

mod convert;
mod device;

pub use device::GlDevice;
