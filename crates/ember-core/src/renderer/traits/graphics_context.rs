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

use crate::renderer::error::RenderError;

/// The graphics API family a context was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// OpenGL ES 3.x.
    OpenGlEs,
    /// The recording no-op backend used by tests and headless probes.
    Null,
}

/// A presentable graphics context, owned by the embedding application.
///
/// The benchmark core consumes this interface but never implements the
/// platform side (EGL, surfaces, window systems); the harness is handed a
/// ready-made context.
pub trait GraphicsContext {
    /// Makes the context current on the calling thread.
    fn make_current(&mut self) -> Result<(), RenderError>;

    /// Releases the context from the calling thread.
    fn detach_thread(&mut self);

    /// Presents the back buffer.
    fn swap_buffers(&mut self) -> Result<(), RenderError>;

    /// The API family of this context.
    fn backend_type(&self) -> BackendType;

    /// Major version of the context.
    fn version_major(&self) -> u32;

    /// Minor version of the context.
    fn version_minor(&self) -> u32;

    /// Whether the context meets a minimum version requirement.
    fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.version_major(), self.version_minor()) >= (major, minor)
    }
}
