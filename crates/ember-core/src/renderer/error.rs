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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Init- and configuration-time failures travel up this hierarchy as
//! `Result`s. Per-frame hot-path code performs no error checking: a degraded
//! frame is preferred to an aborted benchmark run.

use crate::renderer::api::ShaderId;
use std::fmt;

/// An error related to the creation, loading, or compilation of a shader.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while trying to load the shader source from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// The shader source failed to compile into a backend-specific module.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The compiled stages failed to link into a program.
    LinkError {
        /// A descriptive label for the program, if available.
        label: String,
        /// Detailed error messages from the linker.
        details: String,
    },
    /// The requested shader could not be found.
    NotFound {
        /// The ID of the shader that was not found.
        id: ShaderId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(
                    f,
                    "Failed to load shader source from '{path}': {source_error}"
                )
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::LinkError { label, details } => {
                write!(f, "Shader link failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The requested texture format is not supported by the device.
    UnsupportedFormat(String),
    /// An error originating from the specific graphics backend.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::UnsupportedFormat(msg) => {
                write!(f, "Unsupported texture format: {msg}")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A high-level error surfaced by the render orchestrator or device.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the renderer was initialized.
    NotInitialized,
    /// A failure occurred during initialization of the graphics backend.
    InitializationFailed(String),
    /// The requested anti-aliasing sample count is not available.
    FsaaUnsupported {
        /// Samples per pixel that were requested.
        requested: u32,
    },
    /// The context version is too old for the selected scene pipeline.
    IncompatibleContextVersion {
        /// Major/minor version required by the pipeline.
        required: (u32, u32),
        /// Major/minor version reported by the context.
        actual: (u32, u32),
    },
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::FsaaUnsupported { requested } => {
                write!(f, "Requested FSAA sample count {requested} is unsupported.")
            }
            RenderError::IncompatibleContextVersion { required, actual } => {
                write!(
                    f,
                    "Context version {}.{} is below the required {}.{}.",
                    actual.0, actual.1, required.0, required.1
                )
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(ResourceError::Shader(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "lighting_omni".to_string(),
            details: "ERROR: 0:12: 'foo' undeclared".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'lighting_omni': ERROR: 0:12: 'foo' undeclared"
        );
    }

    #[test]
    fn render_error_chains_sources() {
        let shader_err = ShaderError::NotFound { id: ShaderId(7) };
        let res_err: ResourceError = shader_err.into();
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Shader not found for ID: ShaderId(7)"
        );
        assert!(render_err.source().unwrap().source().is_some());
    }
}
