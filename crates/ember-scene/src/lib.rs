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

//! # Ember Scene
//!
//! The deferred-shading render core of the emberbench benchmark: uniform
//! block sub-allocation, full-screen filters, transform-feedback
//! particles, compute lightning, light volumes with lens-flare occlusion
//! queries, and the [`scene::SceneRenderer`] orchestrator that runs the
//! fixed stage pipeline over a [`scene::Scene`].
//!
//! Everything here talks to the GPU through the backend-agnostic
//! [`ember_core::renderer::GraphicsDevice`] trait; no GL (or any other
//! API) types appear in this crate.

#![warn(missing_docs)]

pub mod filter;
pub mod light;
pub mod lightning;
pub mod material;
pub mod mesh;
pub mod particles;
pub mod scene;
pub mod texture;
pub mod ubo;

pub use scene::{RendererConfig, Scene, SceneCamera, SceneRenderer, ShaderSources};
