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

//! Materials shared by mesh instances.
//!
//! A material owns no geometry; many meshes reference the same material
//! by index into the scene's registry. Its shader table is indexed by
//! `[pass bank][mesh kind]` so a skinned mesh picks a different program
//! than a static mesh in the same pass, and its constant block is
//! written once into a static uniform buffer at precache time.

use ember_core::math::{Vec2, Vec4};
use ember_core::renderer::api::{SamplerId, ShaderId, TextureId};

use crate::ubo::{StaticBind, UboHandle, UboMaterial, UboTranslateUv};

/// Texture slots a material can bind.
pub const MATERIAL_TEXTURE_SLOTS: usize = 6;

/// How a mesh's vertices are transformed, set at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MeshKind {
    /// World-static geometry.
    Static = 0,
    /// Skeleton-skinned geometry (actors).
    Skinned = 1,
    /// Members of a GPU-instanced batch.
    InstancedBatch = 2,
}

impl MeshKind {
    /// Number of mesh kinds.
    pub const COUNT: usize = 3;
}

/// The shader bank a pass selects programs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PassBank {
    /// G-buffer attribute output.
    GBuffer = 0,
    /// Shadow-map depth only.
    ShadowDepth = 1,
    /// Forward-shaded transparents and decals.
    Forward = 2,
    /// Planar reflection color.
    Reflection = 3,
}

impl PassBank {
    /// Number of shader banks.
    pub const COUNT: usize = 4;
}

/// A UV scroll track for conveyor-style materials.
#[derive(Debug, Clone, Copy)]
pub struct UvScrollTrack {
    /// UV units scrolled per second.
    pub velocity: Vec2,
}

impl UvScrollTrack {
    /// The translate-UV block at a scene time.
    pub fn block_at(&self, time_sec: f32) -> UboTranslateUv {
        UboTranslateUv {
            translate_uv: Vec4::new(
                (self.velocity.x * time_sec).fract(),
                (self.velocity.y * time_sec).fract(),
                0.0,
                0.0,
            ),
        }
    }
}

/// A shared surface description.
#[derive(Debug)]
pub struct Material {
    /// Material name from the scene file.
    pub name: String,
    /// Shader per `[pass bank][mesh kind]`; `None` means the material
    /// does not participate in that pass.
    pub shaders: [[Option<ShaderId>; MeshKind::COUNT]; PassBank::COUNT],
    /// Bound textures and their samplers per slot.
    pub textures: [Option<(TextureId, Option<SamplerId>)>; MATERIAL_TEXTURE_SLOTS],

    /// Diffuse intensity.
    pub diffuse_intensity: f32,
    /// Specular intensity.
    pub specular_intensity: f32,
    /// Specular exponent.
    pub specular_exponent: f32,
    /// Environment reflection intensity.
    pub reflect_intensity: f32,
    /// Alpha of forward-blended draws; 1.0 = opaque.
    pub transparency: f32,
    /// Fresnel bias/scale/power.
    pub fresnel: (f32, f32, f32),

    /// Optional UV scroll animation.
    pub uv_scroll: Option<UvScrollTrack>,
    /// Handle for the translate-UV block, written per frame when the
    /// material scrolls.
    pub translate_handle: Option<UboHandle>,

    /// Precached location of the material block, filled by
    /// `UboManager::precache_materials`.
    pub static_bind: Option<StaticBind>,
}

impl Material {
    /// Creates a material with neutral parameters and no shaders bound.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shaders: [[None; MeshKind::COUNT]; PassBank::COUNT],
            textures: [None; MATERIAL_TEXTURE_SLOTS],
            diffuse_intensity: 1.0,
            specular_intensity: 0.0,
            specular_exponent: 16.0,
            reflect_intensity: 0.0,
            transparency: 1.0,
            fresnel: (0.0, 1.0, 1.0),
            uv_scroll: None,
            translate_handle: None,
            static_bind: None,
        }
    }

    /// Whether forward blending is needed for this material.
    pub fn is_transparent(&self) -> bool {
        self.transparency < 1.0
    }

    /// The shader for one pass and mesh kind.
    pub fn shader(&self, bank: PassBank, kind: MeshKind) -> Option<ShaderId> {
        self.shaders[bank as usize][kind as usize]
    }

    /// Assigns a shader for one pass across all mesh kinds that do not
    /// already have a more specific program.
    pub fn set_pass_shader(&mut self, bank: PassBank, shader: ShaderId) {
        for slot in &mut self.shaders[bank as usize] {
            if slot.is_none() {
                *slot = Some(shader);
            }
        }
    }

    /// The material constant block, precached at load.
    pub fn material_block(&self) -> UboMaterial {
        UboMaterial {
            fresnel_transparency: Vec4::new(
                self.fresnel.0,
                self.fresnel.1,
                self.fresnel.2,
                self.transparency,
            ),
            params: Vec4::new(
                self.diffuse_intensity,
                self.specular_intensity,
                self.specular_exponent,
                self.reflect_intensity,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pass_shader_fills_only_empty_slots() {
        let mut material = Material::new("crate_metal");
        material.shaders[PassBank::GBuffer as usize][MeshKind::Skinned as usize] =
            Some(ShaderId(7));
        material.set_pass_shader(PassBank::GBuffer, ShaderId(1));
        assert_eq!(
            material.shader(PassBank::GBuffer, MeshKind::Static),
            Some(ShaderId(1))
        );
        assert_eq!(
            material.shader(PassBank::GBuffer, MeshKind::Skinned),
            Some(ShaderId(7))
        );
        assert_eq!(material.shader(PassBank::ShadowDepth, MeshKind::Static), None);
    }

    #[test]
    fn material_block_packs_parameters() {
        let mut material = Material::new("glass");
        material.transparency = 0.25;
        material.diffuse_intensity = 0.5;
        let block = material.material_block();
        assert_relative_eq!(block.fresnel_transparency.w, 0.25);
        assert_relative_eq!(block.params.x, 0.5);
        assert!(material.is_transparent());
    }

    #[test]
    fn uv_scroll_wraps_into_unit_range() {
        let track = UvScrollTrack {
            velocity: Vec2::new(0.3, -0.1),
        };
        let block = track.block_at(10.5);
        assert!(block.translate_uv.x.abs() < 1.0);
        assert!(block.translate_uv.y.abs() < 1.0);
        assert_relative_eq!(block.translate_uv.x, (0.3f32 * 10.5).fract());
    }
}
