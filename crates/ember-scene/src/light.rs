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

//! Scene lights and the lens-flare occlusion query ring.
//!
//! Lens flare visibility is answered by the GPU: every frame a one-point
//! draw at the light position runs inside an occlusion query, and the
//! flare draw consumes the oldest query in a four-deep ring instead of
//! the one just issued. Reading a result several frames late never
//! stalls the pipeline; the flare reacts with a few frames of latency,
//! which the eye does not notice.

use ember_core::math::{Mat4, Vec3, Vec4};
use ember_core::renderer::api::QueryId;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use crate::ubo::{UboHandle, UboLight};

/// Depth of the per-light occlusion query ring.
pub const QUERY_COUNT: usize = 4;

/// Extra scale on omni light volumes so the low-poly sphere never clips
/// the true radius.
pub const OMNI_VOLUME_SCALE: f32 = 1.25;

/// Extra opening on spot cones to counter the low tessellation factor
/// of the cone mesh.
pub const SPOT_CONE_SCALE: f32 = 1.2;

/// The kind of a scene light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Full-screen directional light.
    Directional,
    /// Point light shaded inside a sphere volume.
    Omni,
    /// Spot light shaded inside a cone volume.
    Spot,
    /// Constant ambient term.
    Ambient,
    /// Screen-space ambient occlusion treated as a light.
    Ssao,
    /// Projected blob shadow blended like an omni volume.
    ShadowDecal,
}

impl LightKind {
    /// Whether this kind is shaded with a bounded volume mesh. The rest
    /// either cover the whole screen or are folded into other passes.
    pub fn has_volume(&self) -> bool {
        matches!(self, Self::Omni | Self::Spot | Self::ShadowDecal)
    }
}

/// A scene light.
#[derive(Debug)]
pub struct Light {
    /// The light kind, fixed at load.
    pub kind: LightKind,
    /// Light-to-world transform.
    pub world: Mat4,
    /// Diffuse color; animated intensity tracks scale it per frame.
    pub diffuse: Vec3,
    /// Influence radius of bounded kinds.
    pub radius: f32,
    /// Full opening angle of spot lights, in radians.
    pub spot_angle: f32,
    /// Whether this light renders a shadow map.
    pub casts_shadows: bool,
    /// Whether this light draws a lens flare.
    pub has_lens_flare: bool,

    queries: [Option<QueryId>; QUERY_COUNT],
    initialized: [bool; QUERY_COUNT],
    current: usize,

    /// Handle for the light constant block.
    pub ubo_handle: Option<UboHandle>,
    /// Handle for the lens flare constant block.
    pub flare_handle: Option<UboHandle>,
    /// Handle for the light shaft constant block.
    pub shaft_handle: Option<UboHandle>,
}

impl Light {
    /// Creates a light with an empty query ring.
    pub fn new(kind: LightKind, world: Mat4, diffuse: Vec3, radius: f32) -> Self {
        Self {
            kind,
            world,
            diffuse,
            radius,
            spot_angle: 0.0,
            casts_shadows: false,
            has_lens_flare: false,
            queries: [None; QUERY_COUNT],
            initialized: [false; QUERY_COUNT],
            current: QUERY_COUNT - 1,
            ubo_handle: None,
            flare_handle: None,
            shaft_handle: None,
        }
    }

    /// Allocates the ring's query objects. Called once for flare lights
    /// when the scene is bound to a device.
    pub fn create_queries(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), ResourceError> {
        for slot in &mut self.queries {
            if slot.is_none() {
                *slot = Some(device.create_query()?);
            }
        }
        Ok(())
    }

    /// Releases the ring's query objects.
    pub fn destroy_queries(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in &mut self.queries {
            if let Some(query) = slot.take() {
                device.destroy_query(query);
            }
        }
        self.initialized = [false; QUERY_COUNT];
        self.current = QUERY_COUNT - 1;
    }

    /// Advances the ring to the query this frame will issue.
    pub fn next_query_object(&mut self) {
        self.current = (self.current + 1) % QUERY_COUNT;
    }

    /// The query to issue this frame. Marks the slot initialized: only
    /// slots returned here have ever had a query begun on them, and only
    /// those may later be read.
    pub fn current_query_object(&mut self) -> Option<QueryId> {
        let query = self.queries[self.current];
        if query.is_some() {
            self.initialized[self.current] = true;
        }
        query
    }

    /// The oldest query in the ring, issued `QUERY_COUNT - 1` frames ago.
    pub fn previous_query_object(&self) -> Option<QueryId> {
        self.queries[self.previous_index()]
    }

    /// Whether the oldest query was ever issued. False until the ring
    /// has gone around once; reading an un-issued query is undefined.
    pub fn is_previous_query_object_initialized(&self) -> bool {
        self.initialized[self.previous_index()]
    }

    fn previous_index(&self) -> usize {
        (self.current + 1) % QUERY_COUNT
    }

    /// World position of the light.
    pub fn position(&self) -> Vec3 {
        self.world.translation()
    }

    /// Light direction: negative local Z in world space.
    pub fn direction(&self) -> Vec3 {
        (-self.world.cols[2].truncate()).normalize_or_zero()
    }

    /// Model transform of the shading volume, `None` for kinds shaded
    /// without one.
    pub fn volume_transform(&self) -> Option<Mat4> {
        match self.kind {
            LightKind::Omni | LightKind::ShadowDecal => {
                let s = self.radius * OMNI_VOLUME_SCALE;
                Some(
                    Mat4::from_translation(self.position())
                        * Mat4::from_scale(Vec3::new(s, s, s)),
                )
            }
            LightKind::Spot => {
                // Unit cone: apex at origin, opening along -Z. Scale the
                // length to the radius and the base by the spot angle,
                // then move the apex back to the light.
                let half_angle = 0.5 * self.spot_angle;
                let length = self.radius;
                let base = length * half_angle.tan() * SPOT_CONE_SCALE;
                let mut cone = Mat4::from_scale(Vec3::new(base, base, length));
                cone.cols[3] = Vec4::new(0.0, 0.0, -length, 1.0);
                Some(self.world * cone)
            }
            _ => None,
        }
    }

    /// The light constant block, with the animated intensity applied.
    pub fn light_block(&self, intensity: f32) -> UboLight {
        let color = self.diffuse * intensity;
        let spot_cos = (0.5 * self.spot_angle).cos();
        UboLight {
            light_color: color.extend(0.0),
            light_pos: self.position().extend(0.0),
            light_x: self.direction().extend(self.position().z),
            spot_cos_attenuation: Vec4::new(
                spot_cos,
                1.0 / (1.0 - spot_cos).max(1.0e-6),
                -1.0 / (self.radius * self.radius).max(1.0e-6),
                0.0,
            ),
        }
    }

    /// Whether the lens flare query pass should consider this light:
    /// flares only make sense for positional lights that emit something.
    pub fn wants_lens_flare_query(&self) -> bool {
        self.has_lens_flare
            && !matches!(self.kind, LightKind::Ambient | LightKind::Directional)
            && (self.diffuse.x != 0.0 || self.diffuse.y != 0.0 || self.diffuse.z != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::null::NullDevice;

    fn flare_light(device: &mut NullDevice) -> Light {
        let mut light = Light::new(
            LightKind::Omni,
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::ONE,
            5.0,
        );
        light.has_lens_flare = true;
        light.create_queries(device).unwrap();
        light
    }

    #[test]
    fn previous_query_uninitialized_until_ring_wraps() {
        let mut device = NullDevice::new();
        let mut light = flare_light(&mut device);

        assert!(!light.is_previous_query_object_initialized());
        for cycle in 1..=QUERY_COUNT {
            light.next_query_object();
            assert!(light.current_query_object().is_some());
            if cycle < QUERY_COUNT {
                assert!(
                    !light.is_previous_query_object_initialized(),
                    "cycle {cycle}"
                );
            }
        }
        assert!(light.is_previous_query_object_initialized());
    }

    #[test]
    fn previous_query_is_the_oldest_issued() {
        let mut device = NullDevice::new();
        let mut light = flare_light(&mut device);

        let mut issued = Vec::new();
        for _ in 0..QUERY_COUNT {
            light.next_query_object();
            issued.push(light.current_query_object().unwrap());
        }
        assert_eq!(light.previous_query_object().unwrap(), issued[0]);

        light.next_query_object();
        light.current_query_object();
        assert_eq!(light.previous_query_object().unwrap(), issued[1]);
    }

    #[test]
    fn advancing_without_issuing_does_not_initialize() {
        let mut device = NullDevice::new();
        let mut light = flare_light(&mut device);
        for _ in 0..QUERY_COUNT * 2 {
            light.next_query_object();
        }
        assert!(!light.is_previous_query_object_initialized());
    }

    #[test]
    fn omni_volume_covers_scaled_radius() {
        let light = Light::new(
            LightKind::Omni,
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::ONE,
            4.0,
        );
        let m = light.volume_transform().unwrap();
        let surface = m.transform_point(Vec3::X);
        let center = m.transform_point(Vec3::ZERO);
        assert_eq!(center, Vec3::new(1.0, 2.0, 3.0));
        assert!((surface - center).length() > 4.0);
    }

    #[test]
    fn directional_light_has_no_volume() {
        let light = Light::new(LightKind::Directional, Mat4::IDENTITY, Vec3::ONE, 0.0);
        assert!(light.volume_transform().is_none());
        assert!(!LightKind::Directional.has_volume());
        assert!(LightKind::Spot.has_volume());
    }

    #[test]
    fn flare_query_wants_positional_emitting_lights_only() {
        let mut omni = Light::new(LightKind::Omni, Mat4::IDENTITY, Vec3::ONE, 1.0);
        omni.has_lens_flare = true;
        assert!(omni.wants_lens_flare_query());

        let mut dark = Light::new(LightKind::Omni, Mat4::IDENTITY, Vec3::ZERO, 1.0);
        dark.has_lens_flare = true;
        assert!(!dark.wants_lens_flare_query());

        let mut sun = Light::new(LightKind::Directional, Mat4::IDENTITY, Vec3::ONE, 0.0);
        sun.has_lens_flare = true;
        assert!(!sun.wants_lens_flare_query());
    }
}
