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

//! Per-frame render statistics with a per-stage draw-call breakdown.

/// The pipeline stages, in the exact order the orchestrator executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum RenderStage {
    /// Shadow-map depth pre-pass.
    ShadowDepth,
    /// Planar reflection pre-pass.
    PlanarReflection,
    /// Opaque geometry into the G-buffer.
    GBufferSolids,
    /// Particle transform-feedback advection.
    ParticleAdvect,
    /// Lightning compute simulation.
    LightningSimulate,
    /// Lens flare occlusion queries.
    LensFlareQuery,
    /// Deferred light volume accumulation.
    Lighting,
    /// Sky dome.
    Sky,
    /// Reflection/emission combine.
    ReflectionEmissionCombine,
    /// Screen-space shadow decal blend.
    ShadowDecalBlend,
    /// Forward decals.
    Decals,
    /// Lightning bolt indirect draw.
    LightningRender,
    /// Instanced particle rendering.
    ParticleRender,
    /// Radial light shafts.
    LightShafts,
    /// Sorted transparent geometry.
    Transparents,
    /// Lens flare sprites.
    LensFlareDraw,
    /// Post-processing chain.
    Post,
}

impl RenderStage {
    /// Number of stages.
    pub const COUNT: usize = 17;

    /// All stages in execution order.
    pub const ORDER: [RenderStage; Self::COUNT] = [
        RenderStage::ShadowDepth,
        RenderStage::PlanarReflection,
        RenderStage::GBufferSolids,
        RenderStage::ParticleAdvect,
        RenderStage::LightningSimulate,
        RenderStage::LensFlareQuery,
        RenderStage::Lighting,
        RenderStage::Sky,
        RenderStage::ReflectionEmissionCombine,
        RenderStage::ShadowDecalBlend,
        RenderStage::Decals,
        RenderStage::LightningRender,
        RenderStage::ParticleRender,
        RenderStage::LightShafts,
        RenderStage::Transparents,
        RenderStage::LensFlareDraw,
        RenderStage::Post,
    ];

    /// Index of this stage in [`Self::ORDER`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Statistics accumulated over one rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderStats {
    /// Total draw calls issued.
    pub draw_calls: u32,
    /// Total triangles submitted.
    pub triangles: u64,
    /// Total vertices submitted.
    pub vertices: u64,
    /// Compute dispatches issued.
    pub dispatches: u32,
    /// Draw calls per pipeline stage.
    pub stage_draw_calls: [u32; RenderStage::COUNT],
}

impl Default for RenderStats {
    fn default() -> Self {
        Self {
            draw_calls: 0,
            triangles: 0,
            vertices: 0,
            dispatches: 0,
            stage_draw_calls: [0; RenderStage::COUNT],
        }
    }
}

impl RenderStats {
    /// Resets all counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records one draw call against a stage.
    pub fn record_draw(&mut self, stage: RenderStage, vertices: u64, triangles: u64) {
        self.draw_calls += 1;
        self.vertices += vertices;
        self.triangles += triangles;
        self.stage_draw_calls[stage.index()] += 1;
    }

    /// Records one compute dispatch.
    pub fn record_dispatch(&mut self) {
        self.dispatches += 1;
    }

    /// Draw calls recorded for one stage.
    #[inline]
    pub fn stage_draws(&self, stage: RenderStage) -> u32 {
        self.stage_draw_calls[stage.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_indices_match_enum_discriminants() {
        for (i, stage) in RenderStage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn record_draw_updates_totals_and_stage() {
        let mut stats = RenderStats::default();
        stats.record_draw(RenderStage::Lighting, 36, 12);
        stats.record_draw(RenderStage::Lighting, 36, 12);
        stats.record_draw(RenderStage::Sky, 4, 2);
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.vertices, 76);
        assert_eq!(stats.stage_draws(RenderStage::Lighting), 2);
        assert_eq!(stats.stage_draws(RenderStage::Sky), 1);
        assert_eq!(stats.stage_draws(RenderStage::Post), 0);
    }
}
