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

//! Backend capability flags and the stage requirement table.
//!
//! The orchestrator runs one fixed pass list for every backend and skips
//! stages the active backend cannot express, driven by this data instead
//! of per-API subclass overrides.

use super::stats::RenderStage;

/// Features the active backend supports, probed once at init.
#[derive(Debug, Clone, Copy)]
pub struct BackendCapabilities {
    /// Compute shaders and `dispatch_compute`.
    pub has_compute: bool,
    /// Transform feedback capture.
    pub has_transform_feedback: bool,
    /// Uniform buffer objects with range binds.
    pub has_ubo: bool,
    /// GPU-written indirect draw commands.
    pub has_indirect_draw: bool,
    /// Boolean occlusion queries.
    pub has_occlusion_query: bool,
    /// Separate sampler objects.
    pub has_sampler_objects: bool,
}

impl BackendCapabilities {
    /// Everything a GLES 3.1 context provides.
    pub const GLES31: Self = Self {
        has_compute: true,
        has_transform_feedback: true,
        has_ubo: true,
        has_indirect_draw: true,
        has_occlusion_query: true,
        has_sampler_objects: true,
    };

    /// The capability a stage needs beyond plain rasterization, if any.
    pub fn stage_requirement(stage: RenderStage) -> Option<StageRequirement> {
        match stage {
            RenderStage::ParticleAdvect => Some(StageRequirement::TransformFeedback),
            RenderStage::LightningSimulate => Some(StageRequirement::Compute),
            RenderStage::LightningRender => Some(StageRequirement::IndirectDraw),
            RenderStage::LensFlareQuery => Some(StageRequirement::OcclusionQuery),
            _ => None,
        }
    }

    /// Whether this backend can run a stage at all.
    pub fn supports_stage(&self, stage: RenderStage) -> bool {
        match Self::stage_requirement(stage) {
            None => true,
            Some(StageRequirement::Compute) => self.has_compute,
            Some(StageRequirement::TransformFeedback) => self.has_transform_feedback,
            Some(StageRequirement::IndirectDraw) => self.has_indirect_draw,
            Some(StageRequirement::OcclusionQuery) => self.has_occlusion_query,
        }
    }
}

/// A hardware feature a pipeline stage depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRequirement {
    /// Needs compute dispatch.
    Compute,
    /// Needs transform feedback.
    TransformFeedback,
    /// Needs indirect draws.
    IndirectDraw,
    /// Needs occlusion queries.
    OcclusionQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gles31_supports_every_stage() {
        for stage in RenderStage::ORDER {
            assert!(BackendCapabilities::GLES31.supports_stage(stage));
        }
    }

    #[test]
    fn missing_compute_gates_lightning_only() {
        let caps = BackendCapabilities {
            has_compute: false,
            ..BackendCapabilities::GLES31
        };
        assert!(!caps.supports_stage(RenderStage::LightningSimulate));
        assert!(caps.supports_stage(RenderStage::LightningRender));
        assert!(caps.supports_stage(RenderStage::Lighting));
    }
}
