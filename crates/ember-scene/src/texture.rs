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

//! The sampler object cache.
//!
//! Textures own their images exclusively, but sampler objects are
//! deduplicated: every texture asking for the same filter/wrap/
//! anisotropy combination shares one backend sampler, tracked with a
//! reference count. The cache is an owned member of the render backend
//! state and lives exactly as long as the scene it serves.

use std::collections::HashMap;

use ember_core::renderer::api::{SamplerDescriptor, SamplerId};
use ember_core::renderer::{GraphicsDevice, ResourceError};
use log::debug;

struct CacheEntry {
    sampler: SamplerId,
    refs: usize,
}

/// A reference-counted cache of deduplicated sampler objects.
#[derive(Default)]
pub struct SamplerCache {
    entries: HashMap<SamplerDescriptor, CacheEntry>,
}

impl SamplerCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sampler for a descriptor, creating it on first use
    /// and bumping its reference count otherwise.
    pub fn acquire(
        &mut self,
        device: &mut dyn GraphicsDevice,
        desc: &SamplerDescriptor,
    ) -> Result<SamplerId, ResourceError> {
        if let Some(entry) = self.entries.get_mut(desc) {
            entry.refs += 1;
            return Ok(entry.sampler);
        }
        let sampler = device.create_sampler(desc)?;
        debug!("SamplerCache: new sampler {sampler:?} for {desc:?}");
        self.entries.insert(
            *desc,
            CacheEntry { sampler, refs: 1 },
        );
        Ok(sampler)
    }

    /// Drops one reference; the backend sampler is destroyed when the
    /// last holder releases it.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice, desc: &SamplerDescriptor) {
        let Some(entry) = self.entries.get_mut(desc) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            let sampler = entry.sampler;
            self.entries.remove(desc);
            device.destroy_sampler(sampler);
        }
    }

    /// Number of distinct sampler objects alive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no samplers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroys every cached sampler regardless of reference counts.
    /// Scene teardown only.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, entry) in self.entries.drain() {
            device.destroy_sampler(entry.sampler);
        }
    }
}

impl std::fmt::Debug for SamplerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::renderer::api::{FilterMode, WrapMode};
    use ember_infra::null::NullDevice;

    fn trilinear() -> SamplerDescriptor {
        SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: Some(FilterMode::Linear),
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            anisotropy: 4,
        }
    }

    #[test]
    fn identical_descriptors_share_one_sampler() {
        let mut device = NullDevice::new();
        let mut cache = SamplerCache::new();
        let a = cache.acquire(&mut device, &trilinear()).unwrap();
        let b = cache.acquire(&mut device, &trilinear()).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);

        let mut nearest = trilinear();
        nearest.mag_filter = FilterMode::Nearest;
        let c = cache.acquire(&mut device, &nearest).unwrap();
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn sampler_survives_until_last_release() {
        let mut device = NullDevice::new();
        let mut cache = SamplerCache::new();
        cache.acquire(&mut device, &trilinear()).unwrap();
        cache.acquire(&mut device, &trilinear()).unwrap();

        cache.release(&mut device, &trilinear());
        assert_eq!(cache.len(), 1);
        cache.release(&mut device, &trilinear());
        assert!(cache.is_empty());
    }

    #[test]
    fn release_of_unknown_descriptor_is_ignored() {
        let mut device = NullDevice::new();
        let mut cache = SamplerCache::new();
        cache.release(&mut device, &trilinear());
        assert!(cache.is_empty());
    }
}
