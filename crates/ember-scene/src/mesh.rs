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

//! Mesh instances: the per-draw items of the scene.
//!
//! Instances referencing the same geometry and material are batched:
//! when a material's visible instance count exceeds one, the whole
//! group is drawn with one instanced call and each member is marked
//! rendered so later encounters in the same list do not re-issue the
//! batch.

use ember_core::math::{Aabb, Mat4, Plane, Vec3, Vec4};
use ember_core::renderer::api::{IndexFormat, VertexArrayId};

use crate::material::MeshKind;
use crate::ubo::{UboHandle, UboMesh, UboStaticMesh};

/// Geometry shared by mesh instances.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    /// Complete vertex input configuration.
    pub vertex_array: VertexArrayId,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Index element width.
    pub index_format: IndexFormat,
}

/// One drawable instance in the scene.
#[derive(Debug)]
pub struct Mesh {
    /// Node name from the scene file.
    pub name: String,
    /// The geometry drawn.
    pub geometry: Geometry,
    /// Index into the scene's material registry.
    pub material: usize,
    /// Model-to-world transform, animated per frame.
    pub world: Mat4,
    /// Per-instance tint, `w` = alpha.
    pub color: Vec4,
    /// How the vertices are transformed.
    pub kind: MeshKind,
    /// World-space bounds; actors carry [`Aabb::INFINITE`].
    pub aabb: Aabb,
    /// Whether the mesh renders into shadow maps.
    pub casts_shadows: bool,

    /// Per-frame guard: set when an instanced batch containing this mesh
    /// has already been drawn.
    pub rendered: bool,
    /// Handle for the mesh constant blocks.
    pub ubo_handle: Option<UboHandle>,
}

impl Mesh {
    /// Creates a static opaque mesh.
    pub fn new(name: &str, geometry: Geometry, material: usize) -> Self {
        Self {
            name: name.to_string(),
            geometry,
            material,
            world: Mat4::IDENTITY,
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            kind: MeshKind::Static,
            aabb: Aabb::new(Vec3::ZERO, Vec3::ZERO),
            casts_shadows: false,
            rendered: false,
            ubo_handle: None,
        }
    }

    /// Triangles one draw of this geometry submits.
    pub fn triangle_count(&self) -> u64 {
        self.geometry.index_count as u64 / 3
    }

    /// The dynamic per-camera constant block.
    pub fn mesh_block(&self, view: &Mat4, view_projection: &Mat4) -> UboMesh {
        let mv = *view * self.world;
        UboMesh {
            mvp: *view_projection * self.world,
            inv_modelview: mv.invert_affine(),
            mv,
        }
    }

    /// The static constant block.
    pub fn static_block(&self) -> UboStaticMesh {
        UboStaticMesh {
            model: self.world,
            inv_model: self.world.invert_affine(),
            color: self.color,
        }
    }

    /// The transparent-sort key: distance of the bounds center from the
    /// camera near plane. Infinite bounds (actors) report the sentinel
    /// distance 0 so they sort in front of everything.
    pub fn near_plane_distance(&self, near_plane: &Plane) -> f32 {
        if self.aabb.is_infinite() {
            0.0
        } else {
            near_plane.signed_distance(self.aabb.center())
        }
    }
}

/// Orders mesh indices back to front for transparent rendering.
pub fn sort_back_to_front(meshes: &[Mesh], order: &mut Vec<usize>, near_plane: &Plane) {
    order.clear();
    order.extend(0..meshes.len());
    order.sort_by(|&a, &b| {
        let da = meshes[a].near_plane_distance(near_plane);
        let db = meshes[b].near_plane_distance(near_plane);
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// A run of visible meshes sharing a material, produced by
/// [`collect_batches`]. Groups with more than one member switch to an
/// instanced draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialBatch {
    /// Material registry index.
    pub material: usize,
    /// Indices into the visible mesh list.
    pub members: Vec<usize>,
}

impl MaterialBatch {
    /// Whether the batch draws with instancing.
    pub fn is_instanced(&self) -> bool {
        self.members.len() > 1
    }
}

/// Groups a visible mesh list by material, preserving first-seen order.
/// Only meshes of the same kind batch together: a skinned actor never
/// joins a static batch even on a shared material.
pub fn collect_batches(meshes: &[Mesh], visible: &[usize]) -> Vec<MaterialBatch> {
    let mut batches: Vec<MaterialBatch> = Vec::new();
    for &index in visible {
        let mesh = &meshes[index];
        let existing = batches.iter_mut().find(|b| {
            b.material == mesh.material
                && meshes[b.members[0]].kind == mesh.kind
                && meshes[b.members[0]].geometry.vertex_array == mesh.geometry.vertex_array
        });
        match existing {
            Some(batch) => batch.members.push(index),
            None => batches.push(MaterialBatch {
                material: mesh.material,
                members: vec![index],
            }),
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(vao: u32) -> Geometry {
        Geometry {
            vertex_array: VertexArrayId(vao),
            index_count: 36,
            index_format: IndexFormat::Uint16,
        }
    }

    fn mesh_at(name: &str, material: usize, z: f32) -> Mesh {
        let mut mesh = Mesh::new(name, geometry(1), material);
        mesh.aabb = Aabb::new(Vec3::new(-1.0, -1.0, z - 1.0), Vec3::new(1.0, 1.0, z + 1.0));
        mesh
    }

    #[test]
    fn transparents_sort_back_to_front() {
        let near_plane = Plane::new(Vec3::Z, 0.0);
        let meshes = vec![
            mesh_at("near", 0, 1.0),
            mesh_at("far", 0, 10.0),
            mesh_at("mid", 0, 5.0),
        ];
        let mut order = Vec::new();
        sort_back_to_front(&meshes, &mut order, &near_plane);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn infinite_bounds_sort_in_front() {
        let near_plane = Plane::new(Vec3::Z, 0.0);
        let mut actor = mesh_at("actor", 0, 3.0);
        actor.aabb = Aabb::INFINITE;
        let meshes = vec![mesh_at("far", 0, 10.0), actor, mesh_at("near", 0, 1.0)];
        let mut order = Vec::new();
        sort_back_to_front(&meshes, &mut order, &near_plane);
        // The actor's sentinel distance 0 puts it closest, drawn last.
        assert_eq!(*order.last().unwrap(), 1);
    }

    #[test]
    fn batches_group_shared_materials() {
        let meshes = vec![
            Mesh::new("a", geometry(1), 0),
            Mesh::new("b", geometry(1), 1),
            Mesh::new("c", geometry(1), 0),
            Mesh::new("d", geometry(1), 0),
        ];
        let visible = [0usize, 1, 2, 3];
        let batches = collect_batches(&meshes, &visible);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].members, vec![0, 2, 3]);
        assert!(batches[0].is_instanced());
        assert!(!batches[1].is_instanced());
    }

    #[test]
    fn mixed_kinds_do_not_batch() {
        let mut skinned = Mesh::new("actor", geometry(1), 0);
        skinned.kind = MeshKind::Skinned;
        let meshes = vec![Mesh::new("a", geometry(1), 0), skinned];
        let batches = collect_batches(&meshes, &[0, 1]);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn mesh_block_matrices_are_consistent() {
        let mut mesh = Mesh::new("box", geometry(1), 0);
        mesh.world = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let block = mesh.mesh_block(&view, &view);
        let p = block.inv_modelview.transform_point(block.mv.transform_point(Vec3::ONE));
        assert!((p - Vec3::ONE).length() < 1.0e-4);
    }
}
