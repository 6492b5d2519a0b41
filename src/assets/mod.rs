/// Asset-side data model: meshes, materials and models.
/// Loaders (external to this crate) are expected to uphold the
/// invariants here before the renderer or collider ever see the data:
/// every index is in range and `uvs` is empty or parallel to `positions`.
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::rendering::Texture;

/// Immutable-once-built triangle mesh. Positions are the only mandatory
/// attribute; `uvs` may be empty (untextured draws sample UV (0,0)).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    /// Optional; empty = none. Otherwise parallel to `positions`.
    pub uvs: Vec<Vec2>,
    /// Triangle list, length a multiple of 3.
    pub indices: Vec<u32>,
}

/// A contiguous index range of a mesh, drawn with one material.
#[derive(Debug, Clone, Copy, Default)]
pub struct Primitive {
    pub index_offset: u32,
    pub index_count: u32,
    pub material_index: u32,
}

/// Per-pixel transparency handling for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    /// Alpha test / cutout: pixels below the cutoff are discarded.
    Mask,
    /// Alpha blend (over-composite). Depth-tested like opaque geometry;
    /// no back-to-front sorting is performed.
    Blend,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec3,
    /// Shared, read-only. `None` means the primitive is skipped by the
    /// game's draw loop (every visible surface is textured).
    pub base_color_tex: Option<Arc<Texture>>,
    pub alpha_mode: AlphaMode,
    /// Only used for `Mask`.
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub front_face_ccw: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec3::ONE,
            base_color_tex: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            front_face_ccw: true,
        }
    }
}

/// A mesh with its materials and per-material index ranges, plus a
/// model-space bounding sphere for coarse frustum culling.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub mesh: Mesh,
    pub materials: Vec<Material>,
    pub primitives: Vec<Primitive>,

    pub bounds_center: Vec3,
    pub bounds_radius: f32,
}

impl Model {
    /// Recompute the model-space bounding sphere from the mesh positions.
    /// Call after building or deforming (skinning) the mesh.
    pub fn update_bounds(&mut self) {
        if self.mesh.positions.is_empty() {
            self.bounds_center = Vec3::ZERO;
            self.bounds_radius = 1.0;
            return;
        }

        let mut min = self.mesh.positions[0];
        let mut max = min;
        for p in &self.mesh.positions {
            min = min.min(*p);
            max = max.max(*p);
        }

        let center = (min + max) * 0.5;
        let mut radius_sq = 0.0f32;
        for p in &self.mesh.positions {
            radius_sq = radius_sq.max(p.distance_squared(center));
        }

        self.bounds_center = center;
        self.bounds_radius = radius_sq.sqrt().max(1e-4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_enclose_all_positions() {
        let mut model = Model {
            mesh: Mesh {
                positions: vec![
                    Vec3::new(-2.0, 0.0, 0.0),
                    Vec3::new(4.0, 1.0, 0.0),
                    Vec3::new(0.0, -3.0, 2.0),
                ],
                ..Default::default()
            },
            ..Default::default()
        };
        model.update_bounds();

        for p in &model.mesh.positions {
            assert!(
                p.distance(model.bounds_center) <= model.bounds_radius + 1e-4,
                "position {p:?} outside bounding sphere"
            );
        }
    }

    #[test]
    fn empty_model_gets_unit_bounds() {
        let mut model = Model::default();
        model.update_bounds();
        assert_eq!(model.bounds_radius, 1.0);
    }
}
