use glam::{Mat4, Vec3};

use crate::renderer::{Material, VertexCompact, VertexEncoding, VertexExtended};

/// Upper bound on the joint list of a single skinned batch.
pub const MAX_BATCH_JOINTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U16,
    U32,
}

impl IndexWidth {
    pub fn bytes(self) -> u32 {
        match self {
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let center = m.transform_point3(self.center());
        let e = self.extents();
        let ax = m.x_axis.truncate().abs() * e.x;
        let ay = m.y_axis.truncate().abs() * e.y;
        let az = m.z_axis.truncate().abs() * e.z;
        let r = ax + ay + az;
        Aabb::new(center - r, center + r)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }
}

/// One draw range of a model sharing a single material.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBatch {
    pub material: usize,
    pub index_width: IndexWidth,
    /// Offset of the first index, counted in indices of `index_width`.
    pub index_offset: u32,
    pub triangle_count: u32,
    /// Skeleton joints referenced by this batch; vertex joint indices point
    /// into this list.
    pub joints: Vec<u16>,
    pub bbox: Aabb,
}

impl ModelBatch {
    pub fn new(material: usize, index_width: IndexWidth, index_offset: u32, triangle_count: u32) -> Self {
        Self {
            material,
            index_width,
            index_offset,
            triangle_count,
            joints: Vec::new(),
            bbox: Aabb::default(),
        }
    }

    pub fn with_joints(mut self, mut joints: Vec<u16>) -> Self {
        if joints.len() > MAX_BATCH_JOINTS {
            log::warn!(
                "Batch joint list of {} truncated to {}",
                joints.len(),
                MAX_BATCH_JOINTS
            );
            joints.truncate(MAX_BATCH_JOINTS);
        }
        self.joints = joints;
        self
    }

    pub fn with_bbox(mut self, bbox: Aabb) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn is_skinned(&self) -> bool {
        !self.joints.is_empty()
    }

    /// Highest skeleton joint referenced by the batch.
    pub fn max_joint(&self) -> Option<u16> {
        self.joints.iter().copied().max()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub joint_names: Vec<String>,
}

impl Skin {
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }
}

/// Replaces `source` by `target` for instances drawn with `variation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSwap {
    pub variation: u32,
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub encoding: VertexEncoding,
    pub vertex_count: u32,
    pub vertices: Vec<u8>,
    pub indices16: Vec<u16>,
    pub indices32: Vec<u32>,
    pub pos_base: Vec3,
    pub pos_scale: Vec3,
    pub materials: Vec<Material>,
    pub batches: Vec<ModelBatch>,
    pub skin: Option<Skin>,
    pub material_swaps: Vec<MaterialSwap>,
}

impl Model {
    pub fn from_compact(name: impl Into<String>, vertices: &[VertexCompact]) -> Self {
        Self::with_vertices(
            name.into(),
            VertexEncoding::Compact,
            vertices.len() as u32,
            bytemuck::cast_slice(vertices).to_vec(),
            Vec3::ZERO,
            Vec3::ONE,
        )
    }

    /// `base`/`scale` must be the values the vertices were quantised with.
    pub fn from_extended(
        name: impl Into<String>,
        vertices: &[VertexExtended],
        base: Vec3,
        scale: Vec3,
    ) -> Self {
        Self::with_vertices(
            name.into(),
            VertexEncoding::Extended,
            vertices.len() as u32,
            bytemuck::cast_slice(vertices).to_vec(),
            base,
            scale,
        )
    }

    fn with_vertices(
        name: String,
        encoding: VertexEncoding,
        vertex_count: u32,
        vertices: Vec<u8>,
        pos_base: Vec3,
        pos_scale: Vec3,
    ) -> Self {
        Self {
            name,
            encoding,
            vertex_count,
            vertices,
            indices16: Vec::new(),
            indices32: Vec::new(),
            pos_base,
            pos_scale,
            materials: Vec::new(),
            batches: Vec::new(),
            skin: None,
            material_swaps: Vec::new(),
        }
    }

    pub fn with_indices16(mut self, indices: Vec<u16>) -> Self {
        self.indices16 = indices;
        self
    }

    pub fn with_indices32(mut self, indices: Vec<u32>) -> Self {
        self.indices32 = indices;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_batch(mut self, batch: ModelBatch) -> Self {
        self.batches.push(batch);
        self
    }

    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn with_material_swap(mut self, swap: MaterialSwap) -> Self {
        self.material_swaps.push(swap);
        self
    }

    pub fn batch(&self, index: usize) -> Option<&ModelBatch> {
        self.batches.get(index)
    }

    pub fn joint_count(&self) -> usize {
        self.skin.as_ref().map_or(0, Skin::joint_count)
    }

    /// Material for `batch_index`, after applying the swap table for a
    /// nonzero geometry `variation`.
    pub fn effective_material(&self, batch_index: usize, variation: u32) -> Option<&Material> {
        let batch = self.batches.get(batch_index)?;
        let mut index = batch.material;
        if variation != 0 {
            if let Some(swap) = self
                .material_swaps
                .iter()
                .find(|s| s.variation == variation && s.source == index)
            {
                index = swap.target;
            }
        }
        self.materials.get(index)
    }

    pub fn has_indices(&self, width: IndexWidth) -> bool {
        match width {
            IndexWidth::U16 => !self.indices16.is_empty(),
            IndexWidth::U32 => !self.indices32.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn quad_model() -> Model {
        let v = VertexCompact::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO);
        Model::from_compact("quad", &[v; 4])
            .with_indices16(vec![0, 1, 2, 0, 2, 3])
            .with_material(Material::new("a"))
            .with_material(Material::new("b"))
            .with_batch(ModelBatch::new(0, IndexWidth::U16, 0, 2))
            .with_material_swap(MaterialSwap {
                variation: 3,
                source: 0,
                target: 1,
            })
    }

    #[test]
    fn variation_zero_keeps_batch_material() {
        let model = quad_model();
        assert_eq!(model.effective_material(0, 0).map(|m| m.name.as_str()), Some("a"));
    }

    #[test]
    fn variation_applies_swap_table() {
        let model = quad_model();
        assert_eq!(model.effective_material(0, 3).map(|m| m.name.as_str()), Some("b"));
        assert_eq!(model.effective_material(0, 7).map(|m| m.name.as_str()), Some("a"));
        assert!(model.effective_material(4, 0).is_none());
    }

    #[test]
    fn joint_list_is_bounded() {
        let batch = ModelBatch::new(0, IndexWidth::U16, 0, 1).with_joints((0..40).collect());
        assert_eq!(batch.joints.len(), MAX_BATCH_JOINTS);
        assert_eq!(batch.max_joint(), Some(31));
    }

    #[test]
    fn transformed_bbox_follows_translation() {
        let bbox = Aabb::default().transformed(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!(bbox.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-6));
    }
}
