// renderer/material.rs
use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::asset::{Handle, TextureData};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        /// Alpha channel of the base colour contributes transparency.
        const ALPHA = 1 << 0;
        /// Alpha-tested; fragments under the threshold are dropped.
        const CUTOUT = 1 << 1;
        /// Keep blending even in the discard pass.
        const FORCE_BLEND = 1 << 2;
        const DOUBLE_SIDED = 1 << 3;
        /// Base map alpha carries the specular mask.
        const BASE_ALPHA_SPEC = 1 << 4;
        const CAST_SHADOWS = 1 << 5;
        const RECEIVE_SHADOWS = 1 << 6;
        /// Non-black specular colour.
        const SPECULAR = 1 << 7;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec3,
    pub spec_color: Vec3,
    pub roughness: f32,
    pub fresnel: f32,
    pub bump_scale: f32,
    pub flip_tangent: bool,
    pub flip_bitangent: bool,
    pub alpha_threshold: f32,
    pub base_texture: Option<Handle<TextureData>>,
    pub bump_texture: Option<Handle<TextureData>>,
    pub flags: MaterialFlags,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: Vec3::ONE,
            spec_color: Vec3::ZERO,
            roughness: 0.6,
            fresnel: 0.04,
            bump_scale: 1.0,
            flip_tangent: false,
            flip_bitangent: false,
            alpha_threshold: 0.0,
            base_texture: None,
            bump_texture: None,
            flags: MaterialFlags::CAST_SHADOWS | MaterialFlags::RECEIVE_SHADOWS,
        }
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn without_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags.remove(flags);
        self
    }

    pub fn with_base_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_specular(mut self, color: Vec3, roughness: f32) -> Self {
        self.spec_color = color;
        self.roughness = roughness;
        self.flags.set(MaterialFlags::SPECULAR, color != Vec3::ZERO);
        self
    }

    pub fn with_base_texture(mut self, texture: Handle<TextureData>) -> Self {
        self.base_texture = Some(texture);
        self
    }

    pub fn with_bump_texture(mut self, texture: Handle<TextureData>, scale: f32) -> Self {
        self.bump_texture = Some(texture);
        self.bump_scale = scale;
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: f32) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    pub fn is_alpha(&self) -> bool {
        self.flags.contains(MaterialFlags::ALPHA)
    }

    pub fn is_cutout(&self) -> bool {
        self.flags.contains(MaterialFlags::CUTOUT)
    }

    pub fn is_double_sided(&self) -> bool {
        self.flags.contains(MaterialFlags::DOUBLE_SIDED)
    }

    pub fn has_specular(&self) -> bool {
        self.flags
            .intersects(MaterialFlags::SPECULAR | MaterialFlags::BASE_ALPHA_SPEC)
    }

    pub fn base_color_param(&self) -> Vec4 {
        self.base_color.extend(1.0)
    }

    pub fn spec_color_param(&self) -> Vec4 {
        let mask = if self.flags.contains(MaterialFlags::BASE_ALPHA_SPEC) {
            1.0
        } else {
            0.0
        };
        self.spec_color.extend(mask)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_material_is_opaque_shadowed() {
        let mtl = Material::default();
        assert!(!mtl.is_alpha());
        assert!(mtl.flags.contains(MaterialFlags::CAST_SHADOWS));
        assert!(mtl.flags.contains(MaterialFlags::RECEIVE_SHADOWS));
        assert!(!mtl.has_specular());
    }

    #[test]
    fn base_alpha_spec_counts_as_specular() {
        let mtl = Material::default().with_flags(MaterialFlags::BASE_ALPHA_SPEC);
        assert!(mtl.has_specular());
        assert_eq!(mtl.spec_color_param().w, 1.0);
    }

    #[test]
    fn specular_flag_tracks_colour() {
        let mtl = Material::default().with_specular(Vec3::splat(0.5), 0.3);
        assert!(mtl.flags.contains(MaterialFlags::SPECULAR));
        let mtl = mtl.with_specular(Vec3::ZERO, 0.3);
        assert!(!mtl.has_specular());
    }
}
