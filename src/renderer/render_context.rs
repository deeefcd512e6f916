// renderer/render_context.rs
use glam::{Mat4, Vec3, Vec4};

use crate::asset::{Handle, Model};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingMode {
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewParams {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub pos: Vec3,
}

impl ViewParams {
    pub fn new(view: Mat4, proj: Mat4) -> Self {
        Self {
            view,
            proj,
            view_proj: proj * view,
            pos: view.inverse().w_axis.truncate(),
        }
    }
}

impl Default for ViewParams {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HemiParams {
    pub upper: Vec3,
    pub lower: Vec3,
    pub up: Vec3,
    pub exp: f32,
    pub gain: f32,
}

impl Default for HemiParams {
    fn default() -> Self {
        Self {
            upper: Vec3::new(0.8, 0.85, 0.9),
            lower: Vec3::new(0.2, 0.18, 0.15),
            up: Vec3::Y,
            exp: 1.0,
            gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpecParams {
    pub dir: Vec3,
    pub color: Vec3,
    pub enabled: bool,
}

impl Default for SpecParams {
    fn default() -> Self {
        Self {
            dir: Vec3::new(-0.4, -1.0, -0.3).normalize(),
            color: Vec3::ONE,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShadowParams {
    pub enabled: bool,
    /// Light view-projection; the bias matrix is applied by the backend.
    pub light_view_proj: Mat4,
    pub density: f32,
    pub offset: f32,
    pub weight: f32,
    pub fade_start: f32,
    pub fade_end: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            enabled: false,
            light_view_proj: Mat4::IDENTITY,
            density: 1.0,
            offset: 0.001,
            weight: 1.0,
            fade_start: 40.0,
            fade_end: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FogParams {
    pub color: Vec4,
    pub start: f32,
    pub falloff: f32,
    pub curve_p1: f32,
    pub curve_p2: f32,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.7, 0.75, 0.8, 0.0),
            start: 10.0,
            falloff: 0.01,
            curve_p1: 1.0 / 3.0,
            curve_p2: 2.0 / 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToneParams {
    pub linear_white: Vec3,
    pub gain: Vec3,
    pub bias: Vec3,
    pub exposure: Vec3,
    pub gamma: Vec3,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            linear_white: Vec3::ONE,
            gain: Vec3::ONE,
            bias: Vec3::ZERO,
            exposure: Vec3::ONE,
            gamma: Vec3::splat(2.2),
        }
    }
}

impl ToneParams {
    pub fn inv_white(&self) -> Vec3 {
        let w = self.linear_white.max(Vec3::splat(1e-4));
        Vec3::ONE / (w * w)
    }

    pub fn inv_gamma(&self) -> Vec3 {
        Vec3::ONE / self.gamma.max(Vec3::splat(1e-4))
    }
}

/// Per-frame shading snapshot; read-only to the backend.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub view: ViewParams,
    pub hemi: HemiParams,
    pub lighting: LightingMode,
    pub spec: SpecParams,
    pub shadow: ShadowParams,
    pub fog: FogParams,
    pub tone: ToneParams,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            view: ViewParams::default(),
            hemi: HemiParams::default(),
            lighting: LightingMode::Pixel,
            spec: SpecParams::default(),
            shadow: ShadowParams::default(),
            fog: FogParams::default(),
            tone: ToneParams::default(),
        }
    }
}

/// Per-instance data the scene hands over with each batch.
#[derive(Debug, Clone)]
pub struct ModelWork {
    pub model: Handle<Model>,
    pub world: Mat4,
    /// Skeleton joint matrices (already combined with inverse bind poses).
    pub joints: Vec<Mat4>,
    pub variation: u32,
}

impl ModelWork {
    pub fn new(model: Handle<Model>) -> Self {
        Self {
            model,
            world: Mat4::IDENTITY,
            joints: Vec::new(),
            variation: 0,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_joints(mut self, joints: Vec<Mat4>) -> Self {
        self.joints = joints;
        self
    }

    pub fn with_variation(mut self, variation: u32) -> Self {
        self.variation = variation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_position_is_recovered_from_view_matrix() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let params = ViewParams::new(view, Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0));
        assert!(params.pos.abs_diff_eq(eye, 1e-4));
    }

    #[test]
    fn tone_inverses() {
        let tone = ToneParams {
            linear_white: Vec3::splat(2.0),
            gamma: Vec3::splat(2.0),
            ..ToneParams::default()
        };
        assert!(tone.inv_white().abs_diff_eq(Vec3::splat(0.25), 1e-6));
        assert!(tone.inv_gamma().abs_diff_eq(Vec3::splat(0.5), 1e-6));
    }
}
