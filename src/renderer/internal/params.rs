//! Per-program uniform locations with redundant-upload suppression.

use bytemuck::Pod;
use glam::{Mat4, Vec4};

use crate::renderer::gpu::{GraphicsDevice, ProgramId, UniformLoc};

/// Last uploaded value of one uniform. Comparison is bitwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CachedParam<T: Pod> {
    value: T,
    is_set: bool,
}

impl<T: Pod> CachedParam<T> {
    /// Stores `value` and reports whether it has to reach the driver.
    pub(crate) fn update(&mut self, value: &T) -> bool {
        if self.is_set && bytemuck::bytes_of(&self.value) == bytemuck::bytes_of(value) {
            return false;
        }
        self.value = *value;
        self.is_set = true;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.is_set = false;
    }
}

impl<T: Pod> Default for CachedParam<T> {
    fn default() -> Self {
        Self {
            value: T::zeroed(),
            is_set: false,
        }
    }
}

/// Variable-length vec4 array counterpart of [`CachedParam`].
#[derive(Debug, Clone, Default)]
pub(crate) struct CachedArray {
    values: Vec<[f32; 4]>,
    is_set: bool,
}

impl CachedArray {
    pub(crate) fn update(&mut self, values: &[[f32; 4]]) -> bool {
        if self.is_set
            && bytemuck::cast_slice::<_, u8>(&self.values) == bytemuck::cast_slice::<_, u8>(values)
        {
            return false;
        }
        self.values.clear();
        self.values.extend_from_slice(values);
        self.is_set = true;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.is_set = false;
        self.values.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatSlot {
    ViewProj,
    World,
    ShadowMtx,
}

impl MatSlot {
    pub(crate) const COUNT: usize = 3;
    pub(crate) const ALL: [MatSlot; Self::COUNT] =
        [MatSlot::ViewProj, MatSlot::World, MatSlot::ShadowMtx];

    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            MatSlot::ViewProj => "uViewProj",
            MatSlot::World => "uWorld",
            MatSlot::ShadowMtx => "uShadowMtx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VecSlot {
    ViewPos,
    PosBase,
    PosScale,
    HemiUpper,
    HemiLower,
    HemiUp,
    VtxHemi,
    SpecDir,
    SpecLight,
    ShadowSize,
    ShadowCtrl,
    ShadowFade,
    BaseColor,
    SpecColor,
    SurfParams,
    BumpParams,
    AlphaCtrl,
    FogColor,
    FogParams,
    InvWhite,
    ToneGain,
    ToneBias,
    Exposure,
    InvGamma,
    ScreenSize,
    QuadRect,
    QuadTex,
    QuadColor,
}

impl VecSlot {
    pub(crate) const COUNT: usize = 28;
    pub(crate) const ALL: [VecSlot; Self::COUNT] = [
        VecSlot::ViewPos,
        VecSlot::PosBase,
        VecSlot::PosScale,
        VecSlot::HemiUpper,
        VecSlot::HemiLower,
        VecSlot::HemiUp,
        VecSlot::VtxHemi,
        VecSlot::SpecDir,
        VecSlot::SpecLight,
        VecSlot::ShadowSize,
        VecSlot::ShadowCtrl,
        VecSlot::ShadowFade,
        VecSlot::BaseColor,
        VecSlot::SpecColor,
        VecSlot::SurfParams,
        VecSlot::BumpParams,
        VecSlot::AlphaCtrl,
        VecSlot::FogColor,
        VecSlot::FogParams,
        VecSlot::InvWhite,
        VecSlot::ToneGain,
        VecSlot::ToneBias,
        VecSlot::Exposure,
        VecSlot::InvGamma,
        VecSlot::ScreenSize,
        VecSlot::QuadRect,
        VecSlot::QuadTex,
        VecSlot::QuadColor,
    ];

    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            VecSlot::ViewPos => "uViewPos",
            VecSlot::PosBase => "uPosBase",
            VecSlot::PosScale => "uPosScale",
            VecSlot::HemiUpper => "uHemiUpper",
            VecSlot::HemiLower => "uHemiLower",
            VecSlot::HemiUp => "uHemiUp",
            VecSlot::VtxHemi => "uVtxHemi",
            VecSlot::SpecDir => "uSpecDir",
            VecSlot::SpecLight => "uSpecLight",
            VecSlot::ShadowSize => "uShadowSize",
            VecSlot::ShadowCtrl => "uShadowCtrl",
            VecSlot::ShadowFade => "uShadowFade",
            VecSlot::BaseColor => "uBaseColor",
            VecSlot::SpecColor => "uSpecColor",
            VecSlot::SurfParams => "uSurfParams",
            VecSlot::BumpParams => "uBumpParams",
            VecSlot::AlphaCtrl => "uAlphaCtrl",
            VecSlot::FogColor => "uFogColor",
            VecSlot::FogParams => "uFogParams",
            VecSlot::InvWhite => "uInvWhite",
            VecSlot::ToneGain => "uToneGain",
            VecSlot::ToneBias => "uToneBias",
            VecSlot::Exposure => "uExposure",
            VecSlot::InvGamma => "uInvGamma",
            VecSlot::ScreenSize => "uScreenSize",
            VecSlot::QuadRect => "uQuadRect",
            VecSlot::QuadTex => "uQuadTex",
            VecSlot::QuadColor => "uQuadColor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArraySlot {
    /// Three rows of a transposed affine transform per skeleton joint.
    SkinXforms,
    /// Batch-local joint index to skeleton joint, four per vec4.
    SkinMap,
}

impl ArraySlot {
    pub(crate) const COUNT: usize = 2;
    pub(crate) const ALL: [ArraySlot; Self::COUNT] = [ArraySlot::SkinXforms, ArraySlot::SkinMap];

    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            ArraySlot::SkinXforms => "uSkinXforms",
            ArraySlot::SkinMap => "uSkinMap",
        }
    }
}

/// Fixed texture units; each sampler uniform is bound to its unit once at
/// program creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SamplerSlot {
    Base,
    Bump,
    Spec,
    Surf,
    BumpPat,
    Shadow,
}

impl SamplerSlot {
    pub(crate) const COUNT: usize = 6;
    pub(crate) const ALL: [SamplerSlot; Self::COUNT] = [
        SamplerSlot::Base,
        SamplerSlot::Bump,
        SamplerSlot::Spec,
        SamplerSlot::Surf,
        SamplerSlot::BumpPat,
        SamplerSlot::Shadow,
    ];

    pub(crate) fn unit(self) -> u32 {
        self as u32
    }

    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            SamplerSlot::Base => "smpBase",
            SamplerSlot::Bump => "smpBump",
            SamplerSlot::Spec => "smpSpec",
            SamplerSlot::Surf => "smpSurf",
            SamplerSlot::BumpPat => "smpBumpPat",
            SamplerSlot::Shadow => "smpShadow",
        }
    }
}

/// Uniform and sampler locations of one program plus the values last sent
/// to each. Absent uniforms have `None` locations and every write to them
/// is dropped.
#[derive(Debug, Default)]
pub(crate) struct ParamCache {
    mat_locs: [Option<UniformLoc>; MatSlot::COUNT],
    mats: [CachedParam<[f32; 16]>; MatSlot::COUNT],
    vec_locs: [Option<UniformLoc>; VecSlot::COUNT],
    vecs: [CachedParam<[f32; 4]>; VecSlot::COUNT],
    array_locs: [Option<UniformLoc>; ArraySlot::COUNT],
    arrays: [CachedArray; ArraySlot::COUNT],
    sampler_locs: [Option<UniformLoc>; SamplerSlot::COUNT],
}

impl ParamCache {
    /// Resolves every known name against `program` and binds samplers to
    /// their fixed units. The program must be current.
    pub(crate) fn resolve<D: GraphicsDevice + ?Sized>(device: &mut D, program: ProgramId) -> Self {
        let mut cache = Self::default();
        for slot in MatSlot::ALL {
            cache.mat_locs[slot as usize] = device.uniform_location(program, slot.glsl_name());
        }
        for slot in VecSlot::ALL {
            cache.vec_locs[slot as usize] = device.uniform_location(program, slot.glsl_name());
        }
        for slot in ArraySlot::ALL {
            // Arrays resolve through their first element on some drivers.
            cache.array_locs[slot as usize] = device
                .uniform_location(program, slot.glsl_name())
                .or_else(|| device.uniform_location(program, &format!("{}[0]", slot.glsl_name())));
        }
        for slot in SamplerSlot::ALL {
            let loc = device.uniform_location(program, slot.glsl_name());
            if let Some(loc) = loc {
                device.uniform_i32(loc, slot.unit() as i32);
            }
            cache.sampler_locs[slot as usize] = loc;
        }
        cache
    }

    pub(crate) fn set_mat4<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, slot: MatSlot, value: &Mat4) {
        let Some(loc) = self.mat_locs[slot as usize] else {
            return;
        };
        let cols = value.to_cols_array();
        if self.mats[slot as usize].update(&cols) {
            device.uniform_mat4(loc, &cols);
        }
    }

    pub(crate) fn set_vec4<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, slot: VecSlot, value: Vec4) {
        let Some(loc) = self.vec_locs[slot as usize] else {
            return;
        };
        let v = value.to_array();
        if self.vecs[slot as usize].update(&v) {
            device.uniform_vec4(loc, &v);
        }
    }

    pub(crate) fn set_array<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        slot: ArraySlot,
        values: &[[f32; 4]],
    ) {
        let Some(loc) = self.array_locs[slot as usize] else {
            return;
        };
        if values.is_empty() {
            return;
        }
        if self.arrays[slot as usize].update(values) {
            device.uniform_vec4_array(loc, values);
        }
    }

    pub(crate) fn has_mat(&self, slot: MatSlot) -> bool {
        self.mat_locs[slot as usize].is_some()
    }

    pub(crate) fn has_sampler(&self, slot: SamplerSlot) -> bool {
        self.sampler_locs[slot as usize].is_some()
    }

    /// Forgets every cached value; the next write of each slot uploads.
    pub(crate) fn reset(&mut self) {
        self.mats.iter_mut().for_each(CachedParam::reset);
        self.vecs.iter_mut().for_each(CachedParam::reset);
        self.arrays.iter_mut().for_each(CachedArray::reset);
    }
}
