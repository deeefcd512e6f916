//! Per-batch dispatch: program selection, resource resolution, uniform
//! assembly, state transitions and the indexed draw.

use glam::{Mat4, Vec4};

use crate::asset::{Assets, IndexWidth, Model, ModelBatch};
use crate::renderer::backend::BatchMode;
use crate::renderer::gpu::{GraphicsDevice, IndexType, Topology};
use crate::renderer::internal::params::{ArraySlot, MatSlot, ParamCache, SamplerSlot, VecSlot};
use crate::renderer::internal::resources::MAX_SKELETON_JOINTS;
use crate::renderer::internal::selector::{EnvFlags, SelectInput, VariantKey};
use crate::renderer::internal::shadow::shadow_bias_matrix;
use crate::renderer::internal::state::{BlendMode, CullMode, RenderTarget};
use crate::renderer::material::Material;
use crate::renderer::ogl::OglBackend;
use crate::renderer::render_context::{Context, LightingMode, ModelWork};

/// Rows of the transposed affine joint transform the shaders expect.
pub(crate) fn pack_joint(m: &Mat4) -> [[f32; 4]; 3] {
    [m.row(0).to_array(), m.row(1).to_array(), m.row(2).to_array()]
}

/// Skeleton transforms for joints `0..=max_joint` and the batch-local joint
/// remap, four indices per vec4. Missing skeleton joints fall back to the
/// instance world matrix.
pub(crate) fn skin_arrays(batch: &ModelBatch, work: &ModelWork) -> (Vec<[f32; 4]>, Vec<[f32; 4]>) {
    let count = batch
        .max_joint()
        .map_or(0, |j| j as usize + 1)
        .min(MAX_SKELETON_JOINTS);
    let mut xforms = Vec::with_capacity(count * 3);
    for j in 0..count {
        let m = work.joints.get(j).unwrap_or(&work.world);
        xforms.extend_from_slice(&pack_joint(m));
    }
    let map = batch
        .joints
        .chunks(4)
        .map(|chunk| {
            let mut v = [0.0; 4];
            for (dst, &j) in v.iter_mut().zip(chunk) {
                *dst = j.min(MAX_SKELETON_JOINTS as u16 - 1) as f32;
            }
            v
        })
        .collect();
    (xforms, map)
}

/// Alpha-test threshold for the pass.
pub(crate) fn alpha_threshold(mode: BatchMode, material: &Material, shadow_threshold: f32) -> f32 {
    match mode {
        BatchMode::ShadowCast => shadow_threshold,
        BatchMode::Discard if material.alpha_threshold <= 0.0 => shadow_threshold,
        _ => material.alpha_threshold,
    }
}

/// Index count and byte offset of a batch, or `None` when the range does
/// not fit the model's index stream or the driver's 32-bit arguments.
pub(crate) fn index_range(model: &Model, batch: &ModelBatch) -> Option<(u32, u32)> {
    let index_len = match batch.index_width {
        IndexWidth::U16 => model.indices16.len(),
        IndexWidth::U32 => model.indices32.len(),
    } as u64;
    let count = u64::from(batch.triangle_count) * 3;
    let offset = u64::from(batch.index_offset);
    if count == 0 || offset + count > index_len {
        return None;
    }
    let byte_offset = offset * u64::from(batch.index_width.bytes());
    Some((u32::try_from(count).ok()?, u32::try_from(byte_offset).ok()?))
}

fn in_shadow_range(batch: &ModelBatch, work: &ModelWork, ctx: &Context) -> bool {
    if !ctx.shadow.enabled {
        return false;
    }
    let mut center = batch.bbox.transformed(&work.world).center();
    if batch.is_skinned() {
        if let Some(root) = work.joints.first() {
            center = root.transform_point3(batch.bbox.center());
        }
    }
    center.distance(ctx.view.pos) <= ctx.shadow.fade_end
}

fn push_params<D: GraphicsDevice + ?Sized>(
    params: &mut ParamCache,
    device: &mut D,
    frame: &BatchFrame<'_>,
) {
    let ctx = frame.ctx;
    let mtl = frame.material;
    let casting = frame.mode == BatchMode::ShadowCast;

    let view_proj = if casting {
        ctx.shadow.light_view_proj
    } else {
        ctx.view.view_proj
    };
    params.set_mat4(device, MatSlot::ViewProj, &view_proj);
    params.set_vec4(device, VecSlot::ViewPos, ctx.view.pos.extend(1.0));

    if frame.batch.is_skinned() {
        let (xforms, map) = skin_arrays(frame.batch, frame.work);
        params.set_array(device, ArraySlot::SkinXforms, &xforms);
        params.set_array(device, ArraySlot::SkinMap, &map);
    } else {
        params.set_mat4(device, MatSlot::World, &frame.work.world);
    }

    params.set_vec4(device, VecSlot::PosBase, frame.model.pos_base.extend(0.0));
    params.set_vec4(device, VecSlot::PosScale, frame.model.pos_scale.extend(1.0));

    let hemi = &ctx.hemi;
    let vertex_lit = if ctx.lighting == LightingMode::Vertex {
        1.0
    } else {
        0.0
    };
    params.set_vec4(device, VecSlot::HemiUpper, hemi.upper.extend(hemi.gain));
    params.set_vec4(device, VecSlot::HemiLower, hemi.lower.extend(0.0));
    params.set_vec4(device, VecSlot::HemiUp, hemi.up.normalize_or_zero().extend(hemi.exp));
    params.set_vec4(device, VecSlot::VtxHemi, Vec4::new(hemi.exp, hemi.gain, vertex_lit, 0.0));

    let spec_on = if ctx.spec.enabled { 1.0 } else { 0.0 };
    params.set_vec4(device, VecSlot::SpecDir, ctx.spec.dir.normalize_or_zero().extend(0.0));
    params.set_vec4(device, VecSlot::SpecLight, ctx.spec.color.extend(spec_on));

    let shadow = &ctx.shadow;
    params.set_mat4(device, MatSlot::ShadowMtx, &(shadow_bias_matrix() * shadow.light_view_proj));
    let size = frame.shadow_size.max(1) as f32;
    params.set_vec4(device, VecSlot::ShadowSize, Vec4::new(size, 1.0 / size, 0.0, 0.0));
    params.set_vec4(
        device,
        VecSlot::ShadowCtrl,
        Vec4::new(shadow.weight, shadow.offset, shadow.density, 0.0),
    );
    let fade_len = (shadow.fade_end - shadow.fade_start).max(1e-4);
    params.set_vec4(
        device,
        VecSlot::ShadowFade,
        Vec4::new(shadow.fade_start, 1.0 / fade_len, 0.0, 0.0),
    );

    params.set_vec4(device, VecSlot::BaseColor, mtl.base_color_param());
    params.set_vec4(device, VecSlot::SpecColor, mtl.spec_color_param());
    params.set_vec4(device, VecSlot::SurfParams, Vec4::new(mtl.roughness, mtl.fresnel, 0.0, 0.0));
    let flip = |f: bool| if f { -1.0 } else { 1.0 };
    params.set_vec4(
        device,
        VecSlot::BumpParams,
        Vec4::new(mtl.bump_scale, flip(mtl.flip_tangent), flip(mtl.flip_bitangent), 0.0),
    );
    params.set_vec4(device, VecSlot::AlphaCtrl, Vec4::new(frame.alpha_threshold, 0.0, 0.0, 0.0));

    let fog = &ctx.fog;
    params.set_vec4(device, VecSlot::FogColor, fog.color);
    params.set_vec4(
        device,
        VecSlot::FogParams,
        Vec4::new(fog.start, fog.falloff, fog.curve_p1, fog.curve_p2),
    );

    push_tone(params, device, ctx);
}

pub(crate) fn push_tone<D: GraphicsDevice + ?Sized>(params: &mut ParamCache, device: &mut D, ctx: &Context) {
    let tone = &ctx.tone;
    params.set_vec4(device, VecSlot::InvWhite, tone.inv_white().extend(0.0));
    params.set_vec4(device, VecSlot::ToneGain, tone.gain.extend(0.0));
    params.set_vec4(device, VecSlot::ToneBias, tone.bias.extend(0.0));
    params.set_vec4(device, VecSlot::Exposure, tone.exposure.extend(0.0));
    params.set_vec4(device, VecSlot::InvGamma, tone.inv_gamma().extend(0.0));
}

struct BatchFrame<'a> {
    model: &'a Model,
    batch: &'a ModelBatch,
    material: &'a Material,
    work: &'a ModelWork,
    ctx: &'a Context,
    mode: BatchMode,
    alpha_threshold: f32,
    shadow_size: u32,
}

impl<D: GraphicsDevice> OglBackend<D> {
    /// Variant index and key for a batch, without touching the device.
    pub(crate) fn resolve_variant(
        &self,
        assets: &Assets,
        work: &ModelWork,
        batch_index: usize,
        mode: BatchMode,
        ctx: &Context,
    ) -> Option<(usize, VariantKey)> {
        let table = self.programs.as_ref()?;
        let model = assets.models.get(work.model)?;
        let batch = model.batch(batch_index)?;
        let material = model.effective_material(batch_index, work.variation)?;

        let mut env = EnvFlags::empty();
        env.set(EnvFlags::VERTEX_LIGHTING, ctx.lighting == LightingMode::Vertex);
        env.set(EnvFlags::SPEC_ENABLED, ctx.spec.enabled);
        env.set(EnvFlags::SHADOW_MAP, self.shadow.is_some());
        env.set(
            EnvFlags::SHADOW_IN_RANGE,
            in_shadow_range(batch, work, ctx),
        );
        env.set(
            EnvFlags::BUMP_AVAILABLE,
            self.device.caps().derivatives
                && material
                    .bump_texture
                    .is_some_and(|h| assets.textures.get(h).is_some()),
        );

        let input = SelectInput {
            mode,
            encoding: model.encoding,
            skinned: batch.is_skinned(),
            material: material.flags,
            env,
        };
        let index = table.select(&input)?;
        let key = table.variant(index).key?;
        Some((index, key))
    }

    /// Returns false when the batch was skipped; nothing is drawn then.
    pub(crate) fn draw_batch(
        &mut self,
        assets: &Assets,
        work: &ModelWork,
        batch_index: usize,
        mode: BatchMode,
        ctx: &Context,
    ) -> bool {
        let Some(model) = assets.models.get(work.model) else {
            return false;
        };
        let Some(batch) = model.batch(batch_index) else {
            return false;
        };
        let Some((index_count, byte_offset)) = index_range(model, batch) else {
            log::trace!("Batch {batch_index} of {:?} exceeds its index data", model.name);
            return false;
        };
        let Some(material) = model.effective_material(batch_index, work.variation) else {
            return false;
        };
        let Some((index, key)) = self.resolve_variant(assets, work, batch_index, mode, ctx) else {
            return false;
        };

        let gpu = self.model_gpu(work.model, model);
        let (Some(vbo), Some(ibo)) = (gpu.vbo, gpu.index_buffer(batch.index_width)) else {
            return false;
        };

        let casting = mode == BatchMode::ShadowCast;
        if casting {
            self.set_target(RenderTarget::Shadow);
            if let Some(shadow) = self.shadow.as_mut() {
                if shadow.needs_clear(self.frame) {
                    self.state.set_depth_mask(&mut self.device, true);
                    self.device.clear(None, true);
                }
            }
        } else {
            self.set_target(RenderTarget::Default);
        }
        let msaa = !casting && self.settings.msaa;
        self.state.set_multisample(&mut self.device, msaa);

        let base = material
            .base_texture
            .and_then(|h| self.texture_for(assets, h))
            .or_else(|| self.white_texture());
        let bump = if key.contains(VariantKey::BUMP) {
            material.bump_texture.and_then(|h| self.texture_for(assets, h))
        } else {
            None
        };
        let shadow_depth = if key.contains(VariantKey::RECV) {
            self.shadow.as_ref().map(|s| s.depth)
        } else {
            None
        };

        let frame = BatchFrame {
            model,
            batch,
            material,
            work,
            ctx,
            mode,
            alpha_threshold: alpha_threshold(mode, material, self.settings.shadow_cast_alpha_threshold),
            shadow_size: self.shadow.as_ref().map_or(0, |s| s.size),
        };

        let Some(table) = self.programs.as_mut() else {
            return false;
        };
        let variant = table.variant_mut(index);
        let Some(program) = variant.program else {
            return false;
        };
        self.state.use_program(&mut self.device, program);
        push_params(&mut variant.params, &mut self.device, &frame);

        if let Some(tex) = base {
            self.state.bind_texture(&mut self.device, SamplerSlot::Base.unit(), tex);
        }
        if let Some(tex) = bump.filter(|_| variant.params.has_sampler(SamplerSlot::Bump)) {
            self.state.bind_texture(&mut self.device, SamplerSlot::Bump.unit(), tex);
        }
        if let Some(tex) = shadow_depth {
            self.state.bind_texture(&mut self.device, SamplerSlot::Shadow.unit(), tex);
        }

        let semi = key.contains(VariantKey::SEMI);
        self.state.set_blend(
            &mut self.device,
            if semi { BlendMode::Semi } else { BlendMode::Opaque },
        );
        self.state.set_cull(
            &mut self.device,
            if material.is_double_sided() {
                CullMode::DoubleSided
            } else {
                CullMode::Back
            },
        );
        self.state.set_depth_mask(&mut self.device, !semi);

        variant.bind_geometry(&mut self.device, vbo, ibo);
        let index_type = match batch.index_width {
            IndexWidth::U16 => IndexType::U16,
            IndexWidth::U32 => IndexType::U32,
        };
        self.device
            .draw_indexed(Topology::Triangles, index_type, index_count, byte_offset);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn joint_rows_hold_translation_in_w() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let rows = pack_joint(&m);
        assert_eq!(rows[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rows[2], [0.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn skin_upload_is_sized_by_highest_referenced_joint() {
        let batch = ModelBatch::new(0, IndexWidth::U16, 0, 1).with_joints(vec![2, 7, 5]);
        let work = ModelWork::new(crate::asset::Handle::new(0)).with_joints(vec![Mat4::IDENTITY; 40]);
        let (xforms, map) = skin_arrays(&batch, &work);
        assert_eq!(xforms.len(), 8 * 3);
        assert_eq!(map, vec![[2.0, 7.0, 5.0, 0.0]]);
    }

    #[test]
    fn missing_joints_fall_back_to_world() {
        let batch = ModelBatch::new(0, IndexWidth::U16, 0, 1).with_joints(vec![1]);
        let world = Mat4::from_translation(Vec3::X);
        let work = ModelWork::new(crate::asset::Handle::new(0)).with_world(world);
        let (xforms, _) = skin_arrays(&batch, &work);
        assert_eq!(xforms[3..6], pack_joint(&world));
    }

    #[test]
    fn index_range_rejects_overflowing_batches() {
        let model = Model::from_compact("m", &[]).with_indices16(vec![0; 6]);
        let fits = ModelBatch::new(0, IndexWidth::U16, 3, 1);
        assert_eq!(index_range(&model, &fits), Some((3, 6)));
        let huge = ModelBatch::new(0, IndexWidth::U16, 0, u32::MAX / 2);
        assert_eq!(index_range(&model, &huge), None);
        let far = ModelBatch::new(0, IndexWidth::U16, u32::MAX, 1);
        assert_eq!(index_range(&model, &far), None);
    }

    #[test]
    fn alpha_threshold_selection() {
        let mtl = Material::default().with_alpha_threshold(0.3);
        assert_eq!(alpha_threshold(BatchMode::Standard, &mtl, 0.5), 0.3);
        assert_eq!(alpha_threshold(BatchMode::Discard, &mtl, 0.5), 0.3);
        assert_eq!(alpha_threshold(BatchMode::ShadowCast, &mtl, 0.5), 0.5);
        let zero = Material::default();
        assert_eq!(alpha_threshold(BatchMode::Discard, &zero, 0.5), 0.5);
        assert_eq!(alpha_threshold(BatchMode::Standard, &zero, 0.5), 0.0);
    }
}
