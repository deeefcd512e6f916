mod common;

use gl_batch::asset::{Assets, IndexWidth, Model, ModelBatch, TextureData};
use gl_batch::renderer::gpu::{IndexType, Topology};
use gl_batch::renderer::{
    BatchMode, DrawBackend, Material, MaterialFlags, ModelWork, PrimGeomUpdate, PrimVertex,
    RecordingDevice, ViewParams,
};
use glam::{Mat4, Vec3, Vec4};

use common::{add_quad, backend, quad_model, scene_context};

#[test]
fn batch_issues_one_indexed_draw_with_selected_program() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let model = add_quad(&mut assets, Material::new("plain"));

    backend.batch(&assets, &ModelWork::new(model), 0, BatchMode::Standard, &scene_context(false));

    let draws = backend.device().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program.as_deref(), Some("model_h_rigid+hemi_opaque"));
    assert_eq!(draws[0].topology, Topology::Triangles);
    assert_eq!(draws[0].index_type, IndexType::U16);
    assert_eq!(draws[0].count, 6);
    assert_eq!(draws[0].byte_offset, 0);
    assert_eq!(backend.stats().batches, 1);
}

#[test]
fn index_offset_is_converted_to_bytes() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let model = quad_model(Material::new("plain"))
        .with_indices32((0..12).collect())
        .with_batch(ModelBatch::new(0, IndexWidth::U32, 6, 2));
    let model = assets.add_model(model);

    backend.batch(&assets, &ModelWork::new(model), 1, BatchMode::Standard, &scene_context(false));

    let draw = &backend.device().draws()[0];
    assert_eq!(draw.index_type, IndexType::U32);
    assert_eq!(draw.byte_offset, 24);
}

#[test]
fn repeated_batch_reaches_the_driver_only_for_the_draw() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("plain")));
    let ctx = scene_context(true);

    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);
    backend.device_mut().reset_stats();
    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);

    let stats = backend.device().stats();
    assert_eq!(stats.uniform_uploads, 0);
    assert_eq!(stats.program_binds, 0);
    assert_eq!(stats.texture_binds, 0);
    assert_eq!(stats.attrib_binds, 0);
    assert_eq!(stats.buffers_created, 0);
    assert_eq!(stats.blend_enables + stats.blend_disables, 0);
    assert_eq!(stats.draws, 1);
}

#[test]
fn changed_view_uploads_only_view_parameters() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("plain")));
    let mut ctx = scene_context(false);

    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);
    backend.device_mut().reset_stats();
    ctx.view = ViewParams::new(
        Mat4::look_at_rh(Vec3::new(1.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
        ctx.view.proj,
    );
    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);

    let dev = backend.device();
    assert_eq!(dev.uploads_of("uViewProj"), 1);
    assert_eq!(dev.uploads_of("uViewPos"), 1);
    assert_eq!(dev.uploads_of("uWorld"), 0);
    assert_eq!(dev.uploads_of("uFogColor"), 0);
}

#[test]
fn semi_batches_enable_blending_once() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(
        &mut assets,
        Material::new("glass").with_flags(MaterialFlags::ALPHA),
    ));
    let ctx = scene_context(false);

    for _ in 0..10 {
        backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);
    }

    assert_eq!(backend.device().stats().blend_enables, 1);
    assert_eq!(backend.device().stats().draws, 10);
}

#[test]
fn failed_variant_skips_without_drawing() {
    let mut backend = backend(RecordingDevice::new().fail_link_for("hemi_opaque"));
    let mut assets = Assets::new();
    let ctx = scene_context(false);
    let broken = ModelWork::new(add_quad(&mut assets, Material::new("plain")));
    let working = ModelWork::new(add_quad(
        &mut assets,
        Material::new("glass").with_flags(MaterialFlags::ALPHA),
    ));

    backend.batch(&assets, &broken, 0, BatchMode::Standard, &ctx);
    assert!(backend.device().draws().is_empty());
    assert_eq!(backend.stats().batches, 0);
    assert_eq!(backend.stats().skipped, 1);

    backend.batch(&assets, &working, 0, BatchMode::Standard, &ctx);
    assert_eq!(backend.device().draws().len(), 1);
}

#[test]
fn batch_past_index_data_is_skipped() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let model = quad_model(Material::new("plain"))
        .with_batch(ModelBatch::new(0, IndexWidth::U16, 3, 2))
        .with_batch(ModelBatch::new(0, IndexWidth::U16, 0, u32::MAX / 2))
        .with_batch(ModelBatch::new(0, IndexWidth::U16, u32::MAX, 1));
    let model = assets.add_model(model);
    let ctx = scene_context(false);

    for batch in [1, 2, 3, 7] {
        backend.batch(&assets, &ModelWork::new(model), batch, BatchMode::Standard, &ctx);
    }

    assert!(backend.device().draws().is_empty());
    assert_eq!(backend.stats().skipped, 4);
}

#[test]
fn batch_without_gpu_buffers_leaves_the_device_untouched() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let empty = Model::from_compact("empty", &[])
        .with_indices16(vec![0, 1, 2])
        .with_material(Material::new("plain"))
        .with_batch(ModelBatch::new(0, IndexWidth::U16, 0, 1));
    let work = ModelWork::new(assets.add_model(empty));
    let ctx = scene_context(true);

    backend.batch(&assets, &work, 0, BatchMode::ShadowCast, &ctx);
    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);

    let stats = backend.device().stats();
    assert_eq!(stats.framebuffer_binds, 0);
    assert_eq!(stats.viewports, 0);
    assert_eq!(stats.clears, 0);
    assert_eq!(stats.blend_enables + stats.blend_disables, 0);
    assert_eq!(stats.cull_enables + stats.cull_disables, 0);
    assert_eq!(stats.multisample_changes, 0);
    assert_eq!(stats.draws, 0);
    assert_eq!(backend.stats().skipped, 2);
}

#[test]
fn lazy_uploads_do_not_disturb_earlier_bindings() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let tex_a = assets.add_texture(TextureData::solid("a", 1, 1, [255, 0, 0, 128]));
    let tex_b = assets.add_texture(TextureData::solid("b", 1, 1, [0, 255, 0, 255]));
    let glass = ModelWork::new(add_quad(
        &mut assets,
        Material::new("glass")
            .with_flags(MaterialFlags::ALPHA)
            .with_base_texture(tex_a),
    ));
    let crate_box = ModelWork::new(add_quad(
        &mut assets,
        Material::new("crate")
            .without_flags(MaterialFlags::RECEIVE_SHADOWS)
            .with_base_texture(tex_b),
    ));
    let ctx = scene_context(true);

    backend.batch(&assets, &glass, 0, BatchMode::Standard, &ctx);
    backend.batch(&assets, &crate_box, 0, BatchMode::Standard, &ctx);
    backend.batch(&assets, &glass, 0, BatchMode::Standard, &ctx);

    let draws = backend.device().draws();
    assert_eq!(draws.len(), 3);
    assert!(draws[0].textures[5].is_some(), "shadow map bound for the receiver");
    assert_ne!(draws[1].index_buffer, draws[0].index_buffer);
    assert_eq!(draws[2].index_buffer, draws[0].index_buffer);
    assert_eq!(draws[2].textures[0], draws[0].textures[0]);
    assert_eq!(draws[2].textures[5], draws[0].textures[5]);
}

#[test]
fn received_shadows_bind_the_depth_map() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("plain")));

    backend.batch(&assets, &work, 0, BatchMode::Standard, &scene_context(true));

    // Base (white fallback) and shadow depth.
    assert_eq!(backend.device().stats().texture_binds, 2);
    assert_eq!(backend.device().uploads_of("uShadowMtx"), 1);
}

#[test]
fn shadow_map_is_cleared_once_per_frame() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("caster")));
    let ctx = scene_context(true);

    backend.batch(&assets, &work, 0, BatchMode::ShadowCast, &ctx);
    backend.batch(&assets, &work, 0, BatchMode::ShadowCast, &ctx);
    assert_eq!(backend.device().stats().clears, 1);

    backend.begin(Vec4::ZERO);
    backend.batch(&assets, &work, 0, BatchMode::ShadowCast, &ctx);
    assert_eq!(backend.device().stats().clears, 3);

    let draws = backend.device().draws();
    assert!(draws.iter().all(|d| d.program.as_deref() == Some("cast_h_rigid+cast")));
    assert_eq!(backend.stats().shadow_casts, 3);
}

#[test]
fn skinned_batch_uploads_joints_instead_of_world() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let mut skinned = quad_model(Material::new("skin"));
    skinned.batches[0] = skinned.batches[0].clone().with_joints(vec![0, 1]);
    let handle = assets.add_model(skinned);
    let work = ModelWork::new(handle).with_joints(vec![Mat4::IDENTITY; 2]);

    backend.batch(&assets, &work, 0, BatchMode::Standard, &scene_context(false));

    let dev = backend.device();
    assert_eq!(dev.draws()[0].program.as_deref(), Some("model_h_skin+hemi_opaque"));
    assert_eq!(dev.uploads_of("uSkinXforms"), 1);
    assert_eq!(dev.uploads_of("uSkinMap"), 1);
    assert_eq!(dev.uploads_of("uWorld"), 0);
}

#[test]
fn frame_bracket_counts_frames() {
    let mut backend = backend(RecordingDevice::new());
    backend.begin(Vec4::new(0.1, 0.2, 0.3, 1.0));
    backend.end();
    assert_eq!(backend.stats().frames, 1);
    assert_eq!(backend.device().stats().clears, 1);
}

#[test]
fn streaming_primitives_between_batches_keeps_the_model_indices() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("plain")));
    let ctx = scene_context(false);

    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);
    backend.init_prims(16, 32);
    backend.prim_geom(&PrimGeomUpdate {
        vertex_offset: 0,
        vertices: &[PrimVertex::default(); 3],
        index_offset: 0,
        indices: &[0, 1, 2],
    });
    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);

    let draws = backend.device().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].index_buffer, draws[0].index_buffer);
}
