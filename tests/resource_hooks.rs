mod common;

use gl_batch::asset::{Assets, TextureData};
use gl_batch::renderer::{BatchMode, DrawBackend, GfxResourceHooks, Material, ModelWork, RecordingDevice};

use common::{add_quad, backend, scene_context};

#[test]
fn prepare_model_is_idempotent() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let handle = add_quad(&mut assets, Material::new("plain"));
    let model = assets.models.get(handle).unwrap().clone();

    backend.prepare_model(handle, &model);
    let created = backend.device().stats().buffers_created;
    backend.prepare_model(handle, &model);

    assert_eq!(created, 2);
    assert_eq!(backend.device().stats().buffers_created, created);
}

#[test]
fn double_release_is_harmless() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let handle = add_quad(&mut assets, Material::new("plain"));
    let baseline = backend.device().live_buffers();
    let model = assets.models.get(handle).unwrap().clone();

    backend.prepare_model(handle, &model);
    backend.release_model(handle);
    backend.release_model(handle);

    assert_eq!(backend.device().live_buffers(), baseline);
    assert_eq!(backend.device().stats().buffers_deleted, 2);
}

#[test]
fn unloading_an_asset_releases_its_gpu_copy() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let handle = add_quad(&mut assets, Material::new("plain"));
    let baseline = backend.device().live_buffers();
    let ctx = scene_context(false);

    backend.batch(&assets, &ModelWork::new(handle), 0, BatchMode::Standard, &ctx);
    assert_eq!(backend.device().live_buffers(), baseline + 2);

    assert!(assets.unload_model(handle, &mut backend).is_some());
    assert_eq!(backend.device().live_buffers(), baseline);

    backend.batch(&assets, &ModelWork::new(handle), 0, BatchMode::Standard, &ctx);
    assert_eq!(backend.stats().skipped, 1);
}

#[test]
fn textures_follow_the_same_lifecycle() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let texture = assets.add_texture(TextureData::solid("red", 2, 2, [255, 0, 0, 255]));
    let baseline = backend.device().live_textures();
    let data = assets.textures.get(texture).unwrap().clone();

    backend.prepare_texture(texture, &data);
    backend.prepare_texture(texture, &data);
    assert_eq!(backend.device().live_textures(), baseline + 1);

    assets.unload_texture(texture, &mut backend);
    backend.release_texture(texture);
    assert_eq!(backend.device().live_textures(), baseline);
}

#[test]
fn base_texture_is_uploaded_on_first_use() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let texture = assets.add_texture(TextureData::solid("red", 2, 2, [255, 0, 0, 255]));
    let work = ModelWork::new(add_quad(
        &mut assets,
        Material::new("textured").with_base_texture(texture),
    ));
    let ctx = scene_context(false);

    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);
    backend.batch(&assets, &work, 0, BatchMode::Standard, &ctx);

    assert_eq!(backend.device().stats().textures_created, 1);
}

#[test]
fn reset_releases_everything() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let work = ModelWork::new(add_quad(&mut assets, Material::new("plain")));
    backend.init_prims(64, 128);
    backend.batch(&assets, &work, 0, BatchMode::Standard, &scene_context(true));

    backend.reset();

    let dev = backend.device();
    assert_eq!(dev.live_buffers(), 0);
    assert_eq!(dev.live_textures(), 0);
    assert_eq!(dev.live_programs(), 0);
    assert!(!backend.is_initialized());
}
