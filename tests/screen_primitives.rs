mod common;

use gl_batch::asset::{Assets, TextureData};
use gl_batch::renderer::gpu::{IndexType, Topology};
use gl_batch::renderer::{
    DrawBackend, PrimDesc, PrimGeomUpdate, PrimKind, PrimVertex, QuadDesc, RecordingDevice,
    SymbolDesc,
};
use gl_batch::DrawSettings;
use glam::Vec4;

use common::{backend, backend_with, scene_context, test_font};

fn glyph(ch: char) -> SymbolDesc {
    SymbolDesc {
        ch,
        x: 4.0,
        y: 4.0,
        width: 8.0,
        height: 8.0,
        color: Vec4::ONE,
    }
}

#[test]
fn prim_draws_a_range_of_the_streamed_buffers() {
    let mut backend = backend(RecordingDevice::new());
    let assets = Assets::new();
    backend.init_prims(64, 128);
    let vertices = [PrimVertex::default(); 4];
    backend.prim_geom(&PrimGeomUpdate {
        vertex_offset: 0,
        vertices: &vertices,
        index_offset: 0,
        indices: &[0, 1, 1, 2, 2, 3],
    });

    backend.prim(&PrimDesc::new(PrimKind::Lines, 2, 4), &scene_context(false), &assets);

    let draw = &backend.device().draws()[0];
    assert_eq!(draw.program.as_deref(), Some("prim+prim"));
    assert_eq!(draw.topology, Topology::Lines);
    assert_eq!(draw.index_type, IndexType::U16);
    assert_eq!((draw.count, draw.byte_offset), (4, 4));
    assert_eq!(backend.stats().prims, 1);
}

#[test]
fn prim_outside_the_buffers_is_skipped() {
    let mut backend = backend(RecordingDevice::new());
    let assets = Assets::new();
    let ctx = scene_context(false);

    backend.prim(&PrimDesc::new(PrimKind::Triangles, 0, 3), &ctx, &assets);
    backend.init_prims(8, 12);
    backend.prim(&PrimDesc::new(PrimKind::Triangles, 9, 6), &ctx, &assets);

    assert!(backend.device().draws().is_empty());
    assert_eq!(backend.stats().skipped, 2);
}

#[test]
fn quads_draw_on_the_screen_target() {
    let mut backend = backend(RecordingDevice::new());
    let mut assets = Assets::new();
    let texture = assets.add_texture(TextureData::solid("icon", 4, 4, [0, 255, 0, 255]));
    let mut desc = QuadDesc::new(10.0, 10.0, 64.0, 32.0);
    desc.texture = Some(texture);
    desc.semi = true;

    backend.quad(&desc, &assets);
    backend.quad(&desc, &assets);

    let dev = backend.device();
    assert_eq!(dev.draws().len(), 2);
    assert_eq!(dev.draws()[0].program.as_deref(), Some("quad+quad"));
    assert_eq!(dev.draws()[0].count, 6);
    assert_eq!(dev.stats().blend_enables, 1);
    assert_eq!(dev.uploads_of("uQuadRect"), 1);
    assert_eq!(dev.stats().textures_created, 1);
}

#[test]
fn symbols_need_a_font_that_covers_them() {
    let mut without = backend(RecordingDevice::new());
    without.symbol(&glyph('A'));
    assert_eq!(without.stats().skipped, 1);

    let font = test_font();
    let mut backend = backend_with(RecordingDevice::new(), DrawSettings::default(), Some(&font));
    backend.symbol(&glyph('A'));
    backend.symbol(&glyph('\u{2603}'));

    let dev = backend.device();
    assert_eq!(dev.draws().len(), 1);
    assert_eq!(dev.draws()[0].program.as_deref(), Some("quad+symbol"));
    assert_eq!(backend.stats().symbols, 1);
    assert_eq!(backend.stats().skipped, 1);
}

#[test]
fn switching_between_world_and_screen_targets_rebinds_framebuffers() {
    let mut backend = backend(RecordingDevice::new());
    let assets = Assets::new();
    backend.init_prims(8, 12);
    backend.prim_geom(&PrimGeomUpdate {
        vertex_offset: 0,
        vertices: &[PrimVertex::default(); 3],
        index_offset: 0,
        indices: &[0, 1, 2],
    });
    let ctx = scene_context(false);
    let prim = PrimDesc::new(PrimKind::Triangles, 0, 3);
    let quad = QuadDesc::new(0.0, 0.0, 8.0, 8.0);

    backend.prim(&prim, &ctx, &assets);
    backend.quad(&quad, &assets);
    backend.prim(&prim, &ctx, &assets);

    assert_eq!(backend.device().stats().framebuffer_binds, 3);
    assert_eq!(backend.device().draws().len(), 3);
}
