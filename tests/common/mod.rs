#![allow(dead_code)]

use gl_batch::asset::{Assets, Font, Handle, IndexWidth, Model, ModelBatch};
use gl_batch::renderer::{
    Context, DrawBackend, HeadlessSystem, Material, OglBackend, RecordingDevice, ShadowParams,
    VertexCompact, ViewParams,
};
use gl_batch::DrawSettings;
use glam::{Mat4, Vec2, Vec3};

pub const SCREEN: (u32, u32) = (320, 240);

pub fn backend(device: RecordingDevice) -> OglBackend<RecordingDevice> {
    backend_with(device, DrawSettings::default(), None)
}

pub fn backend_with(
    device: RecordingDevice,
    settings: DrawSettings,
    font: Option<&Font>,
) -> OglBackend<RecordingDevice> {
    let sys = Box::new(HeadlessSystem::new(SCREEN.0, SCREEN.1));
    let mut backend = OglBackend::new("null", device, sys, settings);
    backend.init(1024, font);
    backend.device_mut().reset_stats();
    backend
}

/// Two triangles sharing one material.
pub fn quad_model(material: Material) -> Model {
    let v = VertexCompact::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO);
    Model::from_compact("quad", &[v; 4])
        .with_indices16(vec![0, 1, 2, 0, 2, 3])
        .with_material(material)
        .with_batch(ModelBatch::new(0, IndexWidth::U16, 0, 2))
}

pub fn add_quad(assets: &mut Assets, material: Material) -> Handle<Model> {
    assets.add_model(quad_model(material))
}

/// Viewer five units from the origin; shadows optionally on with the
/// default fade distances.
pub fn scene_context(shadows: bool) -> Context {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh_gl(1.0, 4.0 / 3.0, 0.1, 100.0);
    Context {
        view: ViewParams::new(view, proj),
        shadow: ShadowParams {
            enabled: shadows,
            light_view_proj: Mat4::orthographic_rh_gl(-10.0, 10.0, -10.0, 10.0, 0.1, 50.0),
            ..ShadowParams::default()
        },
        ..Context::default()
    }
}

pub fn test_font() -> Font {
    Font {
        glyph_width: 8,
        glyph_height: 8,
        first_char: 32,
        glyph_count: 96,
        columns: 16,
        coverage: vec![255; 16 * 8 * 6 * 8],
    }
}
