//! Backend contract, collaborator interfaces and the name-keyed registry.

use std::collections::HashMap;
use std::ffi::{c_void, CStr};

use glam::{Mat4, Vec4};

use crate::asset::{Assets, Font, Handle, Model, TextureData};
use crate::error::DrawError;
use crate::renderer::render_context::{Context, ModelWork};
use crate::renderer::vertex::PrimVertex;
use crate::settings::DrawSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchMode {
    Standard,
    /// Alpha-tested pass: alpha materials are drawn opaque unless they force
    /// blending.
    Discard,
    ShadowCast,
}

/// Window and context shim the backend draws through.
pub trait SystemInterface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn swap(&mut self);
    /// GL entry point lookup; null when no context is current.
    fn get_proc_address(&self, name: &CStr) -> *const c_void;
}

/// Fixed-size surface without a GL context.
#[derive(Debug, Clone)]
pub struct HeadlessSystem {
    pub width: u32,
    pub height: u32,
    pub swaps: u64,
}

impl HeadlessSystem {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            swaps: 0,
        }
    }
}

impl SystemInterface for HeadlessSystem {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn swap(&mut self) {
        self.swaps += 1;
    }

    fn get_proc_address(&self, _name: &CStr) -> *const c_void {
        std::ptr::null()
    }
}

/// Hooks the resource manager calls to create and destroy GPU copies of
/// CPU assets. Prepare is idempotent; releasing twice is harmless.
pub trait GfxResourceHooks {
    fn prepare_texture(&mut self, handle: Handle<TextureData>, texture: &TextureData);
    fn release_texture(&mut self, handle: Handle<TextureData>);
    fn prepare_model(&mut self, handle: Handle<Model>, model: &Model);
    fn release_model(&mut self, handle: Handle<Model>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Triangles,
    Lines,
    Points,
}

/// Partial rewrite of the streamed primitive buffers.
#[derive(Debug, Clone, Copy)]
pub struct PrimGeomUpdate<'a> {
    pub vertex_offset: u32,
    pub vertices: &'a [PrimVertex],
    pub index_offset: u32,
    pub indices: &'a [u16],
}

/// A range of the primitive buffers drawn in world space.
#[derive(Debug, Clone, Copy)]
pub struct PrimDesc {
    pub kind: PrimKind,
    pub first_index: u32,
    pub index_count: u32,
    pub world: Mat4,
    pub color: Vec4,
    pub texture: Option<Handle<TextureData>>,
    pub semi: bool,
    pub double_sided: bool,
}

impl PrimDesc {
    pub fn new(kind: PrimKind, first_index: u32, index_count: u32) -> Self {
        Self {
            kind,
            first_index,
            index_count,
            world: Mat4::IDENTITY,
            color: Vec4::ONE,
            texture: None,
            semi: false,
            double_sided: false,
        }
    }
}

/// Screen-space rectangle in pixels, origin top-left.
#[derive(Debug, Clone, Copy)]
pub struct QuadDesc {
    pub rect: [f32; 4],
    pub tex_rect: [f32; 4],
    pub color: Vec4,
    pub texture: Option<Handle<TextureData>>,
    pub semi: bool,
}

impl QuadDesc {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            rect: [x, y, w, h],
            tex_rect: [0.0, 0.0, 1.0, 1.0],
            color: Vec4::ONE,
            texture: None,
            semi: false,
        }
    }
}

/// One glyph of the backend font, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct SymbolDesc {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Vec4,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    pub frames: u64,
    pub batches: u64,
    pub shadow_casts: u64,
    pub prims: u64,
    pub quads: u64,
    pub symbols: u64,
    /// Requests dropped for a missing program, resource or invalid input.
    pub skipped: u64,
}

/// The draw backend contract. All methods run on the thread that owns the
/// graphics context.
pub trait DrawBackend: GfxResourceHooks {
    fn name(&self) -> &str;
    fn init(&mut self, shadow_map_size: u32, font: Option<&Font>);
    fn reset(&mut self);
    fn screen_width(&self) -> u32;
    fn screen_height(&self) -> u32;
    fn shadow_bias_matrix(&self) -> Mat4;
    fn init_prims(&mut self, max_vertices: u32, max_indices: u32);
    fn prim_geom(&mut self, update: &PrimGeomUpdate<'_>);
    fn begin(&mut self, clear_color: Vec4);
    fn end(&mut self);
    fn batch(&mut self, assets: &Assets, work: &ModelWork, batch_index: usize, mode: BatchMode, ctx: &Context);
    fn prim(&mut self, desc: &PrimDesc, ctx: &Context, assets: &Assets);
    fn quad(&mut self, desc: &QuadDesc, assets: &Assets);
    fn symbol(&mut self, desc: &SymbolDesc);
    fn stats(&self) -> DrawStats;
}

/// A factory that could not produce its backend hands the system back so
/// another factory can try.
pub struct BackendUnavailable {
    pub error: DrawError,
    pub sys: Box<dyn SystemInterface>,
}

pub type BackendFactory =
    fn(Box<dyn SystemInterface>, &DrawSettings) -> Result<Box<dyn DrawBackend>, BackendUnavailable>;

pub const DEFAULT_BACKEND: &str = "ogl";
pub const NULL_BACKEND: &str = "null";

pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
    default: &'static str,
}

impl BackendRegistry {
    pub fn new(default: &'static str) -> Self {
        Self {
            factories: HashMap::new(),
            default,
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new(DEFAULT_BACKEND);
        registry.register(DEFAULT_BACKEND, crate::renderer::ogl::create_ogl);
        registry.register(NULL_BACKEND, crate::renderer::ogl::create_null);
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.factories.insert(name, factory).is_some() {
            log::warn!("Backend {name:?} registered twice; keeping the later factory");
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Creates `settings.backend`, falling back to the default for unknown
    /// names and to the null backend when the chosen one is unavailable.
    pub fn create(
        &self,
        settings: &DrawSettings,
        sys: Box<dyn SystemInterface>,
    ) -> Result<Box<dyn DrawBackend>, DrawError> {
        let name = if self.factories.contains_key(settings.backend.as_str()) {
            settings.backend.as_str()
        } else {
            log::warn!(
                "Unknown backend {:?}; using {:?}",
                settings.backend,
                self.default
            );
            self.default
        };
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DrawError::UnknownBackend(name.to_string()))?;
        match factory(sys, settings) {
            Ok(backend) => {
                log::info!("Draw backend {:?} created", backend.name());
                Ok(backend)
            }
            Err(BackendUnavailable { error, sys }) => {
                let fallback = match self.factories.get(NULL_BACKEND) {
                    Some(f) if name != NULL_BACKEND => f,
                    _ => return Err(error),
                };
                log::warn!("Backend {name:?} unavailable ({error}); falling back to {NULL_BACKEND:?}");
                fallback(sys, settings).map_err(|e| e.error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(backend: &str) -> DrawSettings {
        DrawSettings {
            backend: backend.to_string(),
            ..DrawSettings::default()
        }
    }

    #[test]
    fn defaults_are_registered() {
        assert_eq!(BackendRegistry::with_defaults().names(), vec!["null", "ogl"]);
    }

    #[test]
    fn headless_ogl_request_falls_back_to_null() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry
            .create(&settings("ogl"), Box::new(HeadlessSystem::new(64, 32)))
            .unwrap();
        assert_eq!(backend.name(), "null");
        assert_eq!(backend.screen_width(), 64);
    }

    #[test]
    fn unknown_name_uses_default() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry
            .create(&settings("vulkan"), Box::new(HeadlessSystem::new(8, 8)))
            .unwrap();
        // Default "ogl" needs a GL loader, so the chain ends at null.
        assert_eq!(backend.name(), "null");
    }

    #[test]
    fn empty_registry_reports_unknown_backend() {
        let registry = BackendRegistry::new("ogl");
        let err = registry
            .create(&settings("ogl"), Box::new(HeadlessSystem::new(8, 8)))
            .err()
            .unwrap();
        assert!(matches!(err, DrawError::UnknownBackend(_)));
    }
}
