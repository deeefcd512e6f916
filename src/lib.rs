//! Batch dispatch engine of an OpenGL draw backend: a closed table of
//! shader program variants, per-program uniform caches, a render-state
//! cache and the per-batch executor that ties them together.

pub mod asset;
pub mod error;
pub mod renderer;
pub mod settings;

pub use error::{DrawError, ProgramCacheError};
pub use renderer::{BackendRegistry, BatchMode, DrawBackend, GfxResourceHooks, OglBackend};
pub use settings::DrawSettings;

/// Installs the `env_logger` backend at `info` unless `RUST_LOG` says
/// otherwise. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Creates the configured backend on `sys` and initialises it with the
/// shadow map and primitive buffers sized by `settings`.
pub fn create_backend(
    settings: &DrawSettings,
    sys: Box<dyn renderer::SystemInterface>,
    font: Option<&asset::Font>,
) -> Result<Box<dyn DrawBackend>, DrawError> {
    let mut backend = BackendRegistry::with_defaults().create(settings, sys)?;
    backend.init(settings.shadow_map_size, font);
    backend.init_prims(settings.max_prim_vertices, settings.max_prim_indices);
    Ok(backend)
}
