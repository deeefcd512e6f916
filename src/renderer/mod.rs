pub mod backend;
pub mod glow_device;
pub mod gpu;
pub(crate) mod internal;
pub mod material;
pub mod ogl;
pub mod recording;
pub mod render_context;
pub mod vertex;

pub use backend::{
    BackendFactory, BackendRegistry, BackendUnavailable, BatchMode, DrawBackend, DrawStats,
    GfxResourceHooks, HeadlessSystem, PrimDesc, PrimGeomUpdate, PrimKind, QuadDesc, SymbolDesc,
    SystemInterface, DEFAULT_BACKEND, NULL_BACKEND,
};
pub use glow_device::GlowDevice;
pub use gpu::{DeviceCaps, GraphicsDevice};
pub use internal::{is_semi, select_key, EnvFlags, ProgramTableStats, SelectInput, VariantKey};
pub use material::{Material, MaterialFlags};
pub use ogl::OglBackend;
pub use recording::{DeviceStats, DrawRecord, RecordingDevice};
pub use render_context::{
    Context, FogParams, HemiParams, LightingMode, ModelWork, ShadowParams, SpecParams, ToneParams,
    ViewParams,
};
pub use vertex::{PrimVertex, VertexCompact, VertexEncoding, VertexExtended};
