pub mod batch;
pub mod params;
pub mod prims;
pub mod program_cache;
pub mod programs;
pub mod resources;
pub mod selector;
pub mod shadow;
pub mod state;

pub(crate) use prims::{CornerBuffers, PrimBuffers};
pub(crate) use program_cache::ProgramCache;
pub(crate) use programs::ProgramTable;
pub use programs::ProgramTableStats;
pub(crate) use resources::{GpuResources, ModelGpu};
pub use selector::{is_semi, select_key, EnvFlags, SelectInput, VariantKey};
pub(crate) use shadow::{shadow_bias_matrix, ShadowTarget};
pub(crate) use state::{RenderState, RenderTarget, TargetSetup};
