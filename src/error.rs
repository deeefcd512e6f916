use std::path::PathBuf;

use thiserror::Error;

/// Failures while building backend objects. None of these escape the draw
/// entry points; they are logged once and the affected slice is skipped.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("shader `{name}` failed to compile: {log}")]
    ShaderCompile { name: String, log: String },
    #[error("program `{label}` failed to link: {log}")]
    ProgramLink { label: String, log: String },
    #[error("failed to create {what}: {reason}")]
    Resource { what: &'static str, reason: String },
    #[error("unknown backend `{0}`")]
    UnknownBackend(String),
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ProgramCacheError {
    #[error("cache file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache blob is {0} bytes, shorter than its header")]
    Truncated(usize),
    #[error("bad signature {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("header declares {declared} bytes but {actual} follow")]
    SizeMismatch { declared: u32, actual: usize },
    #[error("binary format {found:#x} does not match driver format {expected:#x}")]
    FormatMismatch { expected: u32, found: u32 },
    #[error("binary was linked from different shader sources")]
    SourceMismatch,
}
