//! Debugger error types.

use ash::vk;
use automata_gpu::GpuError;
use thiserror::Error;

/// Errors from debugger operations that touch the GPU or the filesystem.
///
/// Misuse of the instrumentation hooks is reported through the message log,
/// not through this type.
#[derive(Error, Debug)]
pub enum DebugError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not available on this debugger")]
    Unavailable(&'static str),
    #[error("Resource not tracked: {0}")]
    UnknownResource(String),
    #[error("Unsupported image format for capture: {0:?}")]
    UnsupportedFormat(vk::Format),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

pub type Result<T> = std::result::Result<T, DebugError>;
