//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// The Vulkan loader could not be found or loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(vk::Result),

    /// The instance enumerated zero physical devices.
    #[error("No GPU with Vulkan support found")]
    NoPhysicalDevice,

    /// No physical device exposes a compute-capable queue family.
    #[error("No GPU exposes a compute queue")]
    NoComputeQueue,

    /// The memory allocator could not be created.
    #[error("Allocator creation failed: {0}")]
    AllocatorCreation(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// The logical device was lost. The context must be rebuilt.
    #[error("Device lost")]
    DeviceLost,

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// Whether this error means no usable compute device could be brought up.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::Loading(_) | Self::NoPhysicalDevice | Self::NoComputeQueue
        )
    }

    /// Whether this error is a lost device.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost)
    }
}

impl From<vk::Result> for GpuError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            other => Self::Vulkan(other),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
