//! Vulkan compute layer for the automata simulator.
//!
//! This crate provides:
//! - Vulkan instance and compute device bring-up
//! - GPU capability detection
//! - Memory allocation via gpu-allocator, with budget and leak reporting
//! - Command pool management and blocking scoped command submission
//!
//! Construction order is [`GraphicsContext`] then [`DeviceMemoryManager`];
//! the manager must be dropped before the context.

pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::ScopedCommandPool;
pub use context::{GraphicsContext, GraphicsContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{DeviceMemoryManager, GpuBuffer, GpuImage, LiveAllocation, MemoryBudget};

// Re-exported so dependents name the same versions.
pub use ash::vk;
pub use gpu_allocator::MemoryLocation;
