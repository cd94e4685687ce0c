//! GPU memory management.

use crate::context::GraphicsContext;
use crate::error::{GpuError, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// Aggregate memory usage reported by the allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryBudget {
    /// Bytes handed out to live allocations.
    pub allocated_bytes: u64,
    /// Bytes reserved from the driver in memory blocks.
    pub reserved_bytes: u64,
    /// Number of live allocations.
    pub allocation_count: usize,
    /// Number of driver memory blocks.
    pub block_count: usize,
    /// Total size of device-local heaps.
    pub device_local_bytes: u64,
}

impl MemoryBudget {
    /// Fraction of device-local memory reserved by the allocator.
    pub fn reserved_fraction(&self) -> f64 {
        if self.device_local_bytes == 0 {
            return 0.0;
        }
        self.reserved_bytes as f64 / self.device_local_bytes as f64
    }
}

/// An allocation that has not been freed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAllocation {
    pub name: String,
    pub size: u64,
}

/// Owns the general-purpose allocator bound to a [`GraphicsContext`].
///
/// Every GPU memory allocation made through this layer goes through the one
/// allocator held here. The manager borrows the context it was built from,
/// so the allocator is always torn down while the device is still alive:
///
/// ```compile_fail
/// use automata_gpu::{DeviceMemoryManager, GraphicsContext};
///
/// fn teardown(context: GraphicsContext) -> automata_gpu::Result<()> {
///     let memory = DeviceMemoryManager::new(&context)?;
///     drop(context);
///     drop(memory);
///     Ok(())
/// }
/// ```
pub struct DeviceMemoryManager<'ctx> {
    allocator: Mutex<Option<Allocator>>,
    context: &'ctx GraphicsContext,
    device_local_bytes: u64,
}

impl<'ctx> DeviceMemoryManager<'ctx> {
    /// Create an allocator for the context's instance, physical device and device.
    pub fn new(context: &'ctx GraphicsContext) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: context.instance().clone(),
            device: context.device().clone(),
            physical_device: context.physical_device(),
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GpuError::AllocatorCreation(e.to_string()))?;

        let device_local_bytes = context.capabilities().device_local_memory_mb * 1024 * 1024;

        tracing::debug!(
            "Device memory manager ready ({} MB device-local)",
            context.capabilities().device_local_memory_mb
        );

        Ok(Self {
            allocator: Mutex::new(Some(allocator)),
            context,
            device_local_bytes,
        })
    }

    pub fn context(&self) -> &'ctx GraphicsContext {
        self.context
    }

    /// Lock and return the allocator for allocation calls made by engine code.
    pub fn allocator(&self) -> Result<MappedMutexGuard<'_, Allocator>> {
        MutexGuard::try_map(self.allocator.lock(), Option::as_mut)
            .map_err(|_| GpuError::InvalidState("Allocator has been shut down".to_string()))
    }

    /// Current allocator usage.
    pub fn budget(&self) -> MemoryBudget {
        let guard = self.allocator.lock();
        let Some(allocator) = guard.as_ref() else {
            return MemoryBudget {
                device_local_bytes: self.device_local_bytes,
                ..MemoryBudget::default()
            };
        };

        let report = allocator.generate_report();
        MemoryBudget {
            allocated_bytes: report.total_allocated_bytes,
            reserved_bytes: report.total_reserved_bytes,
            allocation_count: report.allocations.len(),
            block_count: report.blocks.len(),
            device_local_bytes: self.device_local_bytes,
        }
    }

    /// Allocations that are still outstanding.
    pub fn live_allocations(&self) -> Vec<LiveAllocation> {
        self.allocator
            .lock()
            .as_ref()
            .map(|allocator| {
                allocator
                    .generate_report()
                    .allocations
                    .into_iter()
                    .map(|a| LiveAllocation {
                        name: a.name,
                        size: a.size,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Create a buffer and bind freshly allocated memory to it.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.context.device().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { self.context.device().get_buffer_memory_requirements(buffer) };

        let allocation = self.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.context.device().destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let bound =
            unsafe { self.context.device().bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) };
        if let Err(err) = bound {
            self.release(allocation)?;
            unsafe { self.context.device().destroy_buffer(buffer, None) };
            return Err(err.into());
        }

        Ok(GpuBuffer {
            buffer,
            allocation: Some(allocation),
            size,
        })
    }

    /// Free a buffer allocation and destroy the buffer.
    pub fn free_buffer(&self, buffer: &mut GpuBuffer) -> Result<()> {
        if let Some(allocation) = buffer.allocation.take() {
            self.release(allocation)?;
        }

        unsafe {
            self.context.device().destroy_buffer(buffer.buffer, None);
        }
        buffer.buffer = vk::Buffer::null();

        Ok(())
    }

    /// Create an image and bind freshly allocated memory to it.
    pub fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuImage> {
        let image = unsafe { self.context.device().create_image(create_info, None)? };
        let requirements = unsafe { self.context.device().get_image_memory_requirements(image) };

        let allocation = self.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: create_info.tiling == vk::ImageTiling::LINEAR,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.context.device().destroy_image(image, None) };
                return Err(err);
            }
        };

        let bound =
            unsafe { self.context.device().bind_image_memory(image, allocation.memory(), allocation.offset()) };
        if let Err(err) = bound {
            self.release(allocation)?;
            unsafe { self.context.device().destroy_image(image, None) };
            return Err(err.into());
        }

        Ok(GpuImage {
            image,
            allocation: Some(allocation),
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    /// Free an image allocation and destroy the image.
    pub fn free_image(&self, image: &mut GpuImage) -> Result<()> {
        if let Some(allocation) = image.allocation.take() {
            self.release(allocation)?;
        }

        unsafe {
            self.context.device().destroy_image(image.image, None);
        }
        image.image = vk::Image::null();

        Ok(())
    }

    fn allocate(&self, desc: &AllocationCreateDesc<'_>) -> Result<Allocation> {
        self.allocator()?
            .allocate(desc)
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))
    }

    fn release(&self, allocation: Allocation) -> Result<()> {
        self.allocator()?
            .free(allocation)
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))
    }

    /// Destroy the allocator, freeing all GPU memory it still holds.
    ///
    /// Outstanding allocations are logged as leaks. Safe to call more than
    /// once; only the first call does anything.
    pub fn shutdown(&self) {
        let Some(allocator) = self.allocator.lock().take() else {
            return;
        };

        for leak in allocator.generate_report().allocations {
            tracing::warn!("Leaked GPU allocation '{}' ({} bytes)", leak.name, leak.size);
        }

        drop(allocator);
        tracing::debug!("Device memory manager shut down");
    }
}

impl Drop for DeviceMemoryManager<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A GPU buffer with its allocation.
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub size: u64,
}

impl GpuBuffer {
    /// Host-visible contents of the buffer, if it is mapped.
    pub fn mapped_bytes(&self) -> Option<&[u8]> {
        self.allocation.as_ref().and_then(Allocation::mapped_slice)
    }

    /// Write data to the buffer (must be host-visible).
    pub fn write_bytes(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| GpuError::InvalidState("Offset overflow".to_string()))?;
        if end > self.size {
            return Err(GpuError::InvalidState(
                "Data range too large for buffer".to_string(),
            ));
        }

        let slice = self
            .allocation
            .as_mut()
            .and_then(Allocation::mapped_slice_mut)
            .ok_or_else(|| GpuError::InvalidState("Buffer not mapped".to_string()))?;

        let start = offset as usize;
        slice[start..start + data.len()].copy_from_slice(data);

        Ok(())
    }
}

/// A GPU image with its allocation.
pub struct GpuImage {
    pub image: vk::Image,
    pub allocation: Option<Allocation>,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}
