//! Compute context management.

use crate::capabilities::GpuCapabilities;
use crate::command::ScopedCommandPool;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_compute_device};
use ash::vk;
use parking_lot::Mutex;

/// Owns the Vulkan instance, the compute device, its queue and a command pool.
///
/// Dropping the context tears these down in reverse creation order. A
/// [`DeviceMemoryManager`](crate::DeviceMemoryManager) borrows the context,
/// so it is always dropped first.
pub struct GraphicsContext {
    // Keeps the loader library mapped.
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    capabilities: GpuCapabilities,

    compute_queue_family: u32,
    compute_queue: vk::Queue,
    command_pool: Mutex<ScopedCommandPool>,

    validation_enabled: bool,
    debug_utils_enabled: bool,
}

impl GraphicsContext {
    /// Bring up a context with default settings.
    pub fn new() -> Result<Self> {
        GraphicsContextBuilder::new().build()
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The device picked by first-match compute queue selection.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    pub fn compute_queue_family(&self) -> u32 {
        self.compute_queue_family
    }

    /// Queue 0 of [`compute_queue_family`](Self::compute_queue_family).
    pub fn compute_queue(&self) -> vk::Queue {
        self.compute_queue
    }

    /// Whether the validation layers were enabled on the instance.
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Whether `VK_EXT_debug_utils` was enabled on the instance.
    pub fn debug_utils_enabled(&self) -> bool {
        self.debug_utils_enabled
    }

    /// Allocate a primary command buffer and begin it for one-time submission.
    ///
    /// Pair with [`end_scoped_commands`](Self::end_scoped_commands). Meant for
    /// setup and teardown transfers, not per-frame dispatch.
    pub fn begin_scoped_commands(&self) -> Result<vk::CommandBuffer> {
        let mut pool = self.command_pool.lock();
        unsafe { pool.begin(&self.device) }
    }

    /// Close, submit and wait for a buffer from
    /// [`begin_scoped_commands`](Self::begin_scoped_commands), then free it.
    ///
    /// Blocks until the compute queue is idle. The buffer is freed even when
    /// submission fails.
    pub fn end_scoped_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let mut pool = self.command_pool.lock();
        unsafe { pool.submit_and_wait(&self.device, self.compute_queue, cmd) }
    }

    /// Record with `f` into a scoped command buffer and run it to completion.
    pub fn execute_scoped_commands<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let cmd = self.begin_scoped_commands()?;
        f(&self.device, cmd);
        self.end_scoped_commands(cmd)
    }

    /// Block until every queue on the device has drained.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.command_pool.get_mut().destroy(&self.device);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        tracing::debug!("Graphics context destroyed");
    }
}

/// Builder for creating a [`GraphicsContext`].
pub struct GraphicsContextBuilder {
    app_name: String,
    enable_validation: bool,
    enable_debug_labels: bool,
}

impl Default for GraphicsContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Automata".to_string(),
            enable_validation: cfg!(debug_assertions),
            enable_debug_labels: true,
        }
    }
}

impl GraphicsContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name reported to the driver and to capture tools.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    ///
    /// Validation is only turned on when the layers are installed.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Enable or disable the debug utils extension used for command labels.
    pub fn debug_labels(mut self, enable: bool) -> Self {
        self.enable_debug_labels = enable;
        self
    }

    /// Build the context.
    ///
    /// Either every object is created or everything created so far is
    /// destroyed before the error is returned.
    pub fn build(self) -> Result<GraphicsContext> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let setup = unsafe {
            create_instance(
                &entry,
                &self.app_name,
                self.enable_validation,
                self.enable_debug_labels,
            )
        }?;
        let instance = setup.instance;

        let (physical_device, compute_queue_family) =
            match unsafe { select_compute_device(&instance) } {
                Ok(selected) => selected,
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            };

        let capabilities =
            unsafe { GpuCapabilities::query(&instance, physical_device, compute_queue_family) };
        tracing::info!(
            "Selected GPU: {} (compute family {})",
            capabilities.summary(),
            compute_queue_family
        );

        let device = match unsafe { create_device(&instance, physical_device, compute_queue_family) }
        {
            Ok(device) => device,
            Err(err) => {
                unsafe { instance.destroy_instance(None) };
                return Err(err);
            }
        };

        let command_pool = match unsafe { ScopedCommandPool::new(&device, compute_queue_family) } {
            Ok(pool) => pool,
            Err(err) => {
                unsafe {
                    device.destroy_device(None);
                    instance.destroy_instance(None);
                }
                return Err(err);
            }
        };

        let compute_queue = unsafe { device.get_device_queue(compute_queue_family, 0) };

        Ok(GraphicsContext {
            entry,
            instance,
            physical_device,
            device,
            capabilities,
            compute_queue_family,
            compute_queue,
            command_pool: Mutex::new(command_pool),
            validation_enabled: setup.validation_enabled,
            debug_utils_enabled: setup.debug_utils_enabled,
        })
    }
}

/// Create the logical device with a single queue from the compute family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    compute_queue_family: u32,
) -> Result<ash::Device> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(compute_queue_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&features);

    let device = instance.create_device(physical_device, &device_create_info, None)?;

    Ok(device)
}
