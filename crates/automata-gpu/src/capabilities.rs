//! GPU capability detection.

use ash::vk;

/// Vendor of the selected device, from its PCI vendor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Snapshot of the selected compute device, taken once at bring-up.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    pub vendor: GpuVendor,
    pub device_name: String,
    pub api_version: u32,
    pub driver_version: u32,

    /// Nanoseconds per timestamp tick.
    pub timestamp_period: f32,
    /// Meaningful bits in compute-queue timestamps. Zero means no timestamps.
    pub timestamp_valid_bits: u32,

    /// Sum of device-local heaps, in MiB.
    pub device_local_memory_mb: u64,

    pub max_compute_workgroup_count: [u32; 3],
    pub max_compute_workgroup_size: [u32; 3],
    pub max_compute_workgroup_invocations: u32,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid, and `compute_family`
    /// must be one of the device's queue family indices.
    pub unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        compute_family: u32,
    ) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        let families = instance.get_physical_device_queue_family_properties(physical_device);

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_string());

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        let timestamp_valid_bits = families
            .get(compute_family as usize)
            .map_or(0, |family| family.timestamp_valid_bits);

        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            api_version: properties.api_version,
            driver_version: properties.driver_version,

            timestamp_period: properties.limits.timestamp_period,
            timestamp_valid_bits,

            device_local_memory_mb,

            max_compute_workgroup_count: properties.limits.max_compute_work_group_count,
            max_compute_workgroup_size: properties.limits.max_compute_work_group_size,
            max_compute_workgroup_invocations: properties.limits.max_compute_work_group_invocations,
        }
    }

    /// Whether timestamps can be written on the compute queue.
    pub fn supports_timestamps(&self) -> bool {
        self.timestamp_valid_bits > 0 && self.timestamp_period > 0.0
    }

    /// Whether a dispatch of `groups` workgroups fits the device limits.
    pub fn workgroups_within_limits(&self, groups: [u32; 3]) -> bool {
        groups
            .iter()
            .zip(self.max_compute_workgroup_count)
            .all(|(&count, max)| count <= max)
    }

    /// Mask applied to raw timestamp values before differencing.
    pub fn timestamp_mask(&self) -> u64 {
        match self.timestamp_valid_bits {
            0 => 0,
            bits if bits >= 64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}
