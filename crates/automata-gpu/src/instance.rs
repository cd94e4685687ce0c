//! Vulkan instance creation and compute device selection.

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{CStr, CString};

/// Validation layers requested when validation is enabled.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// A freshly created instance and the optional features it ended up with.
pub struct InstanceSetup {
    pub instance: ash::Instance,
    /// Validation layers were requested and are all installed.
    pub validation_enabled: bool,
    /// `VK_EXT_debug_utils` is enabled on the instance.
    pub debug_utils_enabled: bool,
}

/// Check that every layer in [`validation_layers`] is installed on the host.
///
/// A failed enumeration counts as "not installed".
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn validation_layers_available(entry: &ash::Entry) -> bool {
    layers_present(entry.enumerate_instance_layer_properties(), &validation_layers())
}

/// Check whether the host advertises `VK_EXT_debug_utils`.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn debug_utils_available(entry: &ash::Entry) -> bool {
    extension_present(
        entry.enumerate_instance_extension_properties(None),
        ash::ext::debug_utils::NAME,
    )
}

fn layers_present(
    available: std::result::Result<Vec<vk::LayerProperties>, vk::Result>,
    wanted: &[&CStr],
) -> bool {
    let available = match available {
        Ok(available) => available,
        Err(err) => {
            tracing::warn!("Failed to enumerate instance layers: {err}");
            return false;
        }
    };

    wanted.iter().all(|wanted| {
        available.iter().any(|props| {
            props
                .layer_name_as_c_str()
                .is_ok_and(|name| name == *wanted)
        })
    })
}

fn extension_present(
    available: std::result::Result<Vec<vk::ExtensionProperties>, vk::Result>,
    wanted: &CStr,
) -> bool {
    match available {
        Ok(extensions) => extensions.iter().any(|props| {
            props
                .extension_name_as_c_str()
                .is_ok_and(|name| name == wanted)
        }),
        Err(err) => {
            tracing::warn!("Failed to enumerate instance extensions: {err}");
            false
        }
    }
}

/// Create a Vulkan instance.
///
/// Layers are only requested after the host proves they are installed; a
/// missing validation layer downgrades to an instance with no layers instead
/// of failing creation.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
    enable_debug_utils: bool,
) -> Result<InstanceSetup> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("Application name contains a NUL byte".to_string()))?;
    let engine_name = c"Automata";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_1);

    let validation_enabled = if enable_validation {
        let available = validation_layers_available(entry);
        if !available {
            tracing::warn!("Validation layers requested but not installed, continuing without");
        }
        available
    } else {
        false
    };

    let debug_utils_enabled = enable_debug_utils && debug_utils_available(entry);
    if enable_debug_utils && !debug_utils_enabled {
        tracing::warn!("VK_EXT_debug_utils not available, debug labels disabled");
    }

    let layers = if validation_enabled {
        validation_layers()
    } else {
        vec![]
    };
    let layer_names: Vec<*const std::ffi::c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let mut extension_names: Vec<*const std::ffi::c_char> = Vec::new();
    if debug_utils_enabled {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names);

    // No installable client driver means there is no device to pick from.
    let instance = entry
        .create_instance(&create_info, None)
        .map_err(|err| match err {
            vk::Result::ERROR_INCOMPATIBLE_DRIVER => GpuError::NoPhysicalDevice,
            other => GpuError::from(other),
        })?;

    Ok(InstanceSetup {
        instance,
        validation_enabled,
        debug_utils_enabled,
    })
}

/// Index of the first queue family that supports compute.
pub fn first_compute_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::COMPUTE)
        })
        .and_then(|index| u32::try_from(index).ok())
}

/// First device, in enumeration order, that has a compute queue family.
///
/// There is no scoring: the first match wins.
pub fn first_compute_candidate<D>(
    devices: impl IntoIterator<Item = (D, Vec<vk::QueueFamilyProperties>)>,
) -> Option<(D, u32)> {
    devices
        .into_iter()
        .find_map(|(device, families)| first_compute_family(&families).map(|i| (device, i)))
}

/// Select the compute device and its compute queue family.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_compute_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = instance.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoPhysicalDevice);
    }

    let candidates = devices.into_iter().map(|device| {
        let families = instance.get_physical_device_queue_family_properties(device);
        (device, families)
    });

    first_compute_candidate(candidates).ok_or(GpuError::NoComputeQueue)
}
