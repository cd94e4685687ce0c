//! Debug labels for external capture tools, and the capability check behind them.

use std::ffi::{CStr, CString};

use ash::vk;
use automata_gpu::GraphicsContext;

/// What the debugger can do on the current device, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebuggerCapabilities {
    /// Debug labels reach external capture tools.
    pub debug_labels: bool,
    /// Timestamp queries are available on the compute queue.
    pub timestamps: bool,
    /// Buffers and images can be copied back to the host.
    pub capture: bool,
}

impl DebuggerCapabilities {
    pub const NONE: Self = Self {
        debug_labels: false,
        timestamps: false,
        capture: false,
    };
}

const LABEL_ENTRY_POINTS: [&CStr; 3] = [
    c"vkCmdBeginDebugUtilsLabelEXT",
    c"vkCmdEndDebugUtilsLabelEXT",
    c"vkCmdInsertDebugUtilsLabelEXT",
];

/// Command-buffer label calls from `VK_EXT_debug_utils`.
pub(crate) struct DebugLabels {
    loader: ash::ext::debug_utils::Device,
}

impl DebugLabels {
    /// Load the label entry points if the driver exposes all of them.
    pub fn probe(context: &GraphicsContext) -> Option<Self> {
        if !context.debug_utils_enabled() {
            return None;
        }

        let instance = context.instance();
        let resolved = LABEL_ENTRY_POINTS.iter().all(|name| {
            let function = unsafe {
                context
                    .entry()
                    .get_instance_proc_addr(instance.handle(), name.as_ptr())
            };
            if function.is_none() {
                tracing::debug!("Debug label entry point {name:?} not exposed");
            }
            function.is_some()
        });
        if !resolved {
            return None;
        }

        Some(Self {
            loader: ash::ext::debug_utils::Device::new(instance, context.device()),
        })
    }

    /// # Safety
    /// `cmd` must be recording.
    pub unsafe fn begin(&self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        let name = label_text(name);
        let label = vk::DebugUtilsLabelEXT::default().label_name(&name).color(color);
        self.loader.cmd_begin_debug_utils_label(cmd, &label);
    }

    /// # Safety
    /// `cmd` must be recording with an open label region.
    pub unsafe fn end(&self, cmd: vk::CommandBuffer) {
        self.loader.cmd_end_debug_utils_label(cmd);
    }

    /// # Safety
    /// `cmd` must be recording.
    pub unsafe fn insert(&self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        let name = label_text(name);
        let label = vk::DebugUtilsLabelEXT::default().label_name(&name).color(color);
        self.loader.cmd_insert_debug_utils_label(cmd, &label);
    }
}

/// Label names cannot carry interior NULs; drop them instead of failing.
fn label_text(name: &str) -> CString {
    CString::new(name.replace('\0', "")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_text_strips_nuls() {
        assert_eq!(label_text("step\0x").as_bytes(), b"stepx");
        assert_eq!(label_text("grid").as_bytes(), b"grid");
    }

    #[test]
    fn none_has_nothing() {
        assert_eq!(DebuggerCapabilities::NONE, DebuggerCapabilities::default());
    }
}
