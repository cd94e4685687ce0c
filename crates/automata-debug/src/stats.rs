//! Aggregate statistics, recomputed from the dispatch history on demand.

use std::collections::HashMap;

use crate::dispatch::DispatchRecord;
use crate::message::MessageLog;
use crate::resources::ResourceTracker;

/// Per-shader dispatch timings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderStats {
    pub dispatches: u64,
    /// Summed host time in milliseconds.
    pub total_ms: f64,
    /// Summed GPU time over dispatches that have one.
    pub gpu_total_ms: Option<f64>,
}

impl ShaderStats {
    /// Mean host time per dispatch in milliseconds.
    pub fn average_ms(&self) -> f64 {
        if self.dispatches == 0 {
            0.0
        } else {
            self.total_ms / self.dispatches as f64
        }
    }
}

/// Snapshot of everything the debugger has seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugStatistics {
    /// Completed dispatches still in the history.
    pub total_dispatches: u64,
    pub tracked_buffers: usize,
    pub tracked_images: usize,
    /// Sum of tracked buffer sizes.
    pub total_buffer_bytes: u64,
    pub total_image_texels: u64,
    pub average_dispatch_time_ms: f64,
    pub per_shader: HashMap<String, ShaderStats>,
    pub error_count: usize,
    pub warning_count: usize,
}

impl DebugStatistics {
    pub fn tracked_resources(&self) -> usize {
        self.tracked_buffers + self.tracked_images
    }
}

pub(crate) fn collect<'a>(
    history: impl IntoIterator<Item = &'a DispatchRecord>,
    resources: &ResourceTracker,
    messages: &MessageLog,
) -> DebugStatistics {
    let mut stats = DebugStatistics {
        tracked_buffers: resources.buffer_count(),
        tracked_images: resources.image_count(),
        total_buffer_bytes: resources.total_buffer_bytes(),
        total_image_texels: resources.total_image_texels(),
        error_count: messages.errors().len(),
        warning_count: messages.warnings().len(),
        ..DebugStatistics::default()
    };

    let mut total_ms = 0.0;
    for record in history {
        let host_ms = record.host_time_ms();
        stats.total_dispatches += 1;
        total_ms += host_ms;

        let shader = stats
            .per_shader
            .entry(record.shader_name.clone())
            .or_default();
        shader.dispatches += 1;
        shader.total_ms += host_ms;
        if let Some(gpu_ms) = record.gpu_time_ms {
            *shader.gpu_total_ms.get_or_insert(0.0) += gpu_ms;
        }
    }

    if stats.total_dispatches > 0 {
        stats.average_dispatch_time_ms = total_ms / stats.total_dispatches as f64;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use approx::assert_relative_eq;
    use ash::vk::{self, Handle};
    use std::time::{Duration, Instant};

    fn finished(name: &str, ms: u64, gpu_time_ms: Option<f64>) -> DispatchRecord {
        let start = Instant::now();
        DispatchRecord {
            shader_name: name.to_string(),
            workgroups: [1, 1, 1],
            start,
            end: Some(start + Duration::from_millis(ms)),
            buffers: Vec::new(),
            images: Vec::new(),
            gpu_start: None,
            gpu_end: None,
            gpu_time_ms,
        }
    }

    #[test]
    fn empty_history() {
        let history: Vec<DispatchRecord> = Vec::new();
        let stats = collect(&history, &ResourceTracker::default(), &MessageLog::default());
        assert_eq!(stats.total_dispatches, 0);
        assert_relative_eq!(stats.average_dispatch_time_ms, 0.0);
        assert!(stats.per_shader.is_empty());
    }

    #[test]
    fn averages_per_shader_and_overall() {
        let history = vec![
            finished("step", 2, Some(1.5)),
            finished("step", 4, None),
            finished("seed", 6, None),
        ];
        let stats = collect(&history, &ResourceTracker::default(), &MessageLog::default());

        assert_eq!(stats.total_dispatches, 3);
        assert_relative_eq!(stats.average_dispatch_time_ms, 4.0, epsilon = 1e-9);

        let step = &stats.per_shader["step"];
        assert_eq!(step.dispatches, 2);
        assert_relative_eq!(step.average_ms(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(step.gpu_total_ms.unwrap(), 1.5);

        assert!(stats.per_shader["seed"].gpu_total_ms.is_none());
    }

    #[test]
    fn counts_resources_and_messages() {
        let mut resources = ResourceTracker::default();
        resources.track_buffer(vk::Buffer::from_raw(1), 1024, "grid");
        resources.track_buffer(vk::Buffer::from_raw(2), 512, "next");
        resources.track_image(
            vk::Image::from_raw(3),
            vk::Extent3D {
                width: 4,
                height: 4,
                depth: 2,
            },
            vk::Format::R8_UNORM,
            "slice",
        );

        let mut messages = MessageLog::default();
        messages.error(MessageKind::BarrierValidation, "bad");
        messages.warning(MessageKind::Hazard, "maybe");
        messages.warning(MessageKind::Hazard, "maybe again");

        let stats = collect(std::iter::empty(), &resources, &messages);
        assert_eq!(stats.tracked_resources(), 3);
        assert_eq!(stats.total_buffer_bytes, 1536);
        assert_eq!(stats.total_image_texels, 32);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.warning_count, 2);
    }
}
