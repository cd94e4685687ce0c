//! The compute debugger facade.

use std::collections::VecDeque;
use std::path::Path;

use ash::vk;
use automata_gpu::{DeviceMemoryManager, GpuError, GraphicsContext, MemoryLocation};

use crate::barrier::{self, BarrierIssue};
use crate::config::DebuggerConfig;
use crate::dispatch::{DispatchRecord, DispatchTracker};
use crate::error::{DebugError, Result};
use crate::hazard::{detect_hazards, Hazard};
use crate::labels::{DebugLabels, DebuggerCapabilities};
use crate::message::{DebugMessage, MessageKind, MessageLog};
use crate::report::{self, DumpContents};
use crate::resources::{format_texel_size, texels, ResourceKind, ResourceTracker, TrackedResource};
use crate::stats::{self, DebugStatistics};
use crate::timestamps::{SlotRef, TimestampQueries, TimestampTimings};

/// Borrowed GPU objects plus the device-side helpers built from them.
struct GpuHooks<'ctx> {
    context: &'ctx GraphicsContext,
    memory: &'ctx DeviceMemoryManager<'ctx>,
    labels: Option<DebugLabels>,
    timestamps: Option<TimestampQueries>,
}

impl GpuHooks<'_> {
    /// Copy `size` bytes into a host-visible staging buffer with `record` and
    /// hand them to `callback`. The staging buffer is freed on every path.
    fn capture<R, F>(&self, size: u64, name: &str, record: R, callback: F) -> Result<()>
    where
        R: FnOnce(&ash::Device, vk::CommandBuffer, vk::Buffer),
        F: FnOnce(&[u8]),
    {
        let mut staging = self.memory.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
            name,
        )?;
        let staging_buffer = staging.buffer;

        let copied = self.context.execute_scoped_commands(|device, cmd| unsafe {
            let before_copy = [vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ)];
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &before_copy,
                &[],
                &[],
            );

            record(device, cmd, staging_buffer);

            let before_host = [vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ)];
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &before_host,
                &[],
                &[],
            );
        });

        let result = copied.map_err(DebugError::from).and_then(|()| {
            let bytes = staging.mapped_bytes().ok_or_else(|| {
                GpuError::InvalidState("Capture staging buffer is not mapped".to_string())
            })?;
            callback(&bytes[..size as usize]);
            Ok(())
        });

        self.memory.free_buffer(&mut staging)?;
        result
    }
}

/// Optional instrumentation for compute work.
///
/// Borrows the context and memory manager it was built from, so it cannot
/// outlive them. Every hook is a no-op while disabled: no state changes and
/// no messages. Misuse is recorded as a [`DebugMessage`] and never panics.
pub struct ComputeDebugger<'ctx> {
    gpu: Option<GpuHooks<'ctx>>,
    config: DebuggerConfig,
    enabled: bool,
    capabilities: DebuggerCapabilities,

    resources: ResourceTracker,
    dispatches: DispatchTracker,
    messages: MessageLog,
}

impl<'ctx> ComputeDebugger<'ctx> {
    /// Create a debugger with default settings.
    pub fn new(
        context: &'ctx GraphicsContext,
        memory: &'ctx DeviceMemoryManager<'ctx>,
    ) -> Self {
        Self::with_config(context, memory, DebuggerConfig::default())
    }

    /// Create a debugger, probing labels and timestamp support on the device.
    pub fn with_config(
        context: &'ctx GraphicsContext,
        memory: &'ctx DeviceMemoryManager<'ctx>,
        config: DebuggerConfig,
    ) -> Self {
        let mut messages = MessageLog::default();
        let labels = DebugLabels::probe(context);

        let caps = context.capabilities();
        let timestamps = if caps.supports_timestamps() {
            let created = unsafe {
                TimestampQueries::new(
                    context.device(),
                    config.timestamp_capacity,
                    caps.timestamp_period,
                    caps.timestamp_mask(),
                )
            };
            match created {
                Ok(queries) => Some(queries),
                Err(err) => {
                    messages.error(
                        MessageKind::Timestamp,
                        format!("Failed to create timestamp query pool: {err}"),
                    );
                    None
                }
            }
        } else {
            tracing::debug!("Compute queue has no timestamp support");
            None
        };

        let capabilities = DebuggerCapabilities {
            debug_labels: labels.is_some(),
            timestamps: timestamps.is_some(),
            capture: true,
        };
        tracing::info!(
            "Compute debugger ready on {}: labels={}, timestamps={} ({} slots)",
            caps.device_name,
            capabilities.debug_labels,
            capabilities.timestamps,
            config.timestamp_capacity
        );

        Self {
            gpu: Some(GpuHooks {
                context,
                memory,
                labels,
                timestamps,
            }),
            enabled: config.enabled,
            dispatches: DispatchTracker::new(config.history_limit),
            config,
            capabilities,
            resources: ResourceTracker::default(),
            messages,
        }
    }
}

impl ComputeDebugger<'static> {
    /// Create a debugger with no device.
    ///
    /// Host-side tracking, dispatch bracketing, validation and reports work.
    /// Labels and timestamps are silent no-ops; capture and timestamp
    /// retrieval return [`DebugError::Unavailable`].
    pub fn headless(config: DebuggerConfig) -> Self {
        Self {
            gpu: None,
            enabled: config.enabled,
            dispatches: DispatchTracker::new(config.history_limit),
            config,
            capabilities: DebuggerCapabilities::NONE,
            resources: ResourceTracker::default(),
            messages: MessageLog::default(),
        }
    }
}

impl ComputeDebugger<'_> {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> DebuggerCapabilities {
        self.capabilities
    }

    // --- Object validation ---

    /// Check that a shader module handle is usable. Records an error for null.
    pub fn validate_shader_module(&mut self, module: vk::ShaderModule, name: &str) -> bool {
        if !self.enabled {
            return true;
        }
        if module == vk::ShaderModule::null() {
            self.messages.error(
                MessageKind::ObjectValidation,
                format!("Shader module '{name}' is null"),
            );
            return false;
        }
        true
    }

    /// Check that a compute pipeline handle is usable. Records an error for null.
    pub fn validate_compute_pipeline(&mut self, pipeline: vk::Pipeline, name: &str) -> bool {
        if !self.enabled {
            return true;
        }
        if pipeline == vk::Pipeline::null() {
            self.messages.error(
                MessageKind::ObjectValidation,
                format!("Compute pipeline '{name}' is null"),
            );
            return false;
        }
        true
    }

    // --- Resource tracking ---

    /// Start tracking a buffer, replacing any entry for the same handle.
    pub fn track_buffer(&mut self, buffer: vk::Buffer, size: u64, name: &str) {
        if !self.enabled {
            return;
        }
        if buffer == vk::Buffer::null() {
            self.messages.error(
                MessageKind::ObjectValidation,
                format!("Cannot track null buffer '{name}'"),
            );
            return;
        }
        tracing::trace!("Tracking buffer '{name}' ({size} bytes)");
        self.resources.track_buffer(buffer, size, name);
    }

    /// Start tracking an image, replacing any entry for the same handle.
    pub fn track_image(
        &mut self,
        image: vk::Image,
        extent: vk::Extent3D,
        format: vk::Format,
        name: &str,
    ) {
        if !self.enabled {
            return;
        }
        if image == vk::Image::null() {
            self.messages.error(
                MessageKind::ObjectValidation,
                format!("Cannot track null image '{name}'"),
            );
            return;
        }
        tracing::trace!(
            "Tracking image '{name}' ({}x{}x{} {format:?})",
            extent.width,
            extent.height,
            extent.depth
        );
        self.resources.track_image(image, extent, format, name);
    }

    /// Stop tracking a buffer. Unknown handles are ignored.
    pub fn untrack_buffer(&mut self, buffer: vk::Buffer) {
        if !self.enabled {
            return;
        }
        if let Some(resource) = self.resources.untrack_buffer(buffer) {
            tracing::trace!("Untracked buffer '{}'", resource.name);
        }
    }

    /// Stop tracking an image. Unknown handles are ignored.
    pub fn untrack_image(&mut self, image: vk::Image) {
        if !self.enabled {
            return;
        }
        if let Some(resource) = self.resources.untrack_image(image) {
            tracing::trace!("Untracked image '{}'", resource.name);
        }
    }

    /// Record an access to a buffer by the open dispatch.
    pub fn use_buffer(&mut self, buffer: vk::Buffer) {
        if !self.enabled {
            return;
        }
        if !self.resources.touch_buffer(buffer) {
            self.messages.warning(
                MessageKind::ObjectValidation,
                format!("Untracked buffer {buffer:?} used"),
            );
        }
        if let Some(record) = self.dispatches.current_mut() {
            record.note_buffer(buffer);
        }
    }

    /// Record an access to an image by the open dispatch.
    pub fn use_image(&mut self, image: vk::Image) {
        if !self.enabled {
            return;
        }
        if !self.resources.touch_image(image) {
            self.messages.warning(
                MessageKind::ObjectValidation,
                format!("Untracked image {image:?} used"),
            );
        }
        if let Some(record) = self.dispatches.current_mut() {
            record.note_image(image);
        }
    }

    pub fn tracked_buffer(&self, buffer: vk::Buffer) -> Option<&TrackedResource> {
        self.resources.buffer(buffer)
    }

    pub fn tracked_image(&self, image: vk::Image) -> Option<&TrackedResource> {
        self.resources.image(image)
    }

    // --- Dispatch bracketing ---

    /// Open a dispatch record. Records an error if one is already open.
    pub fn begin_dispatch(&mut self, shader_name: &str, x: u32, y: u32, z: u32) {
        if !self.enabled {
            return;
        }
        if let Err(misuse) = self.dispatches.check_begin(shader_name) {
            self.messages.error(MessageKind::DispatchState, misuse.to_string());
            return;
        }
        let record = DispatchRecord::open(shader_name, [x, y, z], None);
        self.open_dispatch(record);
    }

    /// Close the open dispatch record. Records an error if none is open.
    pub fn end_dispatch(&mut self) {
        if !self.enabled {
            return;
        }
        self.close_dispatch(None);
    }

    /// [`begin_dispatch`](Self::begin_dispatch) plus a top-of-pipe timestamp
    /// in `cmd` when timestamp queries are available.
    pub fn begin_dispatch_timed(
        &mut self,
        cmd: vk::CommandBuffer,
        shader_name: &str,
        x: u32,
        y: u32,
        z: u32,
    ) {
        if !self.enabled {
            return;
        }
        if let Err(misuse) = self.dispatches.check_begin(shader_name) {
            self.messages.error(MessageKind::DispatchState, misuse.to_string());
            return;
        }

        let gpu_start = self.write_timestamp(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            &format!("{shader_name}:begin"),
        );
        let record = DispatchRecord::open(shader_name, [x, y, z], gpu_start);
        self.open_dispatch(record);
    }

    /// Open `record` on an idle tracker, flagging counts over the device limit.
    fn open_dispatch(&mut self, record: DispatchRecord) {
        if let Some(gpu) = &self.gpu {
            let caps = gpu.context.capabilities();
            if !caps.workgroups_within_limits(record.workgroups) {
                self.messages.error(
                    MessageKind::DispatchState,
                    format!(
                        "Dispatch '{}' with {:?} workgroups exceeds device limit {:?}",
                        record.shader_name, record.workgroups, caps.max_compute_workgroup_count
                    ),
                );
            }
        }
        if let Err(misuse) = self.dispatches.begin(record) {
            self.messages.error(MessageKind::DispatchState, misuse.to_string());
        }
    }

    /// [`end_dispatch`](Self::end_dispatch) plus a bottom-of-pipe timestamp
    /// in `cmd` when timestamp queries are available.
    pub fn end_dispatch_timed(&mut self, cmd: vk::CommandBuffer) {
        if !self.enabled {
            return;
        }
        let Some(shader_name) = self.dispatches.current().map(|r| r.shader_name.clone()) else {
            self.close_dispatch(None);
            return;
        };

        let gpu_end = self.write_timestamp(
            cmd,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            &format!("{shader_name}:end"),
        );
        self.close_dispatch(gpu_end);
    }

    fn close_dispatch(&mut self, gpu_end: Option<SlotRef>) {
        match self.dispatches.end(gpu_end) {
            Ok(record) => tracing::debug!(
                "Dispatch '{}' ({:?}) took {:.3} ms host time",
                record.shader_name,
                record.workgroups,
                record.host_time_ms()
            ),
            Err(misuse) => self.messages.error(MessageKind::DispatchState, misuse.to_string()),
        }
    }

    pub fn is_in_dispatch(&self) -> bool {
        self.dispatches.is_open()
    }

    pub fn current_dispatch(&self) -> Option<&DispatchRecord> {
        self.dispatches.current()
    }

    /// Completed dispatches, oldest first.
    pub fn history(&self) -> &VecDeque<DispatchRecord> {
        self.dispatches.history()
    }

    // --- Timestamps ---

    /// Write a bottom-of-pipe timestamp for `marker` into the next ring slot.
    ///
    /// Returns `None` when disabled or when timestamps are unavailable.
    pub fn insert_timestamp(&mut self, cmd: vk::CommandBuffer, marker: &str) -> Option<SlotRef> {
        if !self.enabled {
            return None;
        }
        self.write_timestamp(cmd, vk::PipelineStageFlags::BOTTOM_OF_PIPE, marker)
    }

    fn write_timestamp(
        &mut self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        marker: &str,
    ) -> Option<SlotRef> {
        let gpu = self.gpu.as_mut()?;
        let queries = gpu.timestamps.as_mut()?;
        if cmd == vk::CommandBuffer::null() {
            self.messages.error(
                MessageKind::Timestamp,
                format!("Timestamp '{marker}' written to a null command buffer"),
            );
            return None;
        }
        Some(unsafe { queries.write(gpu.context.device(), cmd, stage, marker) })
    }

    /// Read back every intact slot without waiting.
    ///
    /// Marker times are relative to the oldest readable sample. Dispatches
    /// whose start and end slots are both intact get their GPU time filled in.
    /// Call after the recorded work has completed; unfinished slots are
    /// skipped. Returns empty timings and leaves history alone while disabled.
    pub fn retrieve_timestamps(&mut self) -> Result<TimestampTimings> {
        if !self.enabled {
            return Ok(TimestampTimings::default());
        }
        let (device, queries) = self
            .gpu
            .as_ref()
            .and_then(|gpu| gpu.timestamps.as_ref().map(|q| (gpu.context.device(), q)))
            .ok_or(DebugError::Unavailable("Timestamp queries"))?;

        let mut samples: Vec<(u64, &str, u64)> = queries
            .ring()
            .occupied()
            .filter_map(|(index, slot)| {
                let slot_ref = SlotRef {
                    index,
                    sequence: slot.sequence,
                };
                let ticks = unsafe { queries.read(device, slot_ref) }?;
                Some((slot.sequence, slot.marker.as_str(), ticks))
            })
            .collect();
        samples.sort_by_key(|&(sequence, _, _)| sequence);

        let mut timings = TimestampTimings::default();
        if let Some(&(_, _, origin)) = samples.first() {
            for &(_, marker, ticks) in &samples {
                timings
                    .markers
                    .insert(marker.to_string(), queries.elapsed_ms(origin, ticks));
            }
        }

        for record in self.dispatches.history_mut() {
            if let (Some(start), Some(end)) = (record.gpu_start, record.gpu_end) {
                let read = unsafe { (queries.read(device, start), queries.read(device, end)) };
                if let (Some(start), Some(end)) = read {
                    record.gpu_time_ms = Some(queries.elapsed_ms(start, end));
                }
            }
            if let Some(gpu_ms) = record.gpu_time_ms {
                *timings
                    .shaders
                    .entry(record.shader_name.clone())
                    .or_insert(0.0) += gpu_ms;
            }
        }

        Ok(timings)
    }

    // --- Capture ---

    /// Copy part of a tracked buffer back to the host and pass it to `callback`.
    ///
    /// `size` may be `vk::WHOLE_SIZE`. Blocks until the copy has completed.
    pub fn capture_buffer_data<F>(
        &mut self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(&[u8]),
    {
        if !self.enabled {
            return Ok(());
        }
        let gpu = self
            .gpu
            .as_ref()
            .ok_or(DebugError::Unavailable("Buffer capture"))?;
        let tracked = self
            .resources
            .buffer(buffer)
            .ok_or_else(|| DebugError::UnknownResource(format!("{buffer:?}")))?;

        let tracked_size = tracked.byte_size().unwrap_or_default();
        let size = if size == vk::WHOLE_SIZE {
            tracked_size.saturating_sub(offset)
        } else {
            size
        };
        let in_range = offset
            .checked_add(size)
            .is_some_and(|end| end <= tracked_size);
        if size == 0 || !in_range {
            return Err(DebugError::InvalidRange(format!(
                "{offset}+{size} in '{}' of {tracked_size} bytes",
                tracked.name
            )));
        }

        let region = vk::BufferCopy {
            src_offset: offset,
            dst_offset: 0,
            size,
        };
        gpu.capture(
            size,
            &format!("capture:{}", tracked.name),
            |device, cmd, staging| unsafe {
                device.cmd_copy_buffer(cmd, buffer, staging, &[region]);
            },
            callback,
        )?;

        self.resources.touch_buffer(buffer);
        Ok(())
    }

    /// Copy a region of a tracked image back to the host and pass the tightly
    /// packed texels to `callback`.
    ///
    /// The image must be in `GENERAL` layout. Blocks until the copy has completed.
    pub fn capture_image_data<F>(
        &mut self,
        image: vk::Image,
        subresource: vk::ImageSubresourceLayers,
        offset: vk::Offset3D,
        extent: vk::Extent3D,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(&[u8]),
    {
        if !self.enabled {
            return Ok(());
        }
        let gpu = self
            .gpu
            .as_ref()
            .ok_or(DebugError::Unavailable("Image capture"))?;
        let tracked = self
            .resources
            .image(image)
            .ok_or_else(|| DebugError::UnknownResource(format!("{image:?}")))?;
        let ResourceKind::Image {
            extent: full,
            format,
        } = tracked.kind
        else {
            return Err(DebugError::UnknownResource(format!("{image:?}")));
        };

        let texel_size = format_texel_size(format).ok_or(DebugError::UnsupportedFormat(format))?;
        if !region_fits(offset, extent, full) {
            return Err(DebugError::InvalidRange(format!(
                "{offset:?} {extent:?} in '{}' of {full:?}",
                tracked.name
            )));
        }

        let size = texel_size * texels(extent);
        let region = vk::BufferImageCopy::default()
            .image_subresource(subresource)
            .image_offset(offset)
            .image_extent(extent);
        gpu.capture(
            size,
            &format!("capture:{}", tracked.name),
            |device, cmd, staging| unsafe {
                device.cmd_copy_image_to_buffer(
                    cmd,
                    image,
                    vk::ImageLayout::GENERAL,
                    staging,
                    &[region],
                );
            },
            callback,
        )?;

        self.resources.touch_image(image);
        Ok(())
    }

    // --- Barrier validation ---

    /// Check a global memory barrier against its stage masks.
    pub fn validate_memory_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::MemoryBarrier<'_>,
    ) -> bool {
        if !self.enabled {
            return true;
        }
        let issues = barrier::check_stage_access(
            src_stage,
            dst_stage,
            barrier.src_access_mask,
            barrier.dst_access_mask,
        );
        self.report_barrier_issues("Memory barrier", issues)
    }

    /// Check a buffer barrier, including its range against the tracked size.
    pub fn validate_buffer_memory_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::BufferMemoryBarrier<'_>,
    ) -> bool {
        if !self.enabled {
            return true;
        }
        let mut issues = barrier::check_stage_access(
            src_stage,
            dst_stage,
            barrier.src_access_mask,
            barrier.dst_access_mask,
        );
        let tracked = self
            .resources
            .buffer(barrier.buffer)
            .and_then(|r| r.byte_size().map(|size| (r.name.as_str(), size)));
        issues.extend(barrier::check_buffer_fields(
            barrier.buffer,
            barrier.offset,
            barrier.size,
            tracked,
        ));

        let label = match tracked {
            Some((name, _)) => format!("Buffer barrier on '{name}'"),
            None => "Buffer barrier".to_string(),
        };
        self.report_barrier_issues(&label, issues)
    }

    /// Check an image barrier, including its target layout.
    pub fn validate_image_memory_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    ) -> bool {
        if !self.enabled {
            return true;
        }
        let mut issues = barrier::check_stage_access(
            src_stage,
            dst_stage,
            barrier.src_access_mask,
            barrier.dst_access_mask,
        );
        issues.extend(barrier::check_image_fields(barrier.image, barrier.new_layout));

        let label = match self.resources.image(barrier.image) {
            Some(resource) => format!("Image barrier on '{}'", resource.name),
            None => "Image barrier".to_string(),
        };
        self.report_barrier_issues(&label, issues)
    }

    fn report_barrier_issues(&mut self, label: &str, issues: Vec<BarrierIssue>) -> bool {
        let legal = issues.is_empty();
        for issue in issues {
            self.messages
                .error(MessageKind::BarrierValidation, format!("{label}: {issue}"));
        }
        legal
    }

    // --- Hazards ---

    /// Check one dependency for unordered accesses. Every hazard is also
    /// recorded as a warning. Empty stage masks are recorded as errors.
    pub fn check_synchronization_hazards(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
    ) -> Vec<Hazard> {
        if !self.enabled {
            return Vec::new();
        }
        if src_stage.is_empty() || dst_stage.is_empty() {
            self.messages.error(
                MessageKind::Hazard,
                format!("Hazard check with empty stage mask ({src_stage:?} -> {dst_stage:?})"),
            );
            return Vec::new();
        }

        let hazards = detect_hazards(src_stage, dst_stage, src_access, dst_access);
        for hazard in &hazards {
            self.messages.warning(MessageKind::Hazard, hazard.to_string());
        }
        hazards
    }

    // --- Debug labels ---

    /// Open a labeled region in `cmd`. No-op without label support.
    pub fn begin_debug_label(&mut self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        if let Some(labels) = self.labels() {
            unsafe { labels.begin(cmd, name, color) };
        }
    }

    /// Close the innermost labeled region in `cmd`. No-op without label support.
    pub fn end_debug_label(&mut self, cmd: vk::CommandBuffer) {
        if let Some(labels) = self.labels() {
            unsafe { labels.end(cmd) };
        }
    }

    /// Insert a single label into `cmd`. No-op without label support.
    pub fn insert_debug_label(&mut self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        if let Some(labels) = self.labels() {
            unsafe { labels.insert(cmd, name, color) };
        }
    }

    fn labels(&self) -> Option<&DebugLabels> {
        if !self.enabled {
            return None;
        }
        self.gpu.as_ref()?.labels.as_ref()
    }

    // --- Messages ---

    pub fn errors(&self) -> &[DebugMessage] {
        self.messages.errors()
    }

    pub fn warnings(&self) -> &[DebugMessage] {
        self.messages.warnings()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    // --- Statistics and reports ---

    /// Recompute statistics from the history and tracked resources.
    pub fn statistics(&self) -> DebugStatistics {
        stats::collect(self.dispatches.history(), &self.resources, &self.messages)
    }

    pub fn resource_usage_report(&self) -> String {
        report::resource_usage(&self.resources)
    }

    /// The most recent dispatches, newest last.
    pub fn dispatch_history_report(&self) -> String {
        report::dispatch_history(self.dispatches.history())
    }

    pub fn print_resource_usage(&self) {
        tracing::info!("{}", self.resource_usage_report());
    }

    pub fn print_dispatch_history(&self) {
        tracing::info!("{}", self.dispatch_history_report());
    }

    /// Write statistics, resources, the full history and all messages to `path`.
    pub fn dump_debug_info(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let statistics = self.statistics();
        let text = report::full_dump(DumpContents {
            enabled: self.enabled,
            capabilities: self.capabilities,
            device: self
                .gpu
                .as_ref()
                .map(|gpu| gpu.context.capabilities().device_name.as_str()),
            budget: self.gpu.as_ref().map(|gpu| gpu.memory.budget()),
            statistics: &statistics,
            resources: &self.resources,
            history: self.dispatches.history(),
            messages: &self.messages,
        });

        std::fs::write(path, text)?;
        tracing::info!("Debug info written to {}", path.display());
        Ok(())
    }
}

impl Drop for ComputeDebugger<'_> {
    fn drop(&mut self) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        if let Some(queries) = &gpu.timestamps {
            // Pending submissions may still write into the pool.
            if let Err(err) = gpu.context.wait_idle() {
                tracing::warn!("Wait before destroying timestamp pool failed: {err}");
            }
            unsafe { queries.destroy(gpu.context.device()) };
        }
    }
}

/// Whether `extent` at `offset` lies inside `full`.
fn region_fits(offset: vk::Offset3D, extent: vk::Extent3D, full: vk::Extent3D) -> bool {
    let axis = |offset: i32, len: u32, full: u32| {
        u32::try_from(offset)
            .ok()
            .and_then(|offset| offset.checked_add(len))
            .is_some_and(|end| len > 0 && end <= full)
    };
    axis(offset.x, extent.width, full.width)
        && axis(offset.y, extent.height, full.height)
        && axis(offset.z, extent.depth, full.depth)
}
