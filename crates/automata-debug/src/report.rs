//! Text views over the debugger state.

use std::fmt::{self, Write};
use std::time::Instant;

use automata_gpu::MemoryBudget;

use crate::dispatch::DispatchRecord;
use crate::labels::DebuggerCapabilities;
use crate::message::MessageLog;
use crate::resources::{ResourceKind, ResourceTracker, TrackedResource};
use crate::stats::DebugStatistics;

/// Number of dispatches shown by the history view.
pub(crate) const RECENT_DISPATCHES: usize = 10;

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn write_resource(out: &mut impl Write, resource: &TrackedResource, now: Instant) -> fmt::Result {
    let idle = now.saturating_duration_since(resource.last_access).as_secs_f64();
    match resource.kind {
        ResourceKind::Buffer { size } => writeln!(
            out,
            "  buffer {:<24} {:>12} bytes ({:.2} MiB), idle {idle:.1}s",
            resource.name,
            size,
            mib(size)
        ),
        ResourceKind::Image { extent, format } => writeln!(
            out,
            "  image  {:<24} {}x{}x{} {:?} ({} texels), idle {idle:.1}s",
            resource.name,
            extent.width,
            extent.height,
            extent.depth,
            format,
            resource.texel_count()
        ),
    }
}

fn write_resources(out: &mut impl Write, resources: &ResourceTracker) -> fmt::Result {
    let now = Instant::now();
    writeln!(
        out,
        "Tracked resources: {} buffers ({:.2} MiB), {} images ({} texels)",
        resources.buffer_count(),
        mib(resources.total_buffer_bytes()),
        resources.image_count(),
        resources.total_image_texels()
    )?;
    for (_, resource) in resources.buffers_by_name() {
        write_resource(out, resource, now)?;
    }
    for (_, resource) in resources.images_by_name() {
        write_resource(out, resource, now)?;
    }
    Ok(())
}

fn write_dispatch(out: &mut impl Write, record: &DispatchRecord) -> fmt::Result {
    let [x, y, z] = record.workgroups;
    write!(
        out,
        "  {:<24} groups ({x}, {y}, {z}) host {:.3} ms",
        record.shader_name,
        record.host_time_ms()
    )?;
    if let Some(gpu_ms) = record.gpu_time_ms {
        write!(out, " gpu {gpu_ms:.3} ms")?;
    }
    writeln!(
        out,
        " [{} buffers, {} images]",
        record.buffers.len(),
        record.images.len()
    )
}

fn write_history<'a, I>(out: &mut impl Write, history: I, limit: Option<usize>) -> fmt::Result
where
    I: IntoIterator<Item = &'a DispatchRecord>,
    I::IntoIter: ExactSizeIterator,
{
    let records = history.into_iter();
    let total = records.len();
    let shown = limit.map_or(total, |limit| limit.min(total));

    writeln!(out, "Dispatch history ({shown} of {total}):")?;
    for record in records.skip(total - shown) {
        write_dispatch(out, record)?;
    }
    Ok(())
}

fn write_statistics(out: &mut impl Write, stats: &DebugStatistics) -> fmt::Result {
    writeln!(out, "Statistics:")?;
    writeln!(out, "  dispatches:        {}", stats.total_dispatches)?;
    writeln!(out, "  average host time: {:.3} ms", stats.average_dispatch_time_ms)?;
    writeln!(out, "  tracked resources: {}", stats.tracked_resources())?;
    writeln!(out, "  errors/warnings:   {}/{}", stats.error_count, stats.warning_count)?;

    let mut shaders: Vec<_> = stats.per_shader.iter().collect();
    shaders.sort_by(|a, b| a.0.cmp(b.0));
    for (name, shader) in shaders {
        write!(
            out,
            "  {name:<24} x{} avg {:.3} ms",
            shader.dispatches,
            shader.average_ms()
        )?;
        if let Some(gpu_ms) = shader.gpu_total_ms {
            write!(out, " gpu total {gpu_ms:.3} ms")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_messages(out: &mut impl Write, messages: &MessageLog) -> fmt::Result {
    writeln!(out, "Errors ({}):", messages.errors().len())?;
    for message in messages.errors() {
        writeln!(out, "  {message}")?;
    }
    writeln!(out, "Warnings ({}):", messages.warnings().len())?;
    for message in messages.warnings() {
        writeln!(out, "  {message}")?;
    }
    Ok(())
}

fn write_budget(out: &mut impl Write, budget: &MemoryBudget) -> fmt::Result {
    writeln!(
        out,
        "Device memory: {:.2} MiB allocated / {:.2} MiB reserved in {} blocks ({} allocations), \
         {:.1}% of {:.2} MiB device-local",
        mib(budget.allocated_bytes),
        mib(budget.reserved_bytes),
        budget.block_count,
        budget.allocation_count,
        budget.reserved_fraction() * 100.0,
        mib(budget.device_local_bytes)
    )
}

fn render(write: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut out = String::new();
    write(&mut out).expect("formatting into a String is infallible");
    out
}

pub(crate) fn resource_usage(resources: &ResourceTracker) -> String {
    render(|out| write_resources(out, resources))
}

pub(crate) fn dispatch_history<'a, I>(history: I) -> String
where
    I: IntoIterator<Item = &'a DispatchRecord>,
    I::IntoIter: ExactSizeIterator,
{
    render(|out| write_history(out, history, Some(RECENT_DISPATCHES)))
}

/// Everything the dump file contains.
pub(crate) struct DumpContents<'a, I> {
    pub enabled: bool,
    pub capabilities: DebuggerCapabilities,
    pub device: Option<&'a str>,
    pub budget: Option<MemoryBudget>,
    pub statistics: &'a DebugStatistics,
    pub resources: &'a ResourceTracker,
    pub history: I,
    pub messages: &'a MessageLog,
}

pub(crate) fn full_dump<'a, I>(contents: DumpContents<'a, I>) -> String
where
    I: IntoIterator<Item = &'a DispatchRecord>,
    I::IntoIter: ExactSizeIterator,
{
    render(|out| write_dump(out, contents))
}

fn write_dump<'a, I>(out: &mut impl Write, contents: DumpContents<'a, I>) -> fmt::Result
where
    I: IntoIterator<Item = &'a DispatchRecord>,
    I::IntoIter: ExactSizeIterator,
{
    writeln!(out, "=== Compute debugger dump ===")?;
    writeln!(out, "Enabled: {}", contents.enabled)?;
    writeln!(out, "Device: {}", contents.device.unwrap_or("none (headless)"))?;
    let caps = contents.capabilities;
    writeln!(
        out,
        "Capabilities: labels={} timestamps={} capture={}",
        caps.debug_labels, caps.timestamps, caps.capture
    )?;
    if let Some(budget) = &contents.budget {
        write_budget(out, budget)?;
    }
    writeln!(out)?;
    write_statistics(out, contents.statistics)?;
    writeln!(out)?;
    write_resources(out, contents.resources)?;
    writeln!(out)?;
    write_history(out, contents.history, None)?;
    writeln!(out)?;
    write_messages(out, contents.messages)
}
