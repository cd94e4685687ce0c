//! Automata compute probe.
//!
//! Usage: `automata-probe [DUMP_PATH]`
//!
//! Brings up the compute context, fills a grid buffer through an instrumented
//! pass, validates the barriers it records, reads the grid back and writes
//! the debugger state to `DUMP_PATH` (default `automata-debug.txt`).
//! Set `AUTOMATA_VALIDATION=0|1` to override the validation layer default and
//! `RUST_LOG` to change the log filter.

use std::path::PathBuf;

use anyhow::{bail, Context};
use ash::vk;
use automata_debug::{ComputeDebugger, DebuggerConfig};
use automata_gpu::{
    DeviceMemoryManager, GpuBuffer, GraphicsContext, GraphicsContextBuilder, MemoryLocation,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const GRID_SIDE: u64 = 64;
const GRID_BYTES: u64 = GRID_SIDE * GRID_SIDE * GRID_SIDE * 4;
const ALIVE: u32 = 1;

/// Probe settings from the command line and environment.
#[derive(Debug)]
struct ProbeConfig {
    dump_path: PathBuf,
    validation: bool,
}

impl ProbeConfig {
    fn from_env() -> anyhow::Result<Self> {
        let mut args = std::env::args_os().skip(1);
        let dump_path = args
            .next()
            .map_or_else(|| PathBuf::from("automata-debug.txt"), PathBuf::from);
        if args.next().is_some() {
            bail!("usage: automata-probe [DUMP_PATH]");
        }

        let validation = match std::env::var("AUTOMATA_VALIDATION").ok().as_deref() {
            None => cfg!(debug_assertions),
            Some("1") => true,
            Some("0") => false,
            Some(other) => bail!("AUTOMATA_VALIDATION must be 0 or 1, got '{other}'"),
        };

        Ok(Self {
            dump_path,
            validation,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ProbeConfig::from_env()?;
    info!("Automata probe starting: {config:?}");

    let context = GraphicsContextBuilder::new()
        .app_name("automata-probe")
        .validation(config.validation)
        .build()
        .context("bringing up the compute context")?;
    info!("GPU: {}", context.capabilities().summary());

    let memory = DeviceMemoryManager::new(&context).context("creating the device allocator")?;
    let mut grid = memory.create_buffer(
        GRID_BYTES,
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::GpuOnly,
        "grid",
    )?;

    let outcome = run(&context, &memory, &grid, &config);
    memory.free_buffer(&mut grid)?;
    outcome
}

fn run(
    context: &GraphicsContext,
    memory: &DeviceMemoryManager<'_>,
    grid: &GpuBuffer,
    config: &ProbeConfig,
) -> anyhow::Result<()> {
    let mut debugger = ComputeDebugger::with_config(context, memory, DebuggerConfig::default());
    info!("Debugger capabilities: {:?}", debugger.capabilities());
    debugger.track_buffer(grid.buffer, GRID_BYTES, "grid");

    let groups = u32::try_from(GRID_SIDE / 8)?;
    let after_fill = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(grid.buffer)
        .offset(0)
        .size(vk::WHOLE_SIZE);

    let legal = debugger.validate_buffer_memory_barrier(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        &after_fill,
    );
    if !legal {
        bail!("probe barrier rejected: {:?}", debugger.errors());
    }
    debugger.check_synchronization_hazards(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        after_fill.src_access_mask,
        after_fill.dst_access_mask,
    );

    let cmd = context.begin_scoped_commands()?;
    debugger.begin_debug_label(cmd, "seed", [0.2, 0.6, 1.0, 1.0]);
    debugger.begin_dispatch_timed(cmd, "seed", groups, groups, groups);
    debugger.use_buffer(grid.buffer);
    unsafe {
        let device = context.device();
        device.cmd_fill_buffer(cmd, grid.buffer, 0, vk::WHOLE_SIZE, ALIVE);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[after_fill],
            &[],
        );
    }
    debugger.end_dispatch_timed(cmd);
    debugger.end_debug_label(cmd);
    debugger.insert_timestamp(cmd, "frame:end");
    context.end_scoped_commands(cmd)?;

    match debugger.retrieve_timestamps() {
        Ok(timings) => {
            for (shader, ms) in &timings.shaders {
                info!("{shader}: {ms:.3} ms GPU");
            }
        }
        Err(err) => warn!("No GPU timings: {err}"),
    }

    let mut alive = 0u64;
    debugger.capture_buffer_data(grid.buffer, 0, vk::WHOLE_SIZE, |bytes| {
        alive = bytes
            .chunks_exact(4)
            .filter(|cell| u32::from_ne_bytes([cell[0], cell[1], cell[2], cell[3]]) == ALIVE)
            .count() as u64;
    })?;
    info!("{alive} of {} cells alive after seeding", GRID_SIDE.pow(3));

    debugger.print_resource_usage();
    debugger.print_dispatch_history();
    debugger.dump_debug_info(&config.dump_path)?;

    let stats = debugger.statistics();
    info!(
        "{} dispatches, {} tracked resources, {} errors, {} warnings",
        stats.total_dispatches,
        stats.tracked_resources(),
        stats.error_count,
        stats.warning_count
    );
    if stats.error_count > 0 {
        bail!("debugger reported {} errors", stats.error_count);
    }
    Ok(())
}
