//! Host-side debugger behavior. None of these need a GPU.

use approx::assert_relative_eq;
use ash::vk::{self, Handle};
use automata_debug::{
    ComputeDebugger, DebugError, DebuggerCapabilities, DebuggerConfig, HazardKind, MessageKind,
    Severity,
};

fn debugger() -> ComputeDebugger<'static> {
    ComputeDebugger::headless(DebuggerConfig::default())
}

fn buffer(raw: u64) -> vk::Buffer {
    vk::Buffer::from_raw(raw)
}

fn image(raw: u64) -> vk::Image {
    vk::Image::from_raw(raw)
}

fn extent(width: u32, height: u32, depth: u32) -> vk::Extent3D {
    vk::Extent3D {
        width,
        height,
        depth,
    }
}

#[test]
fn headless_has_no_capabilities() {
    let debugger = debugger();
    assert_eq!(debugger.capabilities(), DebuggerCapabilities::NONE);
    assert!(debugger.is_enabled());
}

#[test]
fn untracked_handles_leave_statistics() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 4096, "grid");
    debugger.track_image(image(2), extent(8, 8, 8), vk::Format::R32_UINT, "volume");
    assert_eq!(debugger.statistics().tracked_resources(), 2);

    debugger.untrack_buffer(buffer(1));
    debugger.untrack_image(image(2));

    let stats = debugger.statistics();
    assert_eq!(stats.tracked_resources(), 0);
    assert_eq!(stats.total_buffer_bytes, 0);
    assert!(debugger.tracked_buffer(buffer(1)).is_none());
}

#[test]
fn untracking_unknown_handle_is_silent() {
    let mut debugger = debugger();
    debugger.untrack_buffer(buffer(42));
    debugger.untrack_image(image(42));
    assert!(debugger.errors().is_empty());
    assert!(debugger.warnings().is_empty());
}

#[test]
fn retracking_overwrites() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 64, "old");
    debugger.track_buffer(buffer(1), 128, "new");

    let stats = debugger.statistics();
    assert_eq!(stats.tracked_buffers, 1);
    assert_eq!(stats.total_buffer_bytes, 128);
    assert_eq!(debugger.tracked_buffer(buffer(1)).unwrap().name, "new");
}

#[test]
fn null_buffer_is_not_tracked() {
    let mut debugger = debugger();
    debugger.track_buffer(vk::Buffer::null(), 64, "nothing");
    assert_eq!(debugger.statistics().tracked_buffers, 0);
    assert_eq!(debugger.errors()[0].kind, MessageKind::ObjectValidation);
}

#[test]
fn dispatch_state_machine() {
    let mut debugger = debugger();
    assert!(!debugger.is_in_dispatch());

    debugger.begin_dispatch("step", 8, 8, 8);
    assert!(debugger.is_in_dispatch());
    assert_eq!(debugger.current_dispatch().unwrap().shader_name, "step");

    debugger.end_dispatch();
    assert!(!debugger.is_in_dispatch());
    assert_eq!(debugger.history().len(), 1);
    assert_eq!(debugger.history()[0].workgroups, [8, 8, 8]);
    assert!(debugger.errors().is_empty());
}

#[test]
fn begin_while_open_is_an_error_and_keeps_the_open_dispatch() {
    let mut debugger = debugger();
    debugger.begin_dispatch("first", 1, 1, 1);
    debugger.begin_dispatch("second", 1, 1, 1);

    assert_eq!(debugger.errors().len(), 1);
    assert_eq!(debugger.errors()[0].severity, Severity::Error);
    assert_eq!(debugger.errors()[0].kind, MessageKind::DispatchState);
    assert_eq!(debugger.current_dispatch().unwrap().shader_name, "first");

    debugger.end_dispatch();
    assert_eq!(debugger.history().len(), 1);
}

#[test]
fn end_while_idle_is_an_error() {
    let mut debugger = debugger();
    debugger.end_dispatch();
    debugger.end_dispatch_timed(vk::CommandBuffer::null());

    assert_eq!(debugger.errors().len(), 2);
    assert!(debugger.history().is_empty());
}

#[test]
fn timed_dispatch_without_timestamps_behaves_like_untimed() {
    let mut debugger = debugger();
    debugger.begin_dispatch_timed(vk::CommandBuffer::null(), "step", 4, 4, 4);
    debugger.end_dispatch_timed(vk::CommandBuffer::null());

    let record = &debugger.history()[0];
    assert!(record.gpu_start.is_none());
    assert!(record.gpu_end.is_none());
    assert!(debugger.errors().is_empty());
}

#[test]
fn used_resources_are_attached_to_the_open_dispatch() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 64, "grid");
    debugger.track_image(image(2), extent(4, 4, 4), vk::Format::R8_UNORM, "slice");

    debugger.begin_dispatch("step", 1, 1, 1);
    debugger.use_buffer(buffer(1));
    debugger.use_buffer(buffer(1));
    debugger.use_image(image(2));
    debugger.end_dispatch();

    let record = &debugger.history()[0];
    assert_eq!(record.buffers, [buffer(1)]);
    assert_eq!(record.images, [image(2)]);
    assert!(debugger.warnings().is_empty());
}

#[test]
fn using_an_untracked_buffer_warns() {
    let mut debugger = debugger();
    debugger.use_buffer(buffer(9));
    assert_eq!(debugger.warnings().len(), 1);
    assert!(debugger.errors().is_empty());
}

#[test]
fn disabled_debugger_changes_nothing() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 64, "grid");
    let before = debugger.statistics();

    debugger.set_enabled(false);
    debugger.track_buffer(buffer(2), 128, "other");
    debugger.untrack_buffer(buffer(1));
    debugger.track_image(image(3), extent(2, 2, 2), vk::Format::R8_UNORM, "img");
    debugger.end_dispatch();
    debugger.begin_dispatch("step", 1, 1, 1);
    debugger.begin_dispatch("step", 1, 1, 1);
    debugger.use_buffer(buffer(77));
    debugger.begin_debug_label(vk::CommandBuffer::null(), "region", [1.0, 0.0, 0.0, 1.0]);
    debugger.insert_debug_label(vk::CommandBuffer::null(), "mark", [0.0; 4]);
    debugger.end_debug_label(vk::CommandBuffer::null());
    assert!(debugger.validate_shader_module(vk::ShaderModule::null(), "missing"));
    assert!(debugger
        .check_synchronization_hazards(
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::empty(),
        )
        .is_empty());

    assert_eq!(debugger.statistics(), before);
    assert!(debugger.errors().is_empty());
    assert!(debugger.warnings().is_empty());
    assert!(!debugger.is_in_dispatch());

    debugger.set_enabled(true);
    debugger.end_dispatch();
    assert_eq!(debugger.errors().len(), 1);
}

#[test]
fn disabled_timestamp_retrieval_is_empty() {
    let mut debugger = debugger();
    debugger.begin_dispatch("step", 1, 1, 1);
    debugger.end_dispatch();
    let before = debugger.statistics();

    debugger.set_enabled(false);
    let timings = debugger.retrieve_timestamps().expect("disabled retrieval");
    assert!(timings.markers.is_empty());
    assert!(timings.shaders.is_empty());
    assert!(debugger.history()[0].gpu_time_ms.is_none());
    assert_eq!(debugger.statistics(), before);
}

#[test]
fn starting_disabled_from_config() {
    let mut debugger = ComputeDebugger::headless(DebuggerConfig::default().with_enabled(false));
    debugger.track_buffer(buffer(1), 64, "grid");
    assert_eq!(debugger.statistics().tracked_buffers, 0);
}

#[test]
fn legal_memory_barriers_pass_silently() {
    let mut debugger = debugger();
    let legal = [
        (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE),
        (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::UNIFORM_READ),
        (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ),
        (vk::PipelineStageFlags::HOST, vk::AccessFlags::HOST_READ),
        (vk::PipelineStageFlags::DRAW_INDIRECT, vk::AccessFlags::INDIRECT_COMMAND_READ),
        (vk::PipelineStageFlags::FRAGMENT_SHADER, vk::AccessFlags::INPUT_ATTACHMENT_READ),
        (vk::PipelineStageFlags::ALL_COMMANDS, vk::AccessFlags::MEMORY_WRITE),
    ];

    for (stage, access) in legal {
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(access)
            .dst_access_mask(access);
        assert!(
            debugger.validate_memory_barrier(stage, stage, &barrier),
            "{stage:?} / {access:?}"
        );
    }
    assert!(debugger.errors().is_empty());
    assert!(debugger.warnings().is_empty());
}

#[test]
fn shader_write_on_transfer_stage_is_rejected() {
    let mut debugger = debugger();
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ);

    assert!(!debugger.validate_memory_barrier(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        &barrier,
    ));
    assert_eq!(debugger.errors().len(), 1);
    assert_eq!(debugger.errors()[0].kind, MessageKind::BarrierValidation);
}

#[test]
fn buffer_barrier_range_is_checked_against_tracked_size() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 256, "grid");

    let stage = vk::PipelineStageFlags::COMPUTE_SHADER;
    let inside = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ)
        .buffer(buffer(1))
        .offset(0)
        .size(vk::WHOLE_SIZE);
    assert!(debugger.validate_buffer_memory_barrier(stage, stage, &inside));

    let outside = inside.offset(128).size(256);
    assert!(!debugger.validate_buffer_memory_barrier(stage, stage, &outside));
    assert!(debugger.errors()[0].text.contains("grid"));
}

#[test]
fn image_barrier_to_undefined_is_rejected() {
    let mut debugger = debugger();
    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ)
        .image(image(5))
        .old_layout(vk::ImageLayout::GENERAL)
        .new_layout(vk::ImageLayout::UNDEFINED);

    let stage = vk::PipelineStageFlags::COMPUTE_SHADER;
    assert!(!debugger.validate_image_memory_barrier(stage, stage, &barrier));

    let fixed = barrier.new_layout(vk::ImageLayout::GENERAL);
    debugger.clear_messages();
    assert!(debugger.validate_image_memory_barrier(stage, stage, &fixed));
    assert!(debugger.errors().is_empty());
}

#[test]
fn hazards_are_warnings() {
    let mut debugger = debugger();
    let hazards = debugger.check_synchronization_hazards(
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::PipelineStageFlags::TRANSFER,
        vk::AccessFlags::SHADER_WRITE,
        vk::AccessFlags::SHADER_READ,
    );

    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].kind, HazardKind::ReadAfterWrite);
    assert_eq!(debugger.warnings().len(), 1);
    assert!(debugger.errors().is_empty());
}

#[test]
fn covered_dependency_has_no_hazard() {
    let mut debugger = debugger();
    let hazards = debugger.check_synchronization_hazards(
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::AccessFlags::SHADER_WRITE,
        vk::AccessFlags::SHADER_READ,
    );
    assert!(hazards.is_empty());
    assert!(debugger.warnings().is_empty());
}

#[test]
fn empty_stage_mask_in_hazard_check_is_an_error() {
    let mut debugger = debugger();
    let hazards = debugger.check_synchronization_hazards(
        vk::PipelineStageFlags::empty(),
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::AccessFlags::SHADER_WRITE,
        vk::AccessFlags::SHADER_READ,
    );
    assert!(hazards.is_empty());
    assert_eq!(debugger.errors().len(), 1);
}

#[test]
fn null_objects_fail_validation() {
    let mut debugger = debugger();
    assert!(!debugger.validate_shader_module(vk::ShaderModule::null(), "step.spv"));
    assert!(!debugger.validate_compute_pipeline(vk::Pipeline::null(), "step"));
    assert!(debugger.validate_compute_pipeline(vk::Pipeline::from_raw(3), "step"));
    assert_eq!(debugger.errors().len(), 2);
}

#[test]
fn clear_messages_empties_both_lists() {
    let mut debugger = debugger();
    debugger.end_dispatch();
    debugger.use_buffer(buffer(1));
    debugger.clear_messages();
    assert!(debugger.errors().is_empty());
    assert!(debugger.warnings().is_empty());
    assert_eq!(debugger.statistics().error_count, 0);
}

#[test]
fn history_is_bounded() {
    let mut debugger = ComputeDebugger::headless(DebuggerConfig::default().with_history_limit(3));
    for i in 0..5 {
        debugger.begin_dispatch(&format!("pass{i}"), 1, 1, 1);
        debugger.end_dispatch();
    }
    let names: Vec<_> = debugger
        .history()
        .iter()
        .map(|r| r.shader_name.as_str())
        .collect();
    assert_eq!(names, ["pass2", "pass3", "pass4"]);
    assert_eq!(debugger.statistics().total_dispatches, 3);
}

#[test]
fn statistics_group_by_shader() {
    let mut debugger = debugger();
    for name in ["step", "step", "seed"] {
        debugger.begin_dispatch(name, 1, 1, 1);
        debugger.end_dispatch();
    }

    let stats = debugger.statistics();
    assert_eq!(stats.total_dispatches, 3);
    assert_eq!(stats.per_shader["step"].dispatches, 2);
    assert_eq!(stats.per_shader["seed"].dispatches, 1);
    assert!(stats.average_dispatch_time_ms >= 0.0);
    assert_relative_eq!(
        stats.per_shader["step"].average_ms() * 2.0,
        stats.per_shader["step"].total_ms,
        epsilon = 1e-9
    );
}

#[test]
fn gpu_operations_are_unavailable_headless() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 64, "grid");

    assert!(matches!(
        debugger.retrieve_timestamps(),
        Err(DebugError::Unavailable(_))
    ));
    assert!(matches!(
        debugger.capture_buffer_data(buffer(1), 0, 64, |_| {}),
        Err(DebugError::Unavailable(_))
    ));
    assert!(debugger
        .insert_timestamp(vk::CommandBuffer::null(), "marker")
        .is_none());
}

#[test]
fn grid_step_statistics() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 1_048_576, "grid");
    debugger.begin_dispatch("step", 8, 8, 8);
    debugger.use_buffer(buffer(1));
    debugger.end_dispatch();

    let stats = debugger.statistics();
    assert_eq!(stats.total_dispatches, 1);
    assert_eq!(stats.tracked_resources(), 1);
    assert_eq!(stats.total_buffer_bytes, 1_048_576);
    assert_eq!(stats.per_shader["step"].dispatches, 1);
    assert!(debugger.errors().is_empty());
    assert!(debugger.warnings().is_empty());
}

#[test]
fn reports_describe_state() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 1_048_576, "grid");
    debugger.begin_dispatch("step", 8, 8, 8);
    debugger.end_dispatch();

    let resources = debugger.resource_usage_report();
    assert!(resources.contains("grid"));
    assert!(resources.contains("1.00 MiB"));

    let history = debugger.dispatch_history_report();
    assert!(history.contains("step"));
    assert!(history.contains("(1 of 1)"));

    debugger.print_resource_usage();
    debugger.print_dispatch_history();
}

#[test]
fn dump_writes_all_sections() {
    let mut debugger = debugger();
    debugger.track_buffer(buffer(1), 512, "grid");
    debugger.begin_dispatch("step", 2, 2, 2);
    debugger.end_dispatch();
    debugger.end_dispatch();

    let path = std::env::temp_dir().join(format!("automata-debug-dump-{}.txt", std::process::id()));
    debugger.dump_debug_info(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(text.contains("grid"));
    assert!(text.contains("step"));
    assert!(text.contains("Errors (1):"));
    assert!(text.contains("[dispatch]"));
}

#[test]
fn dump_to_missing_directory_fails() {
    let debugger = debugger();
    let path = std::env::temp_dir()
        .join("automata-debug-no-such-dir")
        .join("nested")
        .join("dump.txt");
    assert!(matches!(
        debugger.dump_debug_info(&path),
        Err(DebugError::Io(_))
    ));
}
