//! Stage/access legality for pipeline barriers.
//!
//! Follows the Vulkan table of supported access types per pipeline stage:
//! every access bit in a barrier must be performed by at least one stage in
//! the matching stage mask. `MEMORY_READ` and `MEMORY_WRITE` are valid with
//! any stage.

use ash::vk;
use thiserror::Error;

const SHADER_ACCESS: vk::AccessFlags = vk::AccessFlags::from_raw(
    vk::AccessFlags::UNIFORM_READ.as_raw()
        | vk::AccessFlags::SHADER_READ.as_raw()
        | vk::AccessFlags::SHADER_WRITE.as_raw(),
);

const ANY_STAGE_ACCESS: vk::AccessFlags = vk::AccessFlags::from_raw(
    vk::AccessFlags::MEMORY_READ.as_raw() | vk::AccessFlags::MEMORY_WRITE.as_raw(),
);

/// Access bits that write memory.
pub const WRITE_ACCESS: vk::AccessFlags = vk::AccessFlags::from_raw(
    vk::AccessFlags::SHADER_WRITE.as_raw()
        | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags::TRANSFER_WRITE.as_raw()
        | vk::AccessFlags::HOST_WRITE.as_raw()
        | vk::AccessFlags::MEMORY_WRITE.as_raw(),
);

/// Per-stage access support.
const STAGE_ACCESS: &[(vk::PipelineStageFlags, vk::AccessFlags)] = &[
    (
        vk::PipelineStageFlags::DRAW_INDIRECT,
        vk::AccessFlags::INDIRECT_COMMAND_READ,
    ),
    (
        vk::PipelineStageFlags::VERTEX_INPUT,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::INDEX_READ.as_raw() | vk::AccessFlags::VERTEX_ATTRIBUTE_READ.as_raw(),
        ),
    ),
    (vk::PipelineStageFlags::VERTEX_SHADER, SHADER_ACCESS),
    (vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER, SHADER_ACCESS),
    (vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER, SHADER_ACCESS),
    (vk::PipelineStageFlags::GEOMETRY_SHADER, SHADER_ACCESS),
    (
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::AccessFlags::from_raw(
            SHADER_ACCESS.as_raw() | vk::AccessFlags::INPUT_ATTACHMENT_READ.as_raw(),
        ),
    ),
    (
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
    ),
    (
        vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
    ),
    (
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
    ),
    (vk::PipelineStageFlags::COMPUTE_SHADER, SHADER_ACCESS),
    (
        vk::PipelineStageFlags::TRANSFER,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::TRANSFER_READ.as_raw() | vk::AccessFlags::TRANSFER_WRITE.as_raw(),
        ),
    ),
    (
        vk::PipelineStageFlags::HOST,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::HOST_READ.as_raw() | vk::AccessFlags::HOST_WRITE.as_raw(),
        ),
    ),
];

/// Stages covered by `ALL_GRAPHICS`.
const GRAPHICS_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::DRAW_INDIRECT.as_raw()
        | vk::PipelineStageFlags::VERTEX_INPUT.as_raw()
        | vk::PipelineStageFlags::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER.as_raw()
        | vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER.as_raw()
        | vk::PipelineStageFlags::GEOMETRY_SHADER.as_raw()
        | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw(),
);

/// Union of access bits performed by any stage in `stages`.
pub fn supported_access(stages: vk::PipelineStageFlags) -> vk::AccessFlags {
    if stages.contains(vk::PipelineStageFlags::ALL_COMMANDS) {
        return vk::AccessFlags::from_raw(u32::MAX);
    }

    let mut expanded = stages;
    if stages.contains(vk::PipelineStageFlags::ALL_GRAPHICS) {
        expanded |= GRAPHICS_STAGES;
    }

    STAGE_ACCESS
        .iter()
        .filter(|(stage, _)| expanded.intersects(*stage))
        .fold(ANY_STAGE_ACCESS, |acc, (_, access)| acc | *access)
}

/// Access bits in `access` that no stage in `stages` performs.
pub fn unsupported_access(
    stages: vk::PipelineStageFlags,
    access: vk::AccessFlags,
) -> vk::AccessFlags {
    vk::AccessFlags::from_raw(access.as_raw() & !supported_access(stages).as_raw())
}

/// Whether `access` contains any write bit.
pub fn has_write(access: vk::AccessFlags) -> bool {
    access.intersects(WRITE_ACCESS)
}

/// Problems found in a barrier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarrierIssue {
    #[error("source stage mask is empty")]
    EmptySourceStages,
    #[error("destination stage mask is empty")]
    EmptyDestinationStages,
    #[error("source access {access:?} is not performed by source stages {stages:?}")]
    UnsupportedSourceAccess {
        stages: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    },
    #[error("destination access {access:?} is not performed by destination stages {stages:?}")]
    UnsupportedDestinationAccess {
        stages: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    },
    #[error("buffer barrier on a null buffer")]
    NullBuffer,
    #[error("buffer barrier with zero size")]
    ZeroSize,
    #[error("buffer barrier range {offset}+{size} exceeds tracked size {tracked} of '{name}'")]
    RangeExceedsTracked {
        name: String,
        offset: u64,
        size: u64,
        tracked: u64,
    },
    #[error("image barrier on a null image")]
    NullImage,
    #[error("image barrier transitions to {0:?}")]
    InvalidNewLayout(vk::ImageLayout),
}

/// Check the stage masks and the access bits they imply.
pub fn check_stage_access(
    src_stages: vk::PipelineStageFlags,
    dst_stages: vk::PipelineStageFlags,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> Vec<BarrierIssue> {
    let mut issues = Vec::new();

    if src_stages.is_empty() {
        issues.push(BarrierIssue::EmptySourceStages);
    } else {
        let illegal = unsupported_access(src_stages, src_access);
        if !illegal.is_empty() {
            issues.push(BarrierIssue::UnsupportedSourceAccess {
                stages: src_stages,
                access: illegal,
            });
        }
    }

    if dst_stages.is_empty() {
        issues.push(BarrierIssue::EmptyDestinationStages);
    } else {
        let illegal = unsupported_access(dst_stages, dst_access);
        if !illegal.is_empty() {
            issues.push(BarrierIssue::UnsupportedDestinationAccess {
                stages: dst_stages,
                access: illegal,
            });
        }
    }

    issues
}

/// Check the buffer-specific fields of a buffer barrier.
///
/// `tracked` is the debug name and byte size of the buffer when it is tracked;
/// `vk::WHOLE_SIZE` is never out of range.
pub fn check_buffer_fields(
    buffer: vk::Buffer,
    offset: u64,
    size: u64,
    tracked: Option<(&str, u64)>,
) -> Vec<BarrierIssue> {
    let mut issues = Vec::new();
    if buffer == vk::Buffer::null() {
        issues.push(BarrierIssue::NullBuffer);
    }
    if size == 0 {
        issues.push(BarrierIssue::ZeroSize);
    }
    if let Some((name, tracked)) = tracked {
        let end = if size == vk::WHOLE_SIZE {
            Some(offset)
        } else {
            offset.checked_add(size)
        };
        let out_of_range = match end {
            Some(end) => end > tracked || offset > tracked,
            None => true,
        };
        if out_of_range {
            issues.push(BarrierIssue::RangeExceedsTracked {
                name: name.to_owned(),
                offset,
                size,
                tracked,
            });
        }
    }
    issues
}

/// Check the image-specific fields of an image barrier.
pub fn check_image_fields(image: vk::Image, new_layout: vk::ImageLayout) -> Vec<BarrierIssue> {
    let mut issues = Vec::new();
    if image == vk::Image::null() {
        issues.push(BarrierIssue::NullImage);
    }
    if matches!(
        new_layout,
        vk::ImageLayout::UNDEFINED | vk::ImageLayout::PREINITIALIZED
    ) {
        issues.push(BarrierIssue::InvalidNewLayout(new_layout));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    type Stage = vk::PipelineStageFlags;
    type Access = vk::AccessFlags;

    /// Legal pairs straight from the supported access types table.
    const LEGAL: &[(Stage, Access)] = &[
        (Stage::DRAW_INDIRECT, Access::INDIRECT_COMMAND_READ),
        (Stage::VERTEX_INPUT, Access::INDEX_READ),
        (Stage::VERTEX_INPUT, Access::VERTEX_ATTRIBUTE_READ),
        (Stage::VERTEX_SHADER, Access::UNIFORM_READ),
        (Stage::VERTEX_SHADER, Access::SHADER_READ),
        (Stage::VERTEX_SHADER, Access::SHADER_WRITE),
        (Stage::TESSELLATION_CONTROL_SHADER, Access::SHADER_READ),
        (Stage::TESSELLATION_EVALUATION_SHADER, Access::SHADER_WRITE),
        (Stage::GEOMETRY_SHADER, Access::UNIFORM_READ),
        (Stage::FRAGMENT_SHADER, Access::INPUT_ATTACHMENT_READ),
        (Stage::FRAGMENT_SHADER, Access::SHADER_READ),
        (Stage::EARLY_FRAGMENT_TESTS, Access::DEPTH_STENCIL_ATTACHMENT_READ),
        (Stage::LATE_FRAGMENT_TESTS, Access::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (Stage::COLOR_ATTACHMENT_OUTPUT, Access::COLOR_ATTACHMENT_READ),
        (Stage::COLOR_ATTACHMENT_OUTPUT, Access::COLOR_ATTACHMENT_WRITE),
        (Stage::COMPUTE_SHADER, Access::UNIFORM_READ),
        (Stage::COMPUTE_SHADER, Access::SHADER_READ),
        (Stage::COMPUTE_SHADER, Access::SHADER_WRITE),
        (Stage::TRANSFER, Access::TRANSFER_READ),
        (Stage::TRANSFER, Access::TRANSFER_WRITE),
        (Stage::HOST, Access::HOST_READ),
        (Stage::HOST, Access::HOST_WRITE),
        (Stage::TOP_OF_PIPE, Access::MEMORY_READ),
        (Stage::BOTTOM_OF_PIPE, Access::MEMORY_WRITE),
        (Stage::ALL_GRAPHICS, Access::COLOR_ATTACHMENT_WRITE),
        (Stage::ALL_COMMANDS, Access::TRANSFER_WRITE),
        (Stage::ALL_COMMANDS, Access::HOST_READ),
    ];

    #[test]
    fn every_table_pair_is_legal() {
        for &(stage, access) in LEGAL {
            assert!(
                unsupported_access(stage, access).is_empty(),
                "{stage:?} should support {access:?}"
            );
        }
    }

    #[test]
    fn shader_write_on_transfer_stage_is_illegal() {
        let illegal = unsupported_access(Stage::TRANSFER, Access::SHADER_WRITE);
        assert_eq!(illegal, Access::SHADER_WRITE);
    }

    #[test]
    fn illegal_bits_are_isolated() {
        let illegal = unsupported_access(
            Stage::COMPUTE_SHADER,
            Access::SHADER_READ | Access::TRANSFER_READ | Access::HOST_WRITE,
        );
        assert_eq!(illegal, Access::TRANSFER_READ | Access::HOST_WRITE);
    }

    #[test]
    fn all_graphics_excludes_compute_only_transfer() {
        assert!(!unsupported_access(Stage::ALL_GRAPHICS, Access::TRANSFER_READ).is_empty());
    }

    #[test]
    fn top_of_pipe_performs_no_shader_access() {
        assert!(!unsupported_access(Stage::TOP_OF_PIPE, Access::SHADER_READ).is_empty());
    }

    #[test]
    fn combined_stages_union_their_access() {
        let stages = Stage::COMPUTE_SHADER | Stage::TRANSFER;
        assert!(unsupported_access(stages, Access::SHADER_WRITE | Access::TRANSFER_WRITE).is_empty());
    }

    #[test]
    fn empty_stage_masks_are_reported() {
        let issues = check_stage_access(Stage::empty(), Stage::empty(), Access::empty(), Access::empty());
        assert_eq!(
            issues,
            [BarrierIssue::EmptySourceStages, BarrierIssue::EmptyDestinationStages]
        );
    }

    #[test]
    fn compute_to_compute_barrier_is_clean() {
        let issues = check_stage_access(
            Stage::COMPUTE_SHADER,
            Stage::COMPUTE_SHADER,
            Access::SHADER_WRITE,
            Access::SHADER_READ,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn buffer_range_checks() {
        use ash::vk::Handle;

        let buffer = vk::Buffer::from_raw(7);
        assert!(check_buffer_fields(buffer, 0, 256, Some(("grid", 256))).is_empty());
        assert!(check_buffer_fields(buffer, 128, vk::WHOLE_SIZE, Some(("grid", 256))).is_empty());
        assert!(check_buffer_fields(buffer, 0, 4096, None).is_empty());
        assert_eq!(
            check_buffer_fields(buffer, 128, 256, Some(("grid", 256))),
            [BarrierIssue::RangeExceedsTracked {
                name: "grid".into(),
                offset: 128,
                size: 256,
                tracked: 256,
            }]
        );
        assert_eq!(
            check_buffer_fields(vk::Buffer::null(), 0, 0, None),
            [BarrierIssue::NullBuffer, BarrierIssue::ZeroSize]
        );
    }

    #[test]
    fn image_layout_checks() {
        use ash::vk::Handle;

        let image = vk::Image::from_raw(1);
        assert!(check_image_fields(image, vk::ImageLayout::GENERAL).is_empty());
        assert_eq!(
            check_image_fields(image, vk::ImageLayout::UNDEFINED),
            [BarrierIssue::InvalidNewLayout(vk::ImageLayout::UNDEFINED)]
        );
        assert_eq!(
            check_image_fields(vk::Image::null(), vk::ImageLayout::GENERAL),
            [BarrierIssue::NullImage]
        );
    }

    #[test]
    fn write_detection() {
        assert!(has_write(Access::SHADER_WRITE | Access::SHADER_READ));
        assert!(!has_write(Access::SHADER_READ | Access::UNIFORM_READ));
    }
}
