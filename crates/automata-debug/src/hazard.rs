//! Advisory synchronization hazard checks.
//!
//! The rules are conservative and only look at a single dependency. They flag
//! dependencies that cannot order the accesses they describe; they are not a
//! race detector.

use std::fmt;

use ash::vk;

use crate::barrier::{has_write, supported_access, unsupported_access, WRITE_ACCESS};

/// Classification of a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardKind {
    ReadAfterWrite,
    WriteAfterWrite,
    WriteAfterRead,
}

impl HazardKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadAfterWrite => "read-after-write",
            Self::WriteAfterWrite => "write-after-write",
            Self::WriteAfterRead => "write-after-read",
        }
    }
}

/// A detected hazard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hazard {
    pub kind: HazardKind,
    pub description: String,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.description)
    }
}

fn kind_for(dst_access: vk::AccessFlags) -> HazardKind {
    if has_write(dst_access) {
        HazardKind::WriteAfterWrite
    } else {
        HazardKind::ReadAfterWrite
    }
}

/// Check one dependency for accesses it leaves unordered.
pub fn detect_hazards(
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> Vec<Hazard> {
    let mut hazards = Vec::new();
    let src_writes = src_access & WRITE_ACCESS;

    if !src_writes.is_empty() {
        // Writes the source stages never perform are not made available.
        let stray = src_writes & !supported_access(src_stage);
        if !stray.is_empty() {
            hazards.push(Hazard {
                kind: kind_for(dst_access),
                description: format!(
                    "source writes {stray:?} are not performed by {src_stage:?}, so they are not made available"
                ),
            });
        }

        if dst_access.is_empty() {
            hazards.push(Hazard {
                kind: HazardKind::ReadAfterWrite,
                description: format!(
                    "writes {src_writes:?} before {dst_stage:?} have no destination access; \
                     execution-only dependency does not make them visible"
                ),
            });
        } else {
            let unseen = unsupported_access(dst_stage, dst_access);
            if !unseen.is_empty() {
                hazards.push(Hazard {
                    kind: kind_for(unseen),
                    description: format!(
                        "writes {src_writes:?} are not made visible to {unseen:?}, which {dst_stage:?} does not perform"
                    ),
                });
            }
        }
    }

    if src_stage == vk::PipelineStageFlags::TOP_OF_PIPE && src_writes.is_empty() && has_write(dst_access)
    {
        hazards.push(Hazard {
            kind: HazardKind::WriteAfterRead,
            description: format!(
                "destination writes {:?} wait on TOP_OF_PIPE only, which does not order earlier reads",
                dst_access & WRITE_ACCESS
            ),
        });
    }

    hazards
}
