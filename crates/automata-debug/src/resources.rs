//! Tracked buffers and images.

use ash::vk;
use std::collections::HashMap;
use std::time::Instant;

/// Shape of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer { size: u64 },
    Image { extent: vk::Extent3D, format: vk::Format },
}

/// A buffer or image registered with the debugger.
#[derive(Debug, Clone)]
pub struct TrackedResource {
    pub name: String,
    pub kind: ResourceKind,
    /// Last time the resource was tracked or used by a dispatch.
    pub last_access: Instant,
}

impl TrackedResource {
    /// Size in bytes for buffers; texel size times texel count for images
    /// in a known format.
    pub fn byte_size(&self) -> Option<u64> {
        match self.kind {
            ResourceKind::Buffer { size } => Some(size),
            ResourceKind::Image { format, .. } => {
                format_texel_size(format).map(|texel| texel * self.texel_count())
            }
        }
    }

    /// Number of texels for images, zero for buffers.
    pub fn texel_count(&self) -> u64 {
        match self.kind {
            ResourceKind::Buffer { .. } => 0,
            ResourceKind::Image { extent, .. } => texels(extent),
        }
    }
}

pub(crate) fn texels(extent: vk::Extent3D) -> u64 {
    u64::from(extent.width) * u64::from(extent.height) * u64::from(extent.depth)
}

/// Bytes per texel for the uncompressed color formats a compute simulation
/// typically stores in images.
pub fn format_texel_size(format: vk::Format) -> Option<u64> {
    let size = match format {
        vk::Format::R8_UNORM | vk::Format::R8_SNORM | vk::Format::R8_UINT | vk::Format::R8_SINT => 1,
        vk::Format::R8G8_UNORM
        | vk::Format::R8G8_UINT
        | vk::Format::R16_UNORM
        | vk::Format::R16_UINT
        | vk::Format::R16_SINT
        | vk::Format::R16_SFLOAT => 2,
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SNORM
        | vk::Format::R8G8B8A8_UINT
        | vk::Format::R8G8B8A8_SINT
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::R16G16_UINT
        | vk::Format::R16G16_SFLOAT
        | vk::Format::R32_UINT
        | vk::Format::R32_SINT
        | vk::Format::R32_SFLOAT => 4,
        vk::Format::R16G16B16A16_UNORM
        | vk::Format::R16G16B16A16_UINT
        | vk::Format::R16G16B16A16_SFLOAT
        | vk::Format::R32G32_UINT
        | vk::Format::R32G32_SINT
        | vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32A32_UINT
        | vk::Format::R32G32B32A32_SINT
        | vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => return None,
    };
    Some(size)
}

/// Handle-keyed maps of tracked resources. Re-tracking a handle overwrites it.
#[derive(Debug, Default)]
pub(crate) struct ResourceTracker {
    buffers: HashMap<vk::Buffer, TrackedResource>,
    images: HashMap<vk::Image, TrackedResource>,
}

impl ResourceTracker {
    pub fn track_buffer(&mut self, buffer: vk::Buffer, size: u64, name: &str) {
        self.buffers.insert(
            buffer,
            TrackedResource {
                name: name.to_string(),
                kind: ResourceKind::Buffer { size },
                last_access: Instant::now(),
            },
        );
    }

    pub fn track_image(
        &mut self,
        image: vk::Image,
        extent: vk::Extent3D,
        format: vk::Format,
        name: &str,
    ) {
        self.images.insert(
            image,
            TrackedResource {
                name: name.to_string(),
                kind: ResourceKind::Image { extent, format },
                last_access: Instant::now(),
            },
        );
    }

    pub fn untrack_buffer(&mut self, buffer: vk::Buffer) -> Option<TrackedResource> {
        self.buffers.remove(&buffer)
    }

    pub fn untrack_image(&mut self, image: vk::Image) -> Option<TrackedResource> {
        self.images.remove(&image)
    }

    /// Refresh the last-access time. Returns whether the buffer is tracked.
    pub fn touch_buffer(&mut self, buffer: vk::Buffer) -> bool {
        self.buffers
            .get_mut(&buffer)
            .map(|resource| resource.last_access = Instant::now())
            .is_some()
    }

    /// Refresh the last-access time. Returns whether the image is tracked.
    pub fn touch_image(&mut self, image: vk::Image) -> bool {
        self.images
            .get_mut(&image)
            .map(|resource| resource.last_access = Instant::now())
            .is_some()
    }

    pub fn buffer(&self, buffer: vk::Buffer) -> Option<&TrackedResource> {
        self.buffers.get(&buffer)
    }

    pub fn image(&self, image: vk::Image) -> Option<&TrackedResource> {
        self.images.get(&image)
    }

    /// Tracked buffers sorted by name, for stable reports.
    pub fn buffers_by_name(&self) -> Vec<(vk::Buffer, &TrackedResource)> {
        let mut buffers: Vec<_> = self.buffers.iter().map(|(h, r)| (*h, r)).collect();
        buffers.sort_by(|a, b| a.1.name.cmp(&b.1.name).then(a.0.cmp(&b.0)));
        buffers
    }

    /// Tracked images sorted by name, for stable reports.
    pub fn images_by_name(&self) -> Vec<(vk::Image, &TrackedResource)> {
        let mut images: Vec<_> = self.images.iter().map(|(h, r)| (*h, r)).collect();
        images.sort_by(|a, b| a.1.name.cmp(&b.1.name).then(a.0.cmp(&b.0)));
        images
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn total_buffer_bytes(&self) -> u64 {
        self.buffers
            .values()
            .filter_map(TrackedResource::byte_size)
            .sum()
    }

    pub fn total_image_texels(&self) -> u64 {
        self.images.values().map(TrackedResource::texel_count).sum()
    }
}
