//! Scoped command submission on the compute queue.

use crate::error::Result;
use ash::vk;

/// Command pool for short-lived, synchronously submitted command buffers.
///
/// Buffers are reset individually, so each scoped buffer can be freed as soon
/// as its submission has drained.
pub struct ScopedCommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
    /// Buffers handed out and not yet submitted.
    outstanding: usize,
}

impl ScopedCommandPool {
    /// # Safety
    /// The device must be valid and `queue_family` must be one of its families.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                    | vk::CommandPoolCreateFlags::TRANSIENT,
            );

        let pool = device.create_command_pool(&create_info, None)?;

        Ok(Self {
            pool,
            queue_family,
            outstanding: 0,
        })
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Buffers begun but not yet submitted.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Allocate a primary buffer and begin it with the one-time-submit hint.
    ///
    /// The buffer goes back to the pool if beginning fails.
    ///
    /// # Safety
    /// The device must be the one the pool was created on.
    pub unsafe fn begin(&mut self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = device.allocate_command_buffers(&alloc_info)?[0];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(err) = device.begin_command_buffer(cmd, &begin_info) {
            device.free_command_buffers(self.pool, &[cmd]);
            return Err(err.into());
        }

        self.outstanding += 1;
        Ok(cmd)
    }

    /// End `cmd`, submit it to `queue` and block until the queue is idle.
    ///
    /// `cmd` is freed on every path. There is no timeout: a hung GPU blocks
    /// the calling thread.
    ///
    /// # Safety
    /// `cmd` must come from [`begin`](Self::begin) on this pool and `queue`
    /// must belong to the pool's family.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub unsafe fn submit_and_wait(
        &mut self,
        device: &ash::Device,
        queue: vk::Queue,
        cmd: vk::CommandBuffer,
    ) -> Result<()> {
        let submitted = device.end_command_buffer(cmd).and_then(|()| {
            let cmd_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
            device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
            device.queue_wait_idle(queue)
        });

        device.free_command_buffers(self.pool, &[cmd]);
        self.outstanding = self.outstanding.saturating_sub(1);

        if let Err(err) = submitted {
            tracing::error!("Scoped command submission failed: {err}");
            return Err(err.into());
        }
        Ok(())
    }

    /// # Safety
    /// The device must be valid and no buffer from the pool may be pending.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.outstanding > 0 {
            tracing::warn!(
                "Destroying command pool with {} unsubmitted scoped buffers",
                self.outstanding
            );
        }
        device.destroy_command_pool(self.pool, None);
        self.pool = vk::CommandPool::null();
    }
}
