//! Fixed-capacity GPU timestamp ring.
//!
//! Slots are preallocated in one query pool and handed out in ring order.
//! Once the ring wraps, the oldest slot is overwritten whether or not it was
//! read back; [`SlotRef::sequence`] tells a stale reference from a live one.

use ash::vk;
use std::collections::HashMap;

/// Reference to one written timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Query index in the pool.
    pub index: u32,
    /// Zero-based sample number across the ring's lifetime.
    pub sequence: u64,
}

/// What currently occupies a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampSlot {
    pub marker: String,
    pub sequence: u64,
}

/// Host-side bookkeeping for the ring: which marker owns which slot.
#[derive(Debug)]
pub struct TimestampRing {
    slots: Vec<Option<TimestampSlot>>,
    cursor: u32,
    next_sequence: u64,
}

impl TimestampRing {
    /// Create a ring of `capacity` slots. Zero is raised to one.
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity as usize],
            cursor: 0,
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Total samples claimed so far.
    pub fn samples_written(&self) -> u64 {
        self.next_sequence
    }

    /// Claim the next slot for `marker`, overwriting whatever was there.
    pub fn claim(&mut self, marker: &str) -> SlotRef {
        let slot = SlotRef {
            index: self.cursor,
            sequence: self.next_sequence,
        };

        self.slots[self.cursor as usize] = Some(TimestampSlot {
            marker: marker.to_string(),
            sequence: slot.sequence,
        });
        self.cursor = (self.cursor + 1) % self.capacity();
        self.next_sequence += 1;

        slot
    }

    pub fn slot(&self, index: u32) -> Option<&TimestampSlot> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    /// Whether `slot` still holds the sample it referred to.
    pub fn is_live(&self, slot: SlotRef) -> bool {
        self.slot(slot.index)
            .is_some_and(|current| current.sequence == slot.sequence)
    }

    /// Occupied slots with their indices.
    pub fn occupied(&self) -> impl Iterator<Item = (u32, &TimestampSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i as u32, s)))
    }
}

/// Timings read back from the ring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestampTimings {
    /// Latest sample per marker, in milliseconds after the earliest readable sample.
    pub markers: HashMap<String, f64>,
    /// GPU time per shader summed over dispatches whose slots were intact.
    pub shaders: HashMap<String, f64>,
}

/// Query pool backing a [`TimestampRing`].
pub(crate) struct TimestampQueries {
    pool: vk::QueryPool,
    ring: TimestampRing,
    period_ns: f64,
    mask: u64,
}

impl TimestampQueries {
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        capacity: u32,
        period_ns: f32,
        mask: u64,
    ) -> Result<Self, vk::Result> {
        let ring = TimestampRing::new(capacity);
        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(ring.capacity());

        let pool = device.create_query_pool(&create_info, None)?;

        Ok(Self {
            pool,
            ring,
            period_ns: f64::from(period_ns),
            mask,
        })
    }

    pub fn ring(&self) -> &TimestampRing {
        &self.ring
    }

    /// Record a reset and a timestamp write into the next slot.
    ///
    /// # Safety
    /// The command buffer must be recording, outside a render pass, on a
    /// queue that supports timestamps.
    pub unsafe fn write(
        &mut self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        marker: &str,
    ) -> SlotRef {
        let slot = self.ring.claim(marker);
        device.cmd_reset_query_pool(cmd, self.pool, slot.index, 1);
        device.cmd_write_timestamp(cmd, stage, self.pool, slot.index);
        slot
    }

    /// Read a live slot without waiting. `None` if overwritten or not yet available.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn read(&self, device: &ash::Device, slot: SlotRef) -> Option<u64> {
        if !self.ring.is_live(slot) {
            return None;
        }

        let mut value = [0u64; 1];
        match device.get_query_pool_results(
            self.pool,
            slot.index,
            &mut value,
            vk::QueryResultFlags::TYPE_64,
        ) {
            Ok(()) => Some(value[0] & self.mask),
            Err(vk::Result::NOT_READY) => None,
            Err(err) => {
                tracing::debug!("Timestamp slot {} unreadable: {err}", slot.index);
                None
            }
        }
    }

    pub fn ticks_to_ms(&self, ticks: u64) -> f64 {
        ticks as f64 * self.period_ns / 1_000_000.0
    }

    /// Milliseconds between two raw samples, accounting for counter wrap.
    pub fn elapsed_ms(&self, start: u64, end: u64) -> f64 {
        self.ticks_to_ms(end.wrapping_sub(start) & self.mask)
    }

    /// # Safety
    /// The device must be valid and no pending work may reference the pool.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_query_pool(self.pool, None);
    }
}
