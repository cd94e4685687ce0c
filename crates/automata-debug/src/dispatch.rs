//! Dispatch bracketing and history.

use crate::timestamps::SlotRef;
use ash::vk;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// One compute dispatch as seen by the debugger.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub shader_name: String,
    pub workgroups: [u32; 3],
    pub start: Instant,
    /// `None` while the dispatch is open.
    pub end: Option<Instant>,
    /// Buffers used while the dispatch was open, in first-use order.
    pub buffers: Vec<vk::Buffer>,
    /// Images used while the dispatch was open, in first-use order.
    pub images: Vec<vk::Image>,
    pub gpu_start: Option<SlotRef>,
    pub gpu_end: Option<SlotRef>,
    /// Filled in by timestamp retrieval when both slots were still intact.
    pub gpu_time_ms: Option<f64>,
}

impl DispatchRecord {
    pub(crate) fn open(shader_name: &str, workgroups: [u32; 3], gpu_start: Option<SlotRef>) -> Self {
        Self {
            shader_name: shader_name.to_string(),
            workgroups,
            start: Instant::now(),
            end: None,
            buffers: Vec::new(),
            images: Vec::new(),
            gpu_start,
            gpu_end: None,
            gpu_time_ms: None,
        }
    }

    /// Host time between begin and end. Zero while open.
    pub fn host_duration(&self) -> Duration {
        self.end
            .map(|end| end.saturating_duration_since(self.start))
            .unwrap_or_default()
    }

    pub fn host_time_ms(&self) -> f64 {
        self.host_duration().as_secs_f64() * 1000.0
    }

    /// Total number of workgroups launched.
    pub fn workgroup_count(&self) -> u64 {
        self.workgroups.iter().map(|&n| u64::from(n)).product()
    }

    pub(crate) fn note_buffer(&mut self, buffer: vk::Buffer) {
        if !self.buffers.contains(&buffer) {
            self.buffers.push(buffer);
        }
    }

    pub(crate) fn note_image(&mut self, image: vk::Image) {
        if !self.images.contains(&image) {
            self.images.push(image);
        }
    }
}

/// Out-of-order use of the dispatch bracket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchMisuse {
    #[error("begin_dispatch('{requested}') while '{open}' is still open; the open dispatch is kept")]
    BeginWhileOpen { open: String, requested: String },
    #[error("end_dispatch() without a matching begin_dispatch()")]
    EndWhileIdle,
}

#[derive(Debug, Default)]
enum DispatchState {
    #[default]
    Idle,
    InDispatch(DispatchRecord),
}

/// `Idle <-> InDispatch` state machine plus a bounded history of completed dispatches.
#[derive(Debug)]
pub(crate) struct DispatchTracker {
    state: DispatchState,
    history: VecDeque<DispatchRecord>,
    history_limit: usize,
}

impl DispatchTracker {
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: DispatchState::Idle,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DispatchState::InDispatch(_))
    }

    pub fn current(&self) -> Option<&DispatchRecord> {
        match &self.state {
            DispatchState::InDispatch(record) => Some(record),
            DispatchState::Idle => None,
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut DispatchRecord> {
        match &mut self.state {
            DispatchState::InDispatch(record) => Some(record),
            DispatchState::Idle => None,
        }
    }

    /// Check that a dispatch named `requested` may begin.
    pub fn check_begin(&self, requested: &str) -> Result<(), DispatchMisuse> {
        match &self.state {
            DispatchState::Idle => Ok(()),
            DispatchState::InDispatch(open) => Err(DispatchMisuse::BeginWhileOpen {
                open: open.shader_name.clone(),
                requested: requested.to_string(),
            }),
        }
    }

    /// Open `record`. Leaves an already open record untouched on misuse.
    pub fn begin(&mut self, record: DispatchRecord) -> Result<(), DispatchMisuse> {
        self.check_begin(&record.shader_name)?;
        self.state = DispatchState::InDispatch(record);
        Ok(())
    }

    /// Close the open record and move it into history.
    pub fn end(&mut self, gpu_end: Option<SlotRef>) -> Result<&DispatchRecord, DispatchMisuse> {
        let DispatchState::InDispatch(mut record) = std::mem::take(&mut self.state) else {
            return Err(DispatchMisuse::EndWhileIdle);
        };

        record.end = Some(Instant::now());
        record.gpu_end = gpu_end;

        if self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);

        Ok(&self.history[self.history.len() - 1])
    }

    pub fn history(&self) -> &VecDeque<DispatchRecord> {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut VecDeque<DispatchRecord> {
        &mut self.history
    }
}
