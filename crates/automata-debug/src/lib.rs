//! Compute dispatch instrumentation for the automata simulator.
//!
//! [`ComputeDebugger`] sits beside the engine's command recording and offers:
//! - resource tracking for buffers and images
//! - dispatch bracketing with host timings and optional GPU timestamps
//! - barrier legality checks and best-effort hazard detection
//! - debug labels for external frame-capture tools
//! - statistics, text reports and a dump file
//!
//! Diagnostics are collected as [`DebugMessage`]s instead of being returned as
//! errors, so instrumentation never aborts the simulation it observes.
//! [`ComputeDebugger::set_enabled`] turns every hook into a no-op without
//! touching call sites.
//!
//! # Usage
//!
//! ```ignore
//! let context = GraphicsContext::new()?;
//! let memory = DeviceMemoryManager::new(&context)?;
//! let mut debugger = ComputeDebugger::new(&context, &memory);
//!
//! debugger.track_buffer(grid.buffer, grid.size, "grid");
//! debugger.begin_dispatch_timed(cmd, "step", 8, 8, 8);
//! // ... record the dispatch
//! debugger.end_dispatch_timed(cmd);
//! ```

pub mod barrier;
mod config;
mod debugger;
mod dispatch;
mod error;
pub mod hazard;
mod labels;
mod message;
mod report;
mod resources;
mod stats;
mod timestamps;

pub use barrier::BarrierIssue;
pub use config::DebuggerConfig;
pub use debugger::ComputeDebugger;
pub use dispatch::DispatchRecord;
pub use error::{DebugError, Result};
pub use hazard::{Hazard, HazardKind};
pub use labels::DebuggerCapabilities;
pub use message::{DebugMessage, MessageKind, Severity};
pub use resources::{format_texel_size, ResourceKind, TrackedResource};
pub use stats::{DebugStatistics, ShaderStats};
pub use timestamps::{SlotRef, TimestampRing, TimestampSlot, TimestampTimings};
