//! Debugger configuration.

/// Settings for a [`ComputeDebugger`](crate::ComputeDebugger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig {
    /// Start with instrumentation enabled.
    pub enabled: bool,
    /// Number of GPU timestamp slots in the ring.
    pub timestamp_capacity: u32,
    /// Completed dispatches kept in history before the oldest is dropped.
    pub history_limit: usize,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timestamp_capacity: 1000,
            history_limit: 1000,
        }
    }
}

impl DebuggerConfig {
    /// Start enabled or disabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the timestamp ring capacity. Zero is raised to one.
    pub fn with_timestamp_capacity(mut self, capacity: u32) -> Self {
        self.timestamp_capacity = capacity.max(1);
        self
    }

    /// Set how many completed dispatches are kept. Zero is raised to one.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }
}
