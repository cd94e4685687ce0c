//! Accumulated diagnostics.

use std::fmt;

/// How serious a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// What produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Illegal stage/access combination or malformed barrier.
    BarrierValidation,
    /// Unsynchronized access pattern. Advisory.
    Hazard,
    /// `begin_dispatch`/`end_dispatch` called out of order.
    DispatchState,
    /// Null shader module or pipeline handle.
    ObjectValidation,
    /// Timestamp query pool trouble.
    Timestamp,
}

impl MessageKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::BarrierValidation => "barrier",
            Self::Hazard => "hazard",
            Self::DispatchState => "dispatch",
            Self::ObjectValidation => "object",
            Self::Timestamp => "timestamp",
        }
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage {
    pub severity: Severity,
    pub kind: MessageKind,
    pub text: String,
}

impl fmt::Display for DebugMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.name(), self.text)
    }
}

/// Errors and warnings in the order they were raised.
#[derive(Debug, Default)]
pub(crate) struct MessageLog {
    errors: Vec<DebugMessage>,
    warnings: Vec<DebugMessage>,
}

impl MessageLog {
    pub fn error(&mut self, kind: MessageKind, text: impl Into<String>) {
        let message = DebugMessage {
            severity: Severity::Error,
            kind,
            text: text.into(),
        };
        tracing::error!("{message}");
        self.errors.push(message);
    }

    pub fn warning(&mut self, kind: MessageKind, text: impl Into<String>) {
        let message = DebugMessage {
            severity: Severity::Warning,
            kind,
            text: text.into(),
        };
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn errors(&self) -> &[DebugMessage] {
        &self.errors
    }

    pub fn warnings(&self) -> &[DebugMessage] {
        &self.warnings
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_order_per_severity() {
        let mut log = MessageLog::default();
        log.error(MessageKind::DispatchState, "first");
        log.warning(MessageKind::Hazard, "careful");
        log.error(MessageKind::BarrierValidation, "second");

        let errors: Vec<_> = log.errors().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(errors, ["first", "second"]);
        assert_eq!(log.warnings().len(), 1);
        assert_eq!(log.warnings()[0].severity, Severity::Warning);
    }

    #[test]
    fn clear_empties_both_lists() {
        let mut log = MessageLog::default();
        log.error(MessageKind::Timestamp, "pool");
        log.warning(MessageKind::Hazard, "raw");
        log.clear();
        assert!(log.errors().is_empty());
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn display_includes_kind() {
        let message = DebugMessage {
            severity: Severity::Error,
            kind: MessageKind::BarrierValidation,
            text: "bad".to_string(),
        };
        assert_eq!(message.to_string(), "[barrier] bad");
    }
}
