//! Progress events streamed to the caller during long-running operations.
//!
//! The external streaming layer passes a [`ProgressSink`] into the
//! operations facade; the core invokes it at each major state transition.
//! This callback is the only coupling between the core and that layer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Warn,
    Error,
}

/// A human-readable progress line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Human-readable text
    pub text: String,
    /// Severity level
    pub level: ProgressLevel,
}

impl ProgressEvent {
    /// Create an info-level event.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: ProgressLevel::Info,
        }
    }

    /// Create a warn-level event.
    #[must_use]
    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: ProgressLevel::Warn,
        }
    }

    /// Create an error-level event.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: ProgressLevel::Error,
        }
    }
}

/// Callback invoked with each progress event.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Optional progress sink with convenience emitters.
///
/// A `ProgressReporter` without a sink is a no-op, so callers that do not
/// stream progress pay nothing.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sink: Option<ProgressSink>,
}

impl ProgressReporter {
    /// Create a reporter wrapping the given sink.
    #[must_use]
    pub fn new(sink: ProgressSink) -> Self {
        Self { sink: Some(sink) }
    }

    /// Create a reporter that discards all events.
    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Emit an info-level line.
    pub fn info(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::info(text));
    }

    /// Emit a warn-level line.
    pub fn warn(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::warn(text));
    }

    /// Emit an error-level line.
    pub fn error(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::error(text));
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink(event);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reporter_invokes_sink() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_events = collected.clone();
        let sink: ProgressSink = Arc::new(move |event| {
            sink_events.lock().expect("lock").push(event);
        });

        let reporter = ProgressReporter::new(sink);
        reporter.info("login done");
        reporter.warn("code 538 not found");

        let events = collected.lock().expect("lock");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, ProgressLevel::Info);
        assert_eq!(events[1].level, ProgressLevel::Warn);
        assert_eq!(events[0].text, "login done");
    }

    #[test]
    fn test_disabled_reporter_is_noop() {
        let reporter = ProgressReporter::disabled();
        // Must not panic
        reporter.info("ignored");
        reporter.error("ignored");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::info("form loaded");
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"info\""));
        assert!(json.contains("form loaded"));
    }
}
