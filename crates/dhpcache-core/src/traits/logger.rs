//! Logger capability injected into every cache component.
//!
//! Components never reach for a process-wide logger. They receive an
//! `Arc<dyn CacheLogger>` at construction; callers that do not care get a
//! [`TracingLogger`].

use std::fmt;

use uuid::Uuid;

/// Leveled message sink.
pub trait CacheLogger: Send + Sync + fmt::Debug + 'static {
    /// Log an informational message.
    fn info(&self, message: &str);

    /// Log a warning.
    fn warn(&self, message: &str);

    /// Log an error.
    fn error(&self, message: &str);
}

/// Logger that forwards to `tracing`, tagging every event with the
/// component name and a per-instance correlation id.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    name: String,
    correlation_id: Uuid,
}

impl TracingLogger {
    /// Create a logger for the named component with a fresh correlation id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Derive a logger for a sub-component sharing this correlation id.
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            correlation_id: self.correlation_id,
        }
    }

    /// The component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The correlation id attached to every event.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("dhpcache")
    }
}

impl CacheLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(name = %self.name, correlation_id = %self.correlation_id, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(name = %self.name, correlation_id = %self.correlation_id, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(name = %self.name, correlation_id = %self.correlation_id, "{message}");
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl CacheLogger for NoopLogger {
    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
