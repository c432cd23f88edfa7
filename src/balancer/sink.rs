//! Logging sink the balancer reports worker failures, retries and respawns to.

use parking_lot::Mutex;

/// Destination for the balancer's failure and trace messages.
pub trait LogSink: Send + Sync {
    fn error(&self, message: &str);

    fn debug(&self, message: &str);
}

/// Default sink, forwarding to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn error(&self, message: &str) {
        tracing::error!(target: "task_balancer", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "task_balancer", "{}", message);
    }
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Debug,
}

/// Sink that keeps every message in memory.
///
/// Useful for asserting on what the pool reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, oldest first.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Messages at `level` containing `needle`.
    pub fn count_matching(&self, level: LogLevel, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(l, msg)| *l == level && msg.contains(needle))
            .count()
    }
}

impl LogSink for MemorySink {
    fn error(&self, message: &str) {
        self.entries.lock().push((LogLevel::Error, message.to_string()));
    }

    fn debug(&self, message: &str) {
        self.entries.lock().push((LogLevel::Debug, message.to_string()));
    }
}
