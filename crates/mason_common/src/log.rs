//! Leveled logging sink handed to the orchestration layer by the host.
//!
//! The core never inspects how the host configures logging. It only forwards
//! leveled messages to whatever [`LogSink`] it was given.

use parking_lot::Mutex;

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Detailed progress information.
    Debug,
    /// Normal progress information.
    Info,
    /// Something unexpected that does not fail the step.
    Warn,
    /// A failure.
    Error,
}

/// Destination for leveled log messages.
pub trait LogSink: Send + Sync {
    /// Records a message at the given level.
    fn log(&self, level: LogLevel, message: &str);

    /// Records a debug message.
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Records an info message.
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Records a warning.
    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Records an error.
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Forwards messages to the `tracing` dispatcher under the `mason` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "mason", "{message}"),
            LogLevel::Info => tracing::info!(target: "mason", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "mason", "{message}"),
            LogLevel::Error => tracing::error!(target: "mason", "{message}"),
        }
    }
}

/// Records messages in memory. Useful for hosts that batch output and for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded message in order.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().clone()
    }

    /// Returns the messages recorded at `level`.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.info("generating 3 files");
        sink.error("View.fxml:3: bad attribute");
        sink.debug("done");
        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], (LogLevel::Info, "generating 3 files".to_string()));
        assert_eq!(records[2].0, LogLevel::Debug);
    }

    #[test]
    fn messages_at_filters_level() {
        let sink = MemorySink::new();
        sink.warn("a");
        sink.info("b");
        sink.warn("c");
        assert_eq!(sink.messages_at(LogLevel::Warn), vec!["a", "c"]);
    }

    #[test]
    fn tracing_sink_accepts_all_levels() {
        let sink = TracingSink;
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            sink.log(level, "message without a subscriber");
        }
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
