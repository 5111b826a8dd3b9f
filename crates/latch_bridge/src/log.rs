//! Native logging channel
//!
//! Every record goes out as a `tracing` event under `latch::native` and is
//! kept in a bounded buffer so tools and tests can inspect what scripts and
//! the dispatcher reported.

use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_RETAINED_RECORDS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub frame: u64,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

#[derive(Debug)]
pub struct NativeLog {
    records: VecDeque<LogRecord>,
    capacity: usize,
}

impl Default for NativeLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETAINED_RECORDS)
    }
}

impl NativeLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn write(&mut self, frame: u64, level: LogLevel, source: &str, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Trace => tracing::trace!(target: "latch::native", frame, source, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "latch::native", frame, source, "{message}"),
            LogLevel::Info => tracing::info!(target: "latch::native", frame, source, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "latch::native", frame, source, "{message}"),
            LogLevel::Error => tracing::error!(target: "latch::native", frame, source, "{message}"),
        }

        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(LogRecord {
            frame,
            level,
            source: source.to_string(),
            message,
        });
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    pub fn at_level(&self, level: LogLevel) -> impl Iterator<Item = &LogRecord> {
        self.records.iter().filter(move |r| r.level == level)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_records_are_evicted() {
        let mut log = NativeLog::with_capacity(2);
        log.write(1, LogLevel::Info, "a", "one");
        log.write(2, LogLevel::Warn, "b", "two");
        log.write(3, LogLevel::Error, "c", "three");
        let messages: Vec<_> = log.records().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["two", "three"]);
        assert_eq!(log.at_level(LogLevel::Error).count(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = NativeLog::with_capacity(0);
        log.write(1, LogLevel::Info, "a", "dropped");
        assert!(log.is_empty());
    }
}
