//! Log sink trait and the tracing-backed default

use tracing::{debug, error, info, trace, warn};

/// Severity of a routed log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// A rendered log message handed to a sink
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Originating mod id, or "host" for engine-emitted messages
    pub source: String,
    pub message: String,
}

/// Transport for routed log messages
pub trait LogSink: Send + Sync {
    /// Called for every record that passes the router's level filter
    fn write(&self, record: &LogRecord);
}

/// Sink that discards all records
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl LogSink for NoOpSink {
    fn write(&self, _record: &LogRecord) {
        // Intentionally empty
    }
}

/// Sink that forwards records into the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        match record.level {
            LogLevel::Trace => trace!(source = %record.source, "{}", record.message),
            LogLevel::Debug => debug!(source = %record.source, "{}", record.message),
            LogLevel::Info => info!(source = %record.source, "{}", record.message),
            LogLevel::Warn => warn!(source = %record.source, "{}", record.message),
            LogLevel::Error => error!(source = %record.source, "{}", record.message),
        }
    }
}
