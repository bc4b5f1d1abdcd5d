//! Mod-facing log routing
//!
//! Mods and engine phases emit leveled, lazily-rendered messages through a
//! [`HostLog`]. The actual transport is a pluggable [`LogSink`]; until one
//! attaches, messages queue in memory and flush on attach. Replacing the sink
//! at runtime flushes anything still queued into the new sink first, so no
//! message is dropped across the swap.

mod router;
mod sink;

pub use router::HostLog;
pub use sink::{LogLevel, LogRecord, LogSink, NoOpSink, TracingSink};
