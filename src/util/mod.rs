//! Utility modules for graftbox
//!
//! Currently holds structured logging setup for the engine's own diagnostics.

pub mod logging;

// Re-export commonly used items
pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
