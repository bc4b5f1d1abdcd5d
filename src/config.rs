//! Configuration for the graftbox engine
//!
//! Two concerns live here: [`HostConfig`], the engine's own tunables loaded
//! from environment variables with sensible defaults, and [`ConfigStore`],
//! the persistence collaborator the lifecycle controller invokes on shutdown.
//! The engine never inspects persisted settings; it only asks the store to
//! save them.
//!
//! # Environment Variables
//!
//! - `GRAFTBOX_LOG_LEVEL`: Logging level - default: "info"
//! - `GRAFTBOX_SCAN_MAX_DEPTH`: Max directory depth during discovery - default: "4"
//! - `GRAFTBOX_SCAN_MAX_ENTRIES`: Max artifacts considered per root - default: "512"
//! - `GRAFTBOX_DEF_EXTENSION`: Definition artifact extension - default: "gdef"

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SCAN_MAX_DEPTH: usize = 4;
const DEFAULT_SCAN_MAX_ENTRIES: usize = 512;
const DEFAULT_DEF_EXTENSION: &str = "gdef";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Engine tunables, loaded from `GRAFTBOX_*` environment variables
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum directory depth when scanning a mod root
    pub scan_max_depth: usize,

    /// Maximum number of candidate artifacts considered per root
    pub scan_max_entries: usize,

    /// File extension of binary definition artifacts
    pub def_extension: String,
}

impl Default for HostConfig {
    /// Loads from environment variables, falling back to defaults for any
    /// missing or unparsable value.
    fn default() -> Self {
        let log_level =
            env::var("GRAFTBOX_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let scan_max_depth = env::var("GRAFTBOX_SCAN_MAX_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SCAN_MAX_DEPTH);

        let scan_max_entries = env::var("GRAFTBOX_SCAN_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SCAN_MAX_ENTRIES);

        let def_extension = env::var("GRAFTBOX_DEF_EXTENSION")
            .unwrap_or_else(|_| DEFAULT_DEF_EXTENSION.to_string());

        Self {
            log_level,
            scan_max_depth,
            scan_max_entries,
            def_extension,
        }
    }
}

impl HostConfig {
    /// Validates the configuration, returning a descriptive error for any
    /// out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationFailed(format!(
                    "invalid log level '{}'",
                    other
                )))
            }
        }

        if self.scan_max_depth == 0 {
            return Err(ConfigError::ValidationFailed(
                "scan_max_depth must be at least 1".to_string(),
            ));
        }

        if self.scan_max_entries == 0 {
            return Err(ConfigError::ValidationFailed(
                "scan_max_entries must be at least 1".to_string(),
            ));
        }

        if self.def_extension.is_empty() || self.def_extension.contains('.') {
            return Err(ConfigError::ValidationFailed(format!(
                "invalid definition extension '{}'",
                self.def_extension
            )));
        }

        Ok(())
    }
}

/// Persistence collaborator. The controller calls `save` exactly once per
/// shutdown; the store owns whatever settings it persists.
pub trait ConfigStore: Send + Sync {
    fn save(&self) -> anyhow::Result<()>;
}

/// Persisted host state written by [`JsonConfigStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Ids of mods that were active at last shutdown
    pub active_mods: Vec<String>,

    /// When the state was last written
    pub saved_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Store used when the embedder wires no persistence; saving succeeds
/// without touching disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConfigStore;

impl ConfigStore for NullConfigStore {
    fn save(&self) -> anyhow::Result<()> {
        tracing::debug!("No config store attached, nothing persisted");
        Ok(())
    }
}

/// Default store: serializes a [`PersistedState`] snapshot to a JSON file
pub struct JsonConfigStore {
    path: PathBuf,
    state: RwLock<PersistedState>,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: RwLock::new(PersistedState::default()),
        }
    }

    /// Update the snapshot that the next `save` will write
    pub fn set_active_mods(&self, mods: Vec<String>) {
        self.state.write().unwrap().active_mods = mods;
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn save(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        let snapshot = {
            let mut state = self.state.write().unwrap();
            state.saved_at = Some(chrono::Utc::now());
            state.clone()
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize persisted state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        tracing::debug!(path = %self.path.display(), "Persisted host state");
        Ok(())
    }
}
