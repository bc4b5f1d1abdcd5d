//! graftbox - mod orchestration engine for patch-based host extension
//!
//! This library loads, orders, and runs pluggable extension packages
//! ("mods") that inject patch code into a running host process, and resolves
//! the binary code-unit definitions those patches operate on before the host
//! activates its own code.
//!
//! # Core Concepts
//!
//! - **Mods**: discoverable artifact directories with a `mod.toml` manifest
//!   declaring identity, tier, dependencies, conflicts, and patch units
//! - **Phases**: a fixed nine-step pipeline (discover both tiers, load/run
//!   early patches, materialize definitions, load/run main patches), each
//!   step a barrier over its cohort
//! - **Definition pools**: concurrent resolvers for named binary definitions
//!   with duplicate-load suppression and one-hop fallback chaining
//! - **Collaborators**: discovery, package index, config persistence,
//!   definition loading, and log transport all sit behind traits
//!
//! # Example Usage
//!
//! ```ignore
//! use graftbox::{HostConfig, ModHost};
//!
//! async fn boot() -> anyhow::Result<()> {
//!     let host = ModHost::builder(HostConfig::default())
//!         .integration_root("/opt/game/packs")
//!         .mods_root("/home/player/mods")
//!         .host_definitions(vec!["/opt/game/defs".into()])
//!         .build()?;
//!
//!     let report = host.run_pipeline().await?;
//!     println!("pipeline clean: {}", report.clean());
//!
//!     let clean = host.shutdown_all().await;
//!     println!("shutdown clean: {}", clean);
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`host`]: the lifecycle controller and external surface
//! - [`pipeline`]: phase scheduling and run reports
//! - [`registry`]: the ordered mod registry and dependency ordering
//! - [`defs`]: definition pools, sources, and activation
//! - [`manifest`], [`mods`], [`provider`]: the mod data model
//! - [`catalog`], [`discovery`], [`config`], [`modlog`], [`fs`]: collaborators

pub mod catalog;
pub mod config;
pub mod defs;
pub mod discovery;
pub mod fs;
pub mod host;
pub mod manifest;
pub mod modlog;
pub mod mods;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod util;

// Re-export key types for convenient access
pub use catalog::{CatalogIndex, DependencyReport, PackageIndex};
pub use config::{ConfigError, ConfigStore, HostConfig, JsonConfigStore, NullConfigStore};
pub use defs::{ActiveDefinition, DefinitionPool, DefinitionSource, RawDefinition};
pub use discovery::{DirectoryScanner, ModScanner};
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use host::{HookList, ModEvent, ModEventKind, ModHost, ModHostBuilder};
pub use manifest::{ModManifest, ModTier};
pub use modlog::{HostLog, LogLevel, LogRecord, LogSink, TracingSink};
pub use mods::{Mod, Patch, PatchContext, PatchStage, PatchUnit};
pub use pipeline::{Orchestrator, PipelineContext, PipelineReport};
pub use provider::{InertPatchProvider, PatchProvider, RecordingProvider};
pub use registry::{ModRegistry, OrderingResult};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
