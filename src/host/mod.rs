//! Lifecycle controller
//!
//! [`ModHost`] composes the registry, definition pools, and collaborator
//! traits, and owns the external surface: add a mod, run the full pipeline,
//! run a subset, shut down one mod / a set / everything. Registry mutation,
//! order computation, and phase execution all happen under one async mutex,
//! so a pipeline run can never interleave with an add or remove.

pub mod hooks;

pub use hooks::{HookList, ModEvent, ModEventKind};

use crate::catalog::{CatalogIndex, PackageIndex};
use crate::config::{ConfigStore, HostConfig, NullConfigStore};
use crate::defs::{DefinitionPool, DefinitionSource, FileDefinitionSource};
use crate::discovery::{DirectoryScanner, ModScanner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::modlog::{HostLog, TracingSink};
use crate::mods::{Mod, PatchContext, PatchStage};
use crate::pipeline::{Orchestrator, PipelineContext, PipelineReport};
use crate::provider::{InertPatchProvider, PatchProvider};
use crate::registry::{ModRegistry, RegistryError};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Fire add-hooks, insert into the registry, and register with the package
/// index. Returns false when a hook canceled the add.
pub(crate) fn admit_mod(
    registry: &mut ModRegistry,
    index: &dyn PackageIndex,
    hooks: &HookList,
    m: Mod,
) -> Result<bool, RegistryError> {
    if registry.contains(&m.id) {
        return Err(RegistryError::DuplicateId(m.id.clone()));
    }

    let canceled = hooks.fire(&ModEvent {
        kind: ModEventKind::Adding,
        subject: &m,
    });
    if canceled {
        return Ok(false);
    }

    let id = m.id.clone();
    let version = m.version.clone();
    registry.insert(m)?;
    index.register(&id, version.as_deref());
    info!(mod_id = %id, "Mod added");
    Ok(true)
}

struct HostState {
    registry: ModRegistry,
    /// Cached outcome of the first full shutdown
    shutdown_result: Option<bool>,
}

/// The lifecycle controller
pub struct ModHost {
    config: HostConfig,
    state: Mutex<HostState>,
    index: Arc<dyn PackageIndex>,
    provider: Arc<dyn PatchProvider>,
    scanner: Arc<dyn ModScanner>,
    store: Arc<dyn ConfigStore>,
    fs: Arc<dyn FileSystem>,
    hooks: HookList,
    log: HostLog,
    host_pool: Arc<DefinitionPool>,
    mod_pool: Arc<DefinitionPool>,
    integration_root: Option<PathBuf>,
    mods_root: Option<PathBuf>,
}

impl ModHost {
    pub fn builder(config: HostConfig) -> ModHostBuilder {
        ModHostBuilder::new(config)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn log(&self) -> &HostLog {
        &self.log
    }

    /// Hook list for add/remove interception
    pub fn hooks(&self) -> &HookList {
        &self.hooks
    }

    /// The pool patch units resolve against (mod-supplied definitions with
    /// host fallback)
    pub fn definition_pool(&self) -> &Arc<DefinitionPool> {
        &self.mod_pool
    }

    /// The pool backed by the host's own code
    pub fn host_pool(&self) -> &Arc<DefinitionPool> {
        &self.host_pool
    }

    /// Add an already-built mod. Returns false when an add-hook canceled it.
    pub async fn add_mod(&self, m: Mod) -> Result<bool> {
        let mut state = self.state.lock().await;
        admit_mod(&mut state.registry, &*self.index, &self.hooks, m)
            .context("Failed to add mod")
    }

    /// Ids of all registered mods in registry order
    pub async fn mod_ids(&self) -> Vec<String> {
        self.state.lock().await.registry.ids()
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.state.lock().await.registry.contains(id)
    }

    /// Run the full nine-step pipeline: discovery, early patches per tier,
    /// definition materialization, main patches per tier.
    pub async fn run_pipeline(&self) -> Result<PipelineReport> {
        let mut state = self.state.lock().await;
        let mut context = self.pipeline_context(&mut state.registry);

        Orchestrator::new().execute(&mut context).await?;
        Ok(context.report)
    }

    /// Drive an explicit set of registered mods through load→run for both
    /// stages (for mods added after startup).
    pub async fn run_mods(&self, mod_ids: Vec<String>) -> Result<PipelineReport> {
        let mut state = self.state.lock().await;
        let mut context = self.pipeline_context(&mut state.registry);

        Orchestrator::new().execute_subset(&mut context, mod_ids).await?;
        Ok(context.report)
    }

    /// Shut one mod down and remove it from the registry. Returns true when
    /// every teardown step succeeded (or the mod was already gone).
    pub async fn shutdown_mod(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        match self.teardown_mod(&mut state, id, true).await {
            TeardownOutcome::Done(ok) => ok,
            TeardownOutcome::Vetoed => {
                warn!(mod_id = %id, "Mod removal canceled by hook");
                true
            }
        }
    }

    /// Shut down a set of mods, visiting them in reverse registry order.
    /// Failures aggregate; every teardown is attempted.
    pub async fn shutdown_mods(&self, ids: &[String]) -> bool {
        let mut state = self.state.lock().await;

        let ordered: Vec<String> = state
            .registry
            .ids()
            .into_iter()
            .rev()
            .filter(|id| ids.contains(id))
            .collect();

        let mut ok = true;
        for id in &ordered {
            match self.teardown_mod(&mut state, id, true).await {
                TeardownOutcome::Done(success) => ok &= success,
                TeardownOutcome::Vetoed => {
                    warn!(mod_id = %id, "Mod removal canceled by hook");
                }
            }
        }
        ok
    }

    /// Shut everything down in the exact reverse of registry (run) order,
    /// then persist configuration. Idempotent: a second call does no work
    /// and returns the first result.
    pub async fn shutdown_all(&self) -> bool {
        let mut state = self.state.lock().await;

        if let Some(previous) = state.shutdown_result {
            warn!("Shutdown already performed, returning cached result");
            return previous;
        }

        info!(mods = state.registry.len(), "Shutting down all mods");

        let reversed: Vec<String> = state.registry.ids().into_iter().rev().collect();
        let mut ok = true;
        for id in &reversed {
            // cancellation does not apply here: full shutdown always proceeds
            match self.teardown_mod(&mut state, id, false).await {
                TeardownOutcome::Done(success) => ok &= success,
                TeardownOutcome::Vetoed => unreachable!("veto is disabled for full shutdown"),
            }
        }

        if let Err(err) = self.store.save() {
            error!(error = %err, "Failed to persist configuration during shutdown");
            ok = false;
        }

        state.shutdown_result = Some(ok);
        info!(clean = ok, "Shutdown complete");
        let count = reversed.len();
        self.log
            .info("host", move || format!("shut down {} mods", count));
        ok
    }

    fn pipeline_context<'a>(&'a self, registry: &'a mut ModRegistry) -> PipelineContext<'a> {
        PipelineContext {
            registry,
            index: &*self.index,
            provider: &*self.provider,
            scanner: &*self.scanner,
            hooks: &self.hooks,
            fs: self.fs.clone(),
            host_pool: self.host_pool.clone(),
            mod_pool: self.mod_pool.clone(),
            log: self.log.clone(),
            integration_root: self.integration_root.clone(),
            mods_root: self.mods_root.clone(),
            report: PipelineReport::new(),
        }
    }

    fn patch_context(&self, mod_id: &str) -> PatchContext {
        PatchContext {
            mod_id: mod_id.to_string(),
            defs: self.mod_pool.clone(),
            log: self.log.clone(),
        }
    }

    /// Tear down one mod: main units in reverse, early units in reverse, the
    /// mod's own teardown, then removal. Failures are logged and aggregated,
    /// never short-circuiting the remaining steps.
    async fn teardown_mod(
        &self,
        state: &mut HostState,
        id: &str,
        honor_veto: bool,
    ) -> TeardownOutcome {
        if !state.registry.contains(id) {
            warn!(mod_id = %id, "Mod already shut down or never registered");
            return TeardownOutcome::Done(true);
        }

        let vetoed = {
            let m = state.registry.get(id).expect("presence checked above");
            self.hooks.fire(&ModEvent {
                kind: ModEventKind::Removing,
                subject: m,
            })
        };
        if vetoed {
            if honor_veto {
                return TeardownOutcome::Vetoed;
            }
            debug!(mod_id = %id, "Removal veto ignored during full shutdown");
        }

        let patch_ctx = self.patch_context(id);
        let mut ok = true;

        let m = state.registry.get_mut(id).expect("presence checked above");
        for stage in [PatchStage::Main, PatchStage::Early] {
            for unit in m.units_mut(stage).iter_mut().rev() {
                if let Err(err) = unit.shutdown(&patch_ctx).await {
                    error!(
                        mod_id = %id,
                        unit = %unit.id,
                        stage = stage.as_str(),
                        error = %err,
                        "Patch unit failed to shut down"
                    );
                    ok = false;
                }
            }
        }

        if let Err(err) = self.provider.mod_teardown(id) {
            error!(mod_id = %id, error = %err, "Mod teardown failed");
            ok = false;
        }

        self.index.unregister(id);
        state.registry.remove(id);
        info!(mod_id = %id, clean = ok, "Mod shut down");

        TeardownOutcome::Done(ok)
    }
}

enum TeardownOutcome {
    Done(bool),
    Vetoed,
}

/// Builder for [`ModHost`]; every collaborator has a default so the minimal
/// embedding is just roots plus definition locations.
pub struct ModHostBuilder {
    config: HostConfig,
    integration_root: Option<PathBuf>,
    mods_root: Option<PathBuf>,
    host_def_locations: Vec<PathBuf>,
    mod_def_locations: Vec<PathBuf>,
    fs: Option<Arc<dyn FileSystem>>,
    scanner: Option<Arc<dyn ModScanner>>,
    provider: Option<Arc<dyn PatchProvider>>,
    index: Option<Arc<dyn PackageIndex>>,
    store: Option<Arc<dyn ConfigStore>>,
    source: Option<Arc<dyn DefinitionSource>>,
    log: Option<HostLog>,
}

impl ModHostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            integration_root: None,
            mods_root: None,
            host_def_locations: Vec::new(),
            mod_def_locations: Vec::new(),
            fs: None,
            scanner: None,
            provider: None,
            index: None,
            store: None,
            source: None,
            log: None,
        }
    }

    /// Root location of integration-tier (host-bundled) mod artifacts
    pub fn integration_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.integration_root = Some(root.into());
        self
    }

    /// Root location of regular mod artifacts
    pub fn mods_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.mods_root = Some(root.into());
        self
    }

    /// Search locations of the host's own definition artifacts
    pub fn host_definitions(mut self, locations: Vec<PathBuf>) -> Self {
        self.host_def_locations = locations;
        self
    }

    /// Search locations of mod-supplied definition artifacts
    pub fn mod_definitions(mut self, locations: Vec<PathBuf>) -> Self {
        self.mod_def_locations = locations;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn ModScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn PatchProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn PackageIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_definition_source(mut self, source: Arc<dyn DefinitionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_log(mut self, log: HostLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Result<ModHost> {
        self.config.validate().context("Invalid host configuration")?;

        let fs = self
            .fs
            .unwrap_or_else(|| Arc::new(RealFileSystem::new()) as Arc<dyn FileSystem>);
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(FileDefinitionSource::new(fs.clone())) as _);

        let host_pool = DefinitionPool::new(
            "host",
            self.host_def_locations,
            self.config.def_extension.clone(),
            source.clone(),
            fs.clone(),
        );
        let mod_pool = DefinitionPool::new(
            "mods",
            self.mod_def_locations,
            self.config.def_extension.clone(),
            source,
            fs.clone(),
        );
        mod_pool
            .set_fallback(host_pool.clone())
            .context("Failed to link definition pools")?;

        let scanner = self
            .scanner
            .unwrap_or_else(|| Arc::new(DirectoryScanner::from_config(&self.config)) as _);

        Ok(ModHost {
            state: Mutex::new(HostState {
                registry: ModRegistry::new(),
                shutdown_result: None,
            }),
            index: self.index.unwrap_or_else(|| Arc::new(CatalogIndex::new()) as _),
            provider: self
                .provider
                .unwrap_or_else(|| Arc::new(InertPatchProvider) as _),
            scanner,
            store: self.store.unwrap_or_else(|| Arc::new(NullConfigStore) as _),
            fs,
            hooks: HookList::new(),
            log: self
                .log
                .unwrap_or_else(|| HostLog::with_sink(Arc::new(TracingSink))),
            host_pool,
            mod_pool,
            integration_root: self.integration_root,
            mods_root: self.mods_root,
            config: self.config,
        })
    }
}

