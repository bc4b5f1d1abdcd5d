//! Mod and patch unit model
//!
//! A [`Mod`] is built from a parsed manifest plus patch behaviors resolved by
//! the [`crate::provider::PatchProvider`]. Patch units track their own
//! lifecycle state so load/run/shutdown are idempotent: running twice never
//! double-applies, and shutdown reverses exactly what was applied.

use crate::defs::DefinitionPool;
use crate::manifest::{DependencyDecl, ModManifest, ModTier, PatchDecl};
use crate::modlog::HostLog;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Early units run before the host's own code is activated, main units after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchStage {
    Early,
    Main,
}

impl PatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStage::Early => "early",
            PatchStage::Main => "main",
        }
    }
}

/// Lifecycle of a single patch unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Declared,
    Loaded,
    Applied,
    Shut,
}

/// What a patch unit sees while executing. Handles are passed explicitly;
/// there is no ambient "current host" lookup.
pub struct PatchContext {
    pub mod_id: String,
    pub defs: Arc<DefinitionPool>,
    pub log: HostLog,
}

/// Behavior of one patch unit. The code-rewriting machinery itself lives
/// behind this trait; the engine only sequences it.
#[async_trait]
pub trait Patch: Send + Sync {
    async fn load(&self, ctx: &PatchContext) -> anyhow::Result<()>;
    async fn run(&self, ctx: &PatchContext) -> anyhow::Result<()>;
    async fn shutdown(&self, ctx: &PatchContext) -> anyhow::Result<()>;
}

/// A declared patch unit bound to its behavior
pub struct PatchUnit {
    pub id: String,
    pub stage: PatchStage,
    /// Intra-mod ordering key; lower runs first
    pub order: u32,
    pub state: PatchState,
    behavior: Arc<dyn Patch>,
}

impl PatchUnit {
    pub fn new(decl: &PatchDecl, stage: PatchStage, behavior: Arc<dyn Patch>) -> Self {
        Self {
            id: decl.id.clone(),
            stage,
            order: decl.order,
            state: PatchState::Declared,
            behavior,
        }
    }

    /// Load the unit. A second call is a no-op.
    pub async fn load(&mut self, ctx: &PatchContext) -> anyhow::Result<()> {
        if self.state != PatchState::Declared {
            debug!(mod_id = %ctx.mod_id, unit = %self.id, "Patch unit already loaded, skipping");
            return Ok(());
        }
        self.behavior.load(ctx).await?;
        self.state = PatchState::Loaded;
        Ok(())
    }

    /// Run the unit. Running an already-applied unit is a no-op; running an
    /// unloaded unit is rejected.
    pub async fn run(&mut self, ctx: &PatchContext) -> anyhow::Result<()> {
        match self.state {
            PatchState::Applied => {
                debug!(mod_id = %ctx.mod_id, unit = %self.id, "Patch unit already applied, skipping");
                return Ok(());
            }
            PatchState::Loaded => {}
            other => {
                return Err(anyhow::anyhow!(
                    "Patch unit '{}' cannot run from state {:?}",
                    self.id,
                    other
                ));
            }
        }
        self.behavior.run(ctx).await?;
        self.state = PatchState::Applied;
        Ok(())
    }

    /// Reverse the applied effect. Only an applied unit invokes the behavior;
    /// a loaded-but-never-run unit just transitions state.
    pub async fn shutdown(&mut self, ctx: &PatchContext) -> anyhow::Result<()> {
        match self.state {
            PatchState::Applied => {
                self.behavior.shutdown(ctx).await?;
                self.state = PatchState::Shut;
                Ok(())
            }
            PatchState::Shut => {
                debug!(mod_id = %ctx.mod_id, unit = %self.id, "Patch unit already shut, skipping");
                Ok(())
            }
            _ => {
                self.state = PatchState::Shut;
                Ok(())
            }
        }
    }
}

/// An active mod in the registry
pub struct Mod {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub tier: ModTier,
    /// Artifact directory the mod was discovered at
    pub path: PathBuf,
    pub dependencies: Vec<DependencyDecl>,
    pub conflicts: Vec<String>,
    pub early_units: Vec<PatchUnit>,
    pub main_units: Vec<PatchUnit>,

    /// Whether every hard dependency is present and itself resolved
    pub dependencies_satisfied: bool,
    /// Set when the mod participates in a dependency cycle
    pub cycle_member: bool,
    /// Position in the registry's total order
    pub order_key: usize,
    /// Why resolution failed, rendered for reporting
    pub resolution_issue: Option<String>,
    /// A resolution failure is reported once, then demoted to debug
    pub resolution_reported: bool,
    /// Stages whose load step failed; excluded from that stage's run step
    early_load_failed: bool,
    main_load_failed: bool,

    pub added_at: chrono::DateTime<chrono::Utc>,
}

impl Mod {
    /// Build a mod from its manifest and resolved patch behaviors. Unit
    /// declarations keep manifest order, stably sorted by their order key.
    pub fn from_manifest(
        manifest: &ModManifest,
        path: PathBuf,
        early_behaviors: Vec<Arc<dyn Patch>>,
        main_behaviors: Vec<Arc<dyn Patch>>,
    ) -> Self {
        debug_assert_eq!(manifest.early_patches.len(), early_behaviors.len());
        debug_assert_eq!(manifest.main_patches.len(), main_behaviors.len());

        let mut early_units: Vec<PatchUnit> = manifest
            .early_patches
            .iter()
            .zip(early_behaviors)
            .map(|(decl, behavior)| PatchUnit::new(decl, PatchStage::Early, behavior))
            .collect();
        let mut main_units: Vec<PatchUnit> = manifest
            .main_patches
            .iter()
            .zip(main_behaviors)
            .map(|(decl, behavior)| PatchUnit::new(decl, PatchStage::Main, behavior))
            .collect();

        early_units.sort_by_key(|unit| unit.order);
        main_units.sort_by_key(|unit| unit.order);

        Self {
            id: manifest.id.clone(),
            title: manifest.title().to_string(),
            version: manifest.version.clone(),
            tier: manifest.tier,
            path,
            dependencies: manifest.dependencies.clone(),
            conflicts: manifest.conflicts.iter().map(|c| c.id.clone()).collect(),
            early_units,
            main_units,
            dependencies_satisfied: false,
            cycle_member: false,
            order_key: 0,
            resolution_issue: None,
            resolution_reported: false,
            early_load_failed: false,
            main_load_failed: false,
            added_at: chrono::Utc::now(),
        }
    }

    /// Ids of hard dependencies only
    pub fn required_dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|dep| dep.required)
            .map(|dep| dep.id.as_str())
    }

    /// Ids of all declared dependencies, hard and optional; both constrain
    /// ordering
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|dep| dep.id.as_str())
    }

    pub fn units_mut(&mut self, stage: PatchStage) -> &mut Vec<PatchUnit> {
        match stage {
            PatchStage::Early => &mut self.early_units,
            PatchStage::Main => &mut self.main_units,
        }
    }

    pub fn units(&self, stage: PatchStage) -> &[PatchUnit] {
        match stage {
            PatchStage::Early => &self.early_units,
            PatchStage::Main => &self.main_units,
        }
    }

    pub fn stage_load_failed(&self, stage: PatchStage) -> bool {
        match stage {
            PatchStage::Early => self.early_load_failed,
            PatchStage::Main => self.main_load_failed,
        }
    }

    pub fn mark_stage_load_failed(&mut self, stage: PatchStage) {
        match stage {
            PatchStage::Early => self.early_load_failed = true,
            PatchStage::Main => self.main_load_failed = true,
        }
    }

    /// Whether the mod participates in load/run phases at all
    pub fn runnable(&self) -> bool {
        self.dependencies_satisfied && !self.cycle_member
    }
}
