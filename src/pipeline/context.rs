//! Pipeline context: everything a phase needs, passed explicitly

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::PackageIndex;
use crate::defs::DefinitionPool;
use crate::discovery::ModScanner;
use crate::fs::FileSystem;
use crate::host::hooks::HookList;
use crate::manifest::ModTier;
use crate::modlog::HostLog;
use crate::mods::PatchContext;
use crate::provider::PatchProvider;
use crate::registry::ModRegistry;

use super::report::PipelineReport;

/// Borrowed view of the controller's state for the duration of one pipeline
/// run. Holding the registry mutably here is what serializes phase execution
/// against registry mutation.
pub struct PipelineContext<'a> {
    pub registry: &'a mut ModRegistry,
    pub index: &'a dyn PackageIndex,
    pub provider: &'a dyn PatchProvider,
    pub scanner: &'a dyn ModScanner,
    pub hooks: &'a HookList,
    pub fs: Arc<dyn FileSystem>,

    /// Pool backed by the host's own on-disk code
    pub host_pool: Arc<DefinitionPool>,
    /// Pool backed by mod-supplied code, falling back to `host_pool`
    pub mod_pool: Arc<DefinitionPool>,

    pub log: HostLog,

    /// Root location of integration-tier artifacts, if configured
    pub integration_root: Option<PathBuf>,
    /// Root location of regular-tier artifacts, if configured
    pub mods_root: Option<PathBuf>,

    pub report: PipelineReport,
}

impl<'a> PipelineContext<'a> {
    pub fn root_for(&self, tier: ModTier) -> Option<&PathBuf> {
        match tier {
            ModTier::Integration => self.integration_root.as_ref(),
            ModTier::Regular => self.mods_root.as_ref(),
        }
    }

    /// Context handed to a patch unit; owned handles, no ambient lookups
    pub fn patch_context(&self, mod_id: &str) -> PatchContext {
        PatchContext {
            mod_id: mod_id.to_string(),
            defs: self.mod_pool.clone(),
            log: self.log.clone(),
        }
    }
}
