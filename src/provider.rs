//! Patch behavior resolution
//!
//! Manifests declare patch units by id; a [`PatchProvider`] maps those
//! declarations to executable behaviors. The default provider hands out inert
//! behaviors so the engine can be driven without a code-rewriting backend
//! attached.

use crate::manifest::PatchDecl;
use crate::mods::{Patch, PatchContext, PatchStage};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Resolves declared patch units to behaviors and owns mod-level runtime
/// resources.
pub trait PatchProvider: Send + Sync {
    fn resolve(
        &self,
        mod_id: &str,
        decl: &PatchDecl,
        stage: PatchStage,
    ) -> anyhow::Result<Arc<dyn Patch>>;

    /// Called once per mod during teardown, after its units shut down
    fn mod_teardown(&self, _mod_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A patch that does nothing in every lifecycle step
pub struct InertPatch;

#[async_trait]
impl Patch for InertPatch {
    async fn load(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn shutdown(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Default provider: every declaration resolves to an [`InertPatch`]
#[derive(Default)]
pub struct InertPatchProvider;

impl PatchProvider for InertPatchProvider {
    fn resolve(
        &self,
        _mod_id: &str,
        _decl: &PatchDecl,
        _stage: PatchStage,
    ) -> anyhow::Result<Arc<dyn Patch>> {
        Ok(Arc::new(InertPatch))
    }
}

/// Test provider: resolves recording behaviors that append
/// `"<mod>/<unit>:<step>"` entries to a shared journal, with configurable
/// per-unit failures. Failure flags are consulted when a step executes, so a
/// test may script them after resolution has already happened.
pub struct RecordingProvider {
    journal: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashSet<String>>>,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Make `"<mod>/<unit>"` fail its load step
    pub fn fail_load(&self, key: &str) {
        self.failures.lock().unwrap().insert(format!("{}:load", key));
    }

    /// Make `"<mod>/<unit>"` fail its run step
    pub fn fail_run(&self, key: &str) {
        self.failures.lock().unwrap().insert(format!("{}:run", key));
    }

    /// Make `"<mod>/<unit>"` fail its shutdown step
    pub fn fail_shutdown(&self, key: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{}:shutdown", key));
    }

    /// Everything recorded so far, in execution order
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Journal entries matching one lifecycle step, e.g. `"run"`
    pub fn entries_for_step(&self, step: &str) -> Vec<String> {
        let suffix = format!(":{}", step);
        self.journal()
            .into_iter()
            .filter(|entry| entry.ends_with(&suffix))
            .collect()
    }
}

struct RecordingPatch {
    key: String,
    journal: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashSet<String>>>,
}

impl RecordingPatch {
    fn step(&self, step: &str) -> anyhow::Result<()> {
        let entry = format!("{}:{}", self.key, step);
        if self.failures.lock().unwrap().contains(&entry) {
            return Err(anyhow::anyhow!("scripted {} failure for {}", step, self.key));
        }
        self.journal.lock().unwrap().push(entry);
        Ok(())
    }
}

#[async_trait]
impl Patch for RecordingPatch {
    async fn load(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        self.step("load")
    }

    async fn run(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        self.step("run")
    }

    async fn shutdown(&self, _ctx: &PatchContext) -> anyhow::Result<()> {
        self.step("shutdown")
    }
}

impl PatchProvider for RecordingProvider {
    fn resolve(
        &self,
        mod_id: &str,
        decl: &PatchDecl,
        _stage: PatchStage,
    ) -> anyhow::Result<Arc<dyn Patch>> {
        Ok(Arc::new(RecordingPatch {
            key: format!("{}/{}", mod_id, decl.id),
            journal: self.journal.clone(),
            failures: self.failures.clone(),
        }))
    }

    fn mod_teardown(&self, mod_id: &str) -> anyhow::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:teardown", mod_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{DefinitionPool, MemoryDefinitionSource};
    use crate::fs::MockFileSystem;
    use crate::modlog::HostLog;

    fn test_ctx() -> PatchContext {
        PatchContext {
            mod_id: "base".to_string(),
            defs: DefinitionPool::new(
                "test",
                vec![],
                "gdef",
                Arc::new(MemoryDefinitionSource::new()),
                Arc::new(MockFileSystem::new()),
            ),
            log: HostLog::detached(),
        }
    }

    fn decl(id: &str) -> PatchDecl {
        PatchDecl {
            id: id.to_string(),
            order: 0,
        }
    }

    #[tokio::test]
    async fn test_recording_provider_journals_steps() {
        let provider = RecordingProvider::new();
        let patch = provider
            .resolve("base", &decl("hook"), PatchStage::Early)
            .unwrap();

        let ctx = test_ctx();
        patch.load(&ctx).await.unwrap();
        patch.run(&ctx).await.unwrap();
        patch.shutdown(&ctx).await.unwrap();

        assert_eq!(
            provider.journal(),
            vec!["base/hook:load", "base/hook:run", "base/hook:shutdown"]
        );
        assert_eq!(provider.entries_for_step("run"), vec!["base/hook:run"]);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let provider = RecordingProvider::new();
        provider.fail_run("base/hook");

        let patch = provider
            .resolve("base", &decl("hook"), PatchStage::Main)
            .unwrap();
        let ctx = test_ctx();

        patch.load(&ctx).await.unwrap();
        assert!(patch.run(&ctx).await.is_err());
        assert_eq!(provider.journal(), vec!["base/hook:load"]);
    }

    #[tokio::test]
    async fn test_inert_provider() {
        let provider = InertPatchProvider;
        let patch = provider
            .resolve("base", &decl("hook"), PatchStage::Early)
            .unwrap();
        let ctx = test_ctx();

        patch.load(&ctx).await.unwrap();
        patch.run(&ctx).await.unwrap();
        patch.shutdown(&ctx).await.unwrap();
    }

    #[test]
    fn test_mod_teardown_recorded() {
        let provider = RecordingProvider::new();
        provider.mod_teardown("base").unwrap();
        assert_eq!(provider.journal(), vec!["base:teardown"]);
    }
}
