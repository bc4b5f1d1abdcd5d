//! Shared helpers for integration tests

use graftbox::config::HostConfig;
use graftbox::discovery::StaticScanner;
use graftbox::fs::MockFileSystem;
use graftbox::manifest::ModManifest;
use graftbox::mods::{Mod, Patch, PatchStage};
use graftbox::provider::{PatchProvider, RecordingProvider};
use graftbox::ModHost;
use std::path::PathBuf;
use std::sync::Arc;

/// Env-independent config so tests never race on process environment
#[allow(dead_code)]
pub fn test_config() -> HostConfig {
    HostConfig {
        log_level: "info".to_string(),
        scan_max_depth: 4,
        scan_max_entries: 512,
        def_extension: "gdef".to_string(),
    }
}

/// Build a mod directly from manifest text, resolving behaviors through the
/// given provider (mirrors what the discovery phase does).
#[allow(dead_code)]
pub fn build_mod(toml: &str, provider: &dyn PatchProvider) -> Mod {
    let manifest = ModManifest::parse(toml).unwrap();

    let early: Vec<Arc<dyn Patch>> = manifest
        .early_patches
        .iter()
        .map(|decl| {
            provider
                .resolve(&manifest.id, decl, PatchStage::Early)
                .unwrap()
        })
        .collect();
    let main: Vec<Arc<dyn Patch>> = manifest
        .main_patches
        .iter()
        .map(|decl| {
            provider
                .resolve(&manifest.id, decl, PatchStage::Main)
                .unwrap()
        })
        .collect();

    let path = PathBuf::from(format!("/mods/{}", manifest.id));
    Mod::from_manifest(&manifest, path, early, main)
}

#[allow(dead_code)]
pub struct TestHost {
    pub host: ModHost,
    pub provider: Arc<RecordingProvider>,
    pub fs: Arc<MockFileSystem>,
}

/// A host whose discovery yields exactly the given manifests, with a
/// recording provider wired in.
#[allow(dead_code)]
pub fn host_with_mods(manifests: &[&str]) -> TestHost {
    let fs = Arc::new(MockFileSystem::new());
    let mut artifacts = Vec::new();

    for toml in manifests {
        let manifest = ModManifest::parse(toml).unwrap();
        let dir = PathBuf::from(format!("/mods/{}", manifest.id));
        fs.add_file(dir.join("mod.toml"), *toml);
        artifacts.push(dir);
    }

    let provider = RecordingProvider::new();
    let host = ModHost::builder(test_config())
        .integration_root("/packs")
        .mods_root("/mods")
        .with_fs(fs.clone())
        .with_scanner(Arc::new(StaticScanner::new(artifacts)))
        .with_provider(provider.clone())
        .build()
        .unwrap();

    TestHost { host, provider, fs }
}

/// Index of `entry` in the journal; panics when absent
#[allow(dead_code)]
pub fn journal_index(journal: &[String], entry: &str) -> usize {
    journal
        .iter()
        .position(|candidate| candidate == entry)
        .unwrap_or_else(|| panic!("journal entry '{}' not found in {:?}", entry, journal))
}

/// Assert that `first` appears before `second` in the journal
#[allow(dead_code)]
pub fn assert_journal_order(journal: &[String], first: &str, second: &str) {
    let a = journal_index(journal, first);
    let b = journal_index(journal, second);
    assert!(
        a < b,
        "expected '{}' before '{}' in {:?}",
        first,
        second,
        journal
    );
}
