//! Integration tests for shutdown ordering, idempotence, and aggregation

mod support;

use graftbox::config::ConfigStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{build_mod, host_with_mods};

const MOD_A: &str = r#"
id = "a"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

const MOD_B_DEP_A: &str = r#"
id = "b"

[[dependency]]
id = "a"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

const MOD_C_DEP_B: &str = r#"
id = "c"

[[dependency]]
id = "b"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

#[tokio::test]
async fn test_shutdown_is_exact_reverse_of_run_order() {
    let setup = host_with_mods(&[MOD_A, MOD_B_DEP_A, MOD_C_DEP_B]);
    setup.host.run_pipeline().await.unwrap();

    let before = setup.provider.journal().len();
    assert!(setup.host.shutdown_all().await);

    let journal = setup.provider.journal();
    let teardown = &journal[before..];

    // run order was [a, b, c]; shutdown visits [c, b, a], main units before
    // early units within each mod
    assert_eq!(
        teardown,
        &[
            "c/m:shutdown",
            "c/e:shutdown",
            "c:teardown",
            "b/m:shutdown",
            "b/e:shutdown",
            "b:teardown",
            "a/m:shutdown",
            "a/e:shutdown",
            "a:teardown",
        ]
    );

    assert!(setup.host.mod_ids().await.is_empty());
}

#[tokio::test]
async fn test_second_shutdown_is_a_cached_noop() {
    let setup = host_with_mods(&[MOD_A]);
    setup.host.run_pipeline().await.unwrap();

    let first = setup.host.shutdown_all().await;
    let journal_after_first = setup.provider.journal();

    let second = setup.host.shutdown_all().await;

    assert_eq!(first, second);
    assert_eq!(setup.provider.journal(), journal_after_first);
}

#[tokio::test]
async fn test_unit_shutdown_failure_does_not_stop_remaining_teardowns() {
    let setup = host_with_mods(&[MOD_A, MOD_B_DEP_A]);
    setup.host.run_pipeline().await.unwrap();
    setup.provider.fail_shutdown("b/m");

    let clean = setup.host.shutdown_all().await;

    assert!(!clean);
    let journal = setup.provider.journal();
    // b's early unit and a's entire teardown still happened
    assert!(journal.contains(&"b/e:shutdown".to_string()));
    assert!(journal.contains(&"a/m:shutdown".to_string()));
    assert!(journal.contains(&"a:teardown".to_string()));
    assert!(setup.host.mod_ids().await.is_empty());
}

struct FailingStore;

impl ConfigStore for FailingStore {
    fn save(&self) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }
}

struct CountingStore {
    saves: AtomicUsize,
}

impl ConfigStore for CountingStore {
    fn save(&self) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_config_persist_failure_marks_shutdown_failed() {
    let fs = Arc::new(graftbox::fs::MockFileSystem::new());
    let provider = graftbox::provider::RecordingProvider::new();
    let host = graftbox::ModHost::builder(support::test_config())
        .mods_root("/mods")
        .with_fs(fs)
        .with_scanner(Arc::new(graftbox::discovery::StaticScanner::new(vec![])))
        .with_provider(provider.clone())
        .with_store(Arc::new(FailingStore))
        .build()
        .unwrap();

    host.add_mod(build_mod(MOD_A, provider.as_ref())).await.unwrap();
    host.run_mods(vec!["a".to_string()]).await.unwrap();

    // mods tear down fine; the failing store alone fails the shutdown
    let clean = host.shutdown_all().await;
    assert!(!clean);
    assert!(host.mod_ids().await.is_empty());
    assert!(provider.journal().contains(&"a:teardown".to_string()));
}

#[tokio::test]
async fn test_config_saved_exactly_once_across_repeat_shutdowns() {
    let store = Arc::new(CountingStore {
        saves: AtomicUsize::new(0),
    });
    let host = graftbox::ModHost::builder(support::test_config())
        .with_store(store.clone())
        .build()
        .unwrap();

    assert!(host.shutdown_all().await);
    assert!(host.shutdown_all().await);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_single_mod_leaves_others_running() {
    let setup = host_with_mods(&[MOD_A, MOD_B_DEP_A]);
    setup.host.run_pipeline().await.unwrap();

    assert!(setup.host.shutdown_mod("b").await);

    assert!(!setup.host.is_registered("b").await);
    assert!(setup.host.is_registered("a").await);

    let journal = setup.provider.journal();
    assert!(journal.contains(&"b:teardown".to_string()));
    assert!(!journal.contains(&"a:teardown".to_string()));
}

#[tokio::test]
async fn test_shutdown_unknown_mod_warns_and_succeeds() {
    let setup = host_with_mods(&[]);
    assert!(setup.host.shutdown_mod("never-existed").await);
}

#[tokio::test]
async fn test_shutdown_set_visits_reverse_registry_order() {
    let setup = host_with_mods(&[MOD_A, MOD_B_DEP_A, MOD_C_DEP_B]);
    setup.host.run_pipeline().await.unwrap();

    let before = setup.provider.journal().len();
    assert!(
        setup
            .host
            .shutdown_mods(&["a".to_string(), "c".to_string()])
            .await
    );

    let journal = setup.provider.journal();
    let teardown = &journal[before..];

    // c shuts down before a even though the request listed a first
    let c_pos = teardown.iter().position(|e| e == "c:teardown").unwrap();
    let a_pos = teardown.iter().position(|e| e == "a:teardown").unwrap();
    assert!(c_pos < a_pos);

    assert!(setup.host.is_registered("b").await);
}

#[tokio::test]
async fn test_remove_hook_vetoes_single_shutdown_but_not_full() {
    let setup = host_with_mods(&[MOD_A]);
    setup.host.run_pipeline().await.unwrap();

    setup.host.hooks().register(|event, canceled| {
        if event.kind == graftbox::ModEventKind::Removing {
            *canceled = true;
        }
    });

    assert!(setup.host.shutdown_mod("a").await);
    assert!(setup.host.is_registered("a").await);

    // full shutdown ignores the veto
    assert!(setup.host.shutdown_all().await);
    assert!(!setup.host.is_registered("a").await);
}
