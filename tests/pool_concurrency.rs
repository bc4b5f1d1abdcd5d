//! Concurrency tests for the definition pool

use graftbox::defs::{DefinitionPool, DefinitionSource, MemoryDefinitionSource, RawDefinition};
use graftbox::fs::MockFileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Wraps a source with artificial latency to widen the race window
struct SlowSource {
    inner: Arc<MemoryDefinitionSource>,
    delay: Duration,
}

impl DefinitionSource for SlowSource {
    fn load(&self, path: &Path) -> anyhow::Result<RawDefinition> {
        std::thread::sleep(self.delay);
        self.inner.load(path)
    }
}

fn slow_pool(
    defs: &[(&str, &[u8])],
    delay: Duration,
) -> (Arc<DefinitionPool>, Arc<MemoryDefinitionSource>) {
    let fs = Arc::new(MockFileSystem::new());
    let inner = Arc::new(MemoryDefinitionSource::new());
    fs.add_dir("defs");

    for (name, payload) in defs {
        let path = PathBuf::from(format!("/mock/defs/{}.gdef", name));
        fs.add_file(&path, payload);
        inner.insert(
            path.clone(),
            RawDefinition::new(*name, payload.to_vec(), path),
        );
    }

    let pool = DefinitionPool::new(
        "host",
        vec![PathBuf::from("/mock/defs")],
        "gdef",
        Arc::new(SlowSource {
            inner: inner.clone(),
            delay,
        }),
        fs,
    );
    (pool, inner)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_trigger_exactly_one_load() {
    let (pool, source) = slow_pool(&[("core", b"code")], Duration::from_millis(50));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move { pool.lookup("core").await }));
    }

    let mut fingerprints = Vec::new();
    for task in tasks {
        let def = task.await.unwrap().expect("definition should resolve");
        fingerprints.push(def.fingerprint().to_string());
    }

    // one underlying load, identical outcome for every caller
    assert_eq!(source.load_count(), 1);
    assert!(fingerprints.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(pool.resolved_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_of_absent_key_agree() {
    let (pool, _source) = slow_pool(&[], Duration::from_millis(10));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move { pool.lookup("ghost").await }));
    }

    for task in tasks {
        assert!(task.await.unwrap().is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fallback_lookups_load_once_in_fallback() {
    let (host_pool, host_source) = slow_pool(&[("core", b"code")], Duration::from_millis(50));
    let (mod_pool, _mod_source) = slow_pool(&[], Duration::from_millis(1));
    mod_pool.set_fallback(host_pool.clone()).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let pool = mod_pool.clone();
        tasks.push(tokio::spawn(async move { pool.lookup("core").await }));
    }

    for task in tasks {
        assert!(task.await.unwrap().is_some());
    }

    assert_eq!(host_source.load_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_load_independently() {
    let (pool, source) = slow_pool(
        &[("core", b"a"), ("world", b"b"), ("audio", b"c")],
        Duration::from_millis(20),
    );

    let mut tasks = Vec::new();
    for name in ["core", "world", "audio", "core", "world", "audio"] {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move { pool.lookup(name).await }));
    }

    for task in tasks {
        assert!(task.await.unwrap().is_some());
    }

    assert_eq!(source.load_count(), 3);
    assert_eq!(pool.resolved_count().await, 3);
}

#[tokio::test]
async fn test_lookup_from_inside_a_patch_style_task() {
    // a lookup started while another is in flight parks cooperatively and
    // observes the published outcome
    let (pool, source) = slow_pool(&[("core", b"code")], Duration::from_millis(30));

    let first = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.lookup("core").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = pool.lookup("core").await;

    assert!(second.is_some());
    assert!(first.await.unwrap().is_some());
    assert_eq!(source.load_count(), 1);
}
