//! Definition pool: duplicate-load suppression and one-hop fallback

use super::{ActiveDefinition, DefinitionSource};
use crate::fs::FileSystem;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Fallback link would create a cycle through pool '{0}'")]
    FallbackCycle(String),
}

/// Per-key state. Readers only ever observe `Resolved` or `Absent`; the
/// in-flight marker is internal to the load protocol.
enum Slot {
    InFlight(Arc<Notify>),
    Resolved(Arc<ActiveDefinition>),
    Absent,
}

/// Resolver/cache for named binary definitions.
///
/// At most one load runs per key per pool; concurrent callers for an
/// in-flight key park on a `Notify` until the owner publishes. A pool may
/// link to exactly one fallback pool, consulted once per lookup (one hop,
/// the fallback's own fallback is never chained into).
pub struct DefinitionPool {
    name: String,
    locations: Vec<PathBuf>,
    extension: String,
    source: Arc<dyn DefinitionSource>,
    fs: Arc<dyn FileSystem>,
    entries: Mutex<HashMap<String, Slot>>,
    fallback: std::sync::RwLock<Option<Arc<DefinitionPool>>>,
}

impl DefinitionPool {
    pub fn new(
        name: impl Into<String>,
        locations: Vec<PathBuf>,
        extension: impl Into<String>,
        source: Arc<dyn DefinitionSource>,
        fs: Arc<dyn FileSystem>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            locations,
            extension: extension.into(),
            source,
            fs,
            entries: Mutex::new(HashMap::new()),
            fallback: std::sync::RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link a fallback pool. Rejected if the link would close a cycle.
    pub fn set_fallback(self: &Arc<Self>, fallback: Arc<DefinitionPool>) -> Result<(), PoolError> {
        let mut cursor = Some(fallback.clone());
        while let Some(pool) = cursor {
            if Arc::ptr_eq(&pool, self) {
                return Err(PoolError::FallbackCycle(self.name.clone()));
            }
            cursor = pool.fallback.read().unwrap().clone();
        }

        *self.fallback.write().unwrap() = Some(fallback);
        Ok(())
    }

    /// Remove the fallback link
    pub fn clear_fallback(&self) {
        *self.fallback.write().unwrap() = None;
    }

    /// Resolve a definition by name, consulting this pool and then its
    /// fallback (one hop). Load and parse failures are logged and surface as
    /// absent, never as a caller-visible fault.
    pub async fn lookup(&self, name: &str) -> Option<Arc<ActiveDefinition>> {
        if let Some(found) = self.lookup_local(name).await {
            return Some(found);
        }

        let fallback = self.fallback.read().unwrap().clone();
        match fallback {
            // One hop only: the fallback resolves locally, its own fallback
            // link is not chained into.
            Some(fallback) => fallback.lookup_local(name).await,
            None => None,
        }
    }

    /// Definition names available in this pool's search locations (on disk,
    /// not necessarily resolved yet).
    pub fn available_names(&self) -> Vec<String> {
        let suffix = format!(".{}", self.extension);
        let mut names = Vec::new();

        for location in &self.locations {
            let entries = match self.fs.read_dir(location) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(
                        pool = %self.name,
                        location = %location.display(),
                        error = %err,
                        "Skipping unreadable search location"
                    );
                    continue;
                }
            };

            for entry in entries {
                if entry.is_file() {
                    if let Some(stem) = entry.file_name().strip_suffix(&suffix) {
                        if !stem.is_empty() {
                            names.push(stem.to_string());
                        }
                    }
                }
            }
        }

        names.sort();
        names.dedup();
        names
    }

    /// Number of keys resolved to a definition so far
    pub async fn resolved_count(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Resolved(_)))
            .count()
    }

    async fn lookup_local(&self, name: &str) -> Option<Arc<ActiveDefinition>> {
        loop {
            let notify = {
                let mut entries = self.entries.lock().await;
                match entries.get(name) {
                    Some(Slot::Resolved(def)) => return Some(def.clone()),
                    Some(Slot::Absent) => return None,
                    Some(Slot::InFlight(notify)) => notify.clone(),
                    None => {
                        entries.insert(name.to_string(), Slot::InFlight(Arc::new(Notify::new())));
                        break;
                    }
                }
            };

            // Register interest before re-checking: the publisher notifies
            // under the entries lock, so once registration is in place a
            // publish cannot slip past unseen.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let entries = self.entries.lock().await;
                match entries.get(name) {
                    Some(Slot::InFlight(_)) => {}
                    Some(Slot::Resolved(def)) => return Some(def.clone()),
                    Some(Slot::Absent) => return None,
                    None => continue,
                }
            }

            notified.await;
        }

        // This caller owns the load for `name`; the in-flight marker keeps
        // everyone else parked until the outcome publishes.
        let outcome = self.load_definition(name);

        let mut entries = self.entries.lock().await;
        let slot = match &outcome {
            Some(def) => Slot::Resolved(def.clone()),
            None => Slot::Absent,
        };
        if let Some(Slot::InFlight(notify)) = entries.insert(name.to_string(), slot) {
            notify.notify_waiters();
        }

        outcome
    }

    fn load_definition(&self, name: &str) -> Option<Arc<ActiveDefinition>> {
        let filename = format!("{}.{}", name, self.extension);
        let candidates: Vec<PathBuf> = self
            .locations
            .iter()
            .map(|location| location.join(&filename))
            .filter(|path| self.fs.is_file(path))
            .collect();

        match candidates.as_slice() {
            [] => {
                debug!(pool = %self.name, definition = %name, "Definition not present");
                None
            }
            [path] => match self.source.load(path) {
                Ok(raw) => {
                    if raw.name != name {
                        warn!(
                            pool = %self.name,
                            definition = %name,
                            declared = %raw.name,
                            path = %path.display(),
                            "Artifact declares a different definition name, treating as absent"
                        );
                        return None;
                    }
                    let active = Arc::new(raw.activate());
                    debug!(
                        pool = %self.name,
                        definition = %name,
                        fingerprint = %active.fingerprint(),
                        size = active.size(),
                        "Definition resolved"
                    );
                    Some(active)
                }
                Err(err) => {
                    warn!(
                        pool = %self.name,
                        definition = %name,
                        path = %path.display(),
                        error = %err,
                        "Failed to load definition, treating as absent"
                    );
                    None
                }
            },
            many => {
                error!(
                    pool = %self.name,
                    definition = %name,
                    claims = many.len(),
                    "Multiple locations claim one definition, treating as absent"
                );
                None
            }
        }
    }
}
