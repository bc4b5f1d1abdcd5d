//! Discovery collaborator
//!
//! Given a root location, a scanner yields candidate mod artifact paths
//! (directories containing a manifest). Errors never escape the boundary;
//! unreadable entries are logged and skipped.

use crate::config::HostConfig;
use crate::manifest::MANIFEST_FILE;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Yields candidate mod artifact directories under a root
pub trait ModScanner: Send + Sync {
    fn discover(&self, root: &Path) -> Vec<PathBuf>;
}

/// Default scanner: walks the root looking for `mod.toml` files and yields
/// their parent directories, depth- and count-limited.
pub struct DirectoryScanner {
    max_depth: usize,
    max_entries: usize,
}

impl DirectoryScanner {
    pub fn new(max_depth: usize, max_entries: usize) -> Self {
        Self {
            max_depth,
            max_entries,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.scan_max_depth, config.scan_max_entries)
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        let config = HostConfig::default();
        Self::from_config(&config)
    }
}

impl ModScanner for DirectoryScanner {
    fn discover(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            warn!(root = %root.display(), "Mod root is not a directory, skipping");
            return Vec::new();
        }

        let mut candidates = Vec::new();

        for result in WalkBuilder::new(root)
            .max_depth(Some(self.max_depth))
            .hidden(false)
            .git_ignore(false)
            .build()
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            if candidates.len() >= self.max_entries {
                warn!(
                    max_entries = self.max_entries,
                    "Reached artifact limit, stopping scan"
                );
                break;
            }

            let path = entry.path();
            let is_manifest = path.is_file()
                && path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE);
            if is_manifest {
                if let Some(parent) = path.parent() {
                    debug!(artifact = %parent.display(), "Found mod artifact");
                    candidates.push(parent.to_path_buf());
                }
            }
        }

        candidates.sort();
        candidates
    }
}

/// Test scanner that serves a canned list of artifact paths
pub struct StaticScanner {
    paths: RwLock<Vec<PathBuf>>,
}

impl StaticScanner {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: RwLock::new(paths),
        }
    }

    pub fn set_paths(&self, paths: Vec<PathBuf>) {
        *self.paths.write().unwrap() = paths;
    }
}

impl ModScanner for StaticScanner {
    fn discover(&self, _root: &Path) -> Vec<PathBuf> {
        self.paths.read().unwrap().clone()
    }
}
