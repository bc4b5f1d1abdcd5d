//! Definition loader collaborator

use super::RawDefinition;
use crate::fs::FileSystem;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Parses a definition artifact into its editable form. The actual code
/// rewriting machinery lives behind this boundary; the engine only needs the
/// parsed structure.
pub trait DefinitionSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<RawDefinition>;
}

const MAGIC: &[u8] = b"GDEF1\n";
const HEADER_END: &[u8] = b"---\n";

/// Default source: parses the on-disk `gdef` artifact layout, which is a
/// `GDEF1` magic line, `key=value` header lines, a `---` separator, then the
/// opaque payload.
pub struct FileDefinitionSource {
    fs: Arc<dyn FileSystem>,
}

impl FileDefinitionSource {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl DefinitionSource for FileDefinitionSource {
    fn load(&self, path: &Path) -> Result<RawDefinition> {
        let bytes = self.fs.read_bytes(path)?;

        if !bytes.starts_with(MAGIC) {
            return Err(anyhow!("Not a definition artifact (bad magic): {:?}", path));
        }

        let rest = &bytes[MAGIC.len()..];
        let header_end = rest
            .windows(HEADER_END.len())
            .position(|w| w == HEADER_END)
            .ok_or_else(|| anyhow!("Definition artifact missing header terminator: {:?}", path))?;

        let header = std::str::from_utf8(&rest[..header_end])
            .with_context(|| format!("Definition header is not UTF-8: {:?}", path))?;
        let payload = rest[header_end + HEADER_END.len()..].to_vec();

        let mut name = None;
        let mut version = None;
        for line in header.lines() {
            match line.split_once('=') {
                Some(("name", v)) => name = Some(v.trim().to_string()),
                Some(("version", v)) => version = Some(v.trim().to_string()),
                _ => {} // unknown header keys are ignored for forward compatibility
            }
        }

        let name =
            name.ok_or_else(|| anyhow!("Definition artifact missing name header: {:?}", path))?;

        let mut raw = RawDefinition::new(name, payload, path.to_path_buf());
        if let Some(version) = version {
            raw = raw.with_version(version);
        }
        Ok(raw)
    }
}

/// In-memory source for tests: serves canned definitions by path and counts
/// how many loads actually reached the backing store.
pub struct MemoryDefinitionSource {
    definitions: RwLock<HashMap<PathBuf, RawDefinition>>,
    loads: AtomicUsize,
}

impl MemoryDefinitionSource {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, path: impl Into<PathBuf>, definition: RawDefinition) {
        self.definitions
            .write()
            .unwrap()
            .insert(path.into(), definition);
    }

    /// Number of load calls that reached this source
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDefinitionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionSource for MemoryDefinitionSource {
    fn load(&self, path: &Path) -> Result<RawDefinition> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.definitions
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("No definition at {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    fn artifact(name: &str, version: Option<&str>, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(format!("name={}\n", name).as_bytes());
        if let Some(version) = version {
            bytes.extend_from_slice(format!("version={}\n", version).as_bytes());
        }
        bytes.extend_from_slice(HEADER_END);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_parse_full_artifact() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("defs/core.gdef", artifact("core", Some("2.1"), b"machine-code"));

        let source = FileDefinitionSource::new(fs);
        let raw = source.load(Path::new("defs/core.gdef")).unwrap();

        assert_eq!(raw.name, "core");
        assert_eq!(raw.version.as_deref(), Some("2.1"));
        assert_eq!(raw.payload, b"machine-code");
    }

    #[test]
    fn test_parse_without_version() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("defs/core.gdef", artifact("core", None, b""));

        let source = FileDefinitionSource::new(fs);
        let raw = source.load(Path::new("defs/core.gdef")).unwrap();
        assert_eq!(raw.version, None);
        assert!(raw.payload.is_empty());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("defs/core.gdef", b"ELF...");

        let source = FileDefinitionSource::new(fs);
        assert!(source.load(Path::new("defs/core.gdef")).is_err());
    }

    #[test]
    fn test_missing_name_rejected() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("defs/core.gdef", artifact("", None, b"x"));
        let source = FileDefinitionSource::new(fs.clone());
        // empty name header value still parses; a missing header line does not
        assert!(source.load(Path::new("defs/core.gdef")).is_ok());

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(HEADER_END);
        fs.add_file("defs/anon.gdef", bytes);
        assert!(source.load(Path::new("defs/anon.gdef")).is_err());
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let fs = Arc::new(MockFileSystem::new());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(b"name=core\n");
        fs.add_file("defs/core.gdef", bytes);

        let source = FileDefinitionSource::new(fs);
        assert!(source.load(Path::new("defs/core.gdef")).is_err());
    }

    #[test]
    fn test_memory_source_counts_loads() {
        let source = MemoryDefinitionSource::new();
        source.insert(
            "/defs/core.gdef",
            RawDefinition::new("core", b"x".to_vec(), PathBuf::from("/defs/core.gdef")),
        );

        assert_eq!(source.load_count(), 0);
        source.load(Path::new("/defs/core.gdef")).unwrap();
        assert!(source.load(Path::new("/defs/other.gdef")).is_err());
        assert_eq!(source.load_count(), 2);
    }
}
