//! Definition forms: editable until activation, immutable after

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// A parsed definition, still editable. Early patches may rewrite the payload
/// before the host activates its code; activation is the one-way exit from
/// this form.
#[derive(Debug, Clone)]
pub struct RawDefinition {
    pub name: String,
    pub version: Option<String>,
    pub payload: Vec<u8>,
    /// Where the definition was parsed from
    pub origin: PathBuf,
}

impl RawDefinition {
    pub fn new(name: impl Into<String>, payload: Vec<u8>, origin: PathBuf) -> Self {
        Self {
            name: name.into(),
            version: None,
            payload,
            origin,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Freeze into the immutable activated form. Consumes self: once
    /// activated, the editable form no longer exists.
    pub fn activate(self) -> ActiveDefinition {
        let fingerprint = hex::encode(Sha256::digest(&self.payload));
        ActiveDefinition {
            name: self.name,
            version: self.version,
            fingerprint,
            origin: self.origin,
            payload: self.payload.into(),
        }
    }
}

/// An activated, immutable definition as served by the pool
#[derive(Debug)]
pub struct ActiveDefinition {
    name: String,
    version: Option<String>,
    fingerprint: String,
    origin: PathBuf,
    payload: Arc<[u8]>,
}

impl ActiveDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Hex-encoded SHA-256 of the payload at activation time
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn origin(&self) -> &PathBuf {
        &self.origin
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
