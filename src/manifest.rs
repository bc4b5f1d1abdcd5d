//! Mod manifest parsing and validation
//!
//! Every mod artifact directory carries a `mod.toml` that declares identity,
//! tier, dependencies, conflicts, and the ordered early/main patch units. The
//! scheduler iterates these declarations; there is no runtime discovery of
//! patch code.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// File name of the manifest inside a mod artifact directory
pub const MANIFEST_FILE: &str = "mod.toml";

fn id_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap())
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid mod id '{0}': ids are lowercase alphanumeric with '-' or '_'")]
    InvalidId(String),

    #[error("Mod '{0}' declares a dependency on itself")]
    SelfDependency(String),

    #[error("Mod '{mod_id}' declares duplicate patch unit '{unit_id}'")]
    DuplicateUnit { mod_id: String, unit_id: String },

    #[error("Mod '{mod_id}' declares duplicate dependency '{dep_id}'")]
    DuplicateDependency { mod_id: String, dep_id: String },
}

/// Which cohort a mod belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModTier {
    /// Host-bundled content; always ordered and run before regular mods
    Integration,
    /// Ordinary third-party mod
    Regular,
}

impl Default for ModTier {
    fn default() -> Self {
        ModTier::Regular
    }
}

impl ModTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModTier::Integration => "integration",
            ModTier::Regular => "regular",
        }
    }
}

/// A declared dependency on another mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDecl {
    pub id: String,

    /// Version requirement string, interpreted by the package collaborator
    #[serde(default)]
    pub requirement: Option<String>,

    /// Hard dependencies gate resolution; optional ones only affect ordering
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// A declared conflict with another mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDecl {
    pub id: String,
}

/// A declared patch unit (early or main, by section)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchDecl {
    pub id: String,

    /// Intra-mod ordering key; lower runs first
    #[serde(default)]
    pub order: u32,
}

/// Parsed `mod.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub tier: ModTier,

    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyDecl>,

    #[serde(default, rename = "conflict")]
    pub conflicts: Vec<ConflictDecl>,

    #[serde(default, rename = "early_patch")]
    pub early_patches: Vec<PatchDecl>,

    #[serde(default, rename = "main_patch")]
    pub main_patches: Vec<PatchDecl>,
}

impl ModManifest {
    /// Parse and validate a manifest from TOML text
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: ModManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Display title, falling back to the id
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if !id_pattern().is_match(&self.id) {
            return Err(ManifestError::InvalidId(self.id.clone()));
        }

        let mut dep_ids = HashSet::new();
        for dep in &self.dependencies {
            if !id_pattern().is_match(&dep.id) {
                return Err(ManifestError::InvalidId(dep.id.clone()));
            }
            if dep.id == self.id {
                return Err(ManifestError::SelfDependency(self.id.clone()));
            }
            if !dep_ids.insert(dep.id.as_str()) {
                return Err(ManifestError::DuplicateDependency {
                    mod_id: self.id.clone(),
                    dep_id: dep.id.clone(),
                });
            }
        }

        let mut unit_ids = HashSet::new();
        for unit in self.early_patches.iter().chain(self.main_patches.iter()) {
            if !unit_ids.insert(unit.id.as_str()) {
                return Err(ManifestError::DuplicateUnit {
                    mod_id: self.id.clone(),
                    unit_id: unit.id.clone(),
                });
            }
        }

        Ok(())
    }
}
