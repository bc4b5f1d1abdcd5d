//! Package/dependency collaborator
//!
//! Given a mod's declared dependencies and the set of known artifacts, the
//! index answers satisfied/unsatisfied plus the missing ids. Catalog download
//! and full version resolution live outside the engine; the default
//! [`CatalogIndex`] covers presence checks and simple requirement matching,
//! and suggests near-miss ids for typos.

use crate::manifest::DependencyDecl;
use std::collections::HashMap;
use std::sync::RwLock;

/// A dependency that could not be satisfied
#[derive(Debug, Clone)]
pub struct MissingDependency {
    pub id: String,
    pub requirement: Option<String>,
    /// Closest known id, when one is plausibly a typo for the other
    pub suggestion: Option<String>,
}

/// Outcome of a dependency check
#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub satisfied: bool,
    pub missing: Vec<MissingDependency>,
}

impl DependencyReport {
    pub fn satisfied() -> Self {
        Self {
            satisfied: true,
            missing: Vec::new(),
        }
    }
}

/// Answers dependency questions against the set of known artifacts
pub trait PackageIndex: Send + Sync {
    /// Record an artifact as known
    fn register(&self, id: &str, version: Option<&str>);

    /// Forget an artifact
    fn unregister(&self, id: &str);

    /// Check a mod's hard dependencies against the known set
    fn check(&self, dependencies: &[DependencyDecl]) -> DependencyReport;
}

/// Default in-process index
pub struct CatalogIndex {
    known: RwLock<HashMap<String, Option<String>>>,
}

const SUGGESTION_THRESHOLD: f64 = 0.85;

impl CatalogIndex {
    pub fn new() -> Self {
        Self {
            known: RwLock::new(HashMap::new()),
        }
    }

    fn suggest(&self, id: &str) -> Option<String> {
        let known = self.known.read().unwrap();
        known
            .keys()
            .map(|candidate| (candidate, strsim::jaro_winkler(id, candidate)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(candidate, _)| candidate.clone())
    }
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageIndex for CatalogIndex {
    fn register(&self, id: &str, version: Option<&str>) {
        self.known
            .write()
            .unwrap()
            .insert(id.to_string(), version.map(|v| v.to_string()));
    }

    fn unregister(&self, id: &str) {
        self.known.write().unwrap().remove(id);
    }

    fn check(&self, dependencies: &[DependencyDecl]) -> DependencyReport {
        // (id, requirement, known-but-version-mismatch)
        let mut unmatched: Vec<(String, Option<String>, bool)> = Vec::new();
        {
            let known = self.known.read().unwrap();
            for dep in dependencies.iter().filter(|dep| dep.required) {
                match known.get(&dep.id) {
                    Some(version)
                        if requirement_matches(dep.requirement.as_deref(), version.as_deref()) => {}
                    Some(_) => unmatched.push((dep.id.clone(), dep.requirement.clone(), true)),
                    None => unmatched.push((dep.id.clone(), dep.requirement.clone(), false)),
                }
            }
        }

        let missing: Vec<MissingDependency> = unmatched
            .into_iter()
            .map(|(id, requirement, present)| MissingDependency {
                // a version mismatch on a present id is not a typo; only
                // unknown ids get a nearest-known hint
                suggestion: if present { None } else { self.suggest(&id) },
                id,
                requirement,
            })
            .collect();

        DependencyReport {
            satisfied: missing.is_empty(),
            missing,
        }
    }
}

/// Match a requirement string against a known version.
///
/// Supported forms: exact (`1.2.0`), minimum (`>=1.2`), and caret
/// (`^1.2`, same major and at least the given version). An unknown artifact
/// version satisfies any requirement, since there is nothing to compare
/// against.
fn requirement_matches(requirement: Option<&str>, version: Option<&str>) -> bool {
    let requirement = match requirement {
        Some(r) => r.trim(),
        None => return true,
    };
    let version = match version {
        Some(v) => v,
        None => return true,
    };

    if let Some(min) = requirement.strip_prefix(">=") {
        return compare_versions(version, min.trim()) != std::cmp::Ordering::Less;
    }

    if let Some(base) = requirement.strip_prefix('^') {
        let base = base.trim();
        return major_of(version) == major_of(base)
            && compare_versions(version, base) != std::cmp::Ordering::Less;
    }

    compare_versions(version, requirement) == std::cmp::Ordering::Equal
}

fn parse_version(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<u64>()
                .unwrap_or(0)
        })
        .collect()
}

fn major_of(version: &str) -> u64 {
    parse_version(version).first().copied().unwrap_or(0)
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let a = parse_version(a);
    let b = parse_version(b);
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}
