//! Mod registry: the ordered set of active mods
//!
//! The registry keeps every active mod sorted by (tier, dependency order,
//! id) and recomputes ordering and resolution state whenever membership
//! changes. Callers serialize mutation externally; the lifecycle controller
//! holds the registry inside its exclusion domain.

pub mod ordering;

pub use ordering::{compute_order, OrderingResult};

use crate::catalog::PackageIndex;
use crate::manifest::ModTier;
use crate::mods::Mod;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Mod '{0}' is already registered")]
    DuplicateId(String),
}

fn tier_rank(tier: ModTier) -> u8 {
    match tier {
        ModTier::Integration => 0,
        ModTier::Regular => 1,
    }
}

#[derive(Default)]
pub struct ModRegistry {
    mods: Vec<Mod>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self { mods: Vec::new() }
    }

    /// Insert a mod and re-sort. Ordering and cycle flags refresh
    /// immediately; resolution state refreshes on the next `resolve`.
    pub fn insert(&mut self, m: Mod) -> Result<(), RegistryError> {
        if self.contains(&m.id) {
            return Err(RegistryError::DuplicateId(m.id.clone()));
        }
        debug!(mod_id = %m.id, tier = m.tier.as_str(), "Registering mod");
        self.mods.push(m);
        self.recompute_order();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Mod> {
        let position = self.mods.iter().position(|m| m.id == id)?;
        let removed = self.mods.remove(position);
        self.recompute_order();
        Some(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Mod> {
        self.mods.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Mod> {
        self.mods.iter_mut().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// All mod ids in registry order
    pub fn ids(&self) -> Vec<String> {
        self.mods.iter().map(|m| m.id.clone()).collect()
    }

    /// Ids of one cohort, in registry order
    pub fn cohort_ids(&self, tier: ModTier) -> Vec<String> {
        self.mods
            .iter()
            .filter(|m| m.tier == tier)
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mod> {
        self.mods.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Mod> {
        self.mods.iter_mut()
    }

    /// Recompute the total order from declared dependencies and re-sort the
    /// backing vector by (tier, dependency position, id).
    pub fn recompute_order(&mut self) {
        let graph: HashMap<String, Vec<String>> = self
            .mods
            .iter()
            .map(|m| {
                (
                    m.id.clone(),
                    m.dependency_ids().map(|d| d.to_string()).collect(),
                )
            })
            .collect();

        let result = ordering::compute_order(&graph);

        for m in &mut self.mods {
            let was_cyclic = m.cycle_member;
            m.cycle_member = result.cyclic.contains(&m.id);
            if m.cycle_member != was_cyclic {
                m.resolution_reported = false;
            }
            m.order_key = result.position(&m.id).unwrap_or(usize::MAX);
        }

        self.mods.sort_by(|a, b| {
            (tier_rank(a.tier), a.order_key, &a.id).cmp(&(tier_rank(b.tier), b.order_key, &b.id))
        });
    }

    /// Recompute `dependencies_satisfied` for every mod, walking in registry
    /// order so a dependency's fresh state is visible to its dependents.
    /// Unresolved mods stay registered; phases skip them.
    pub fn resolve(&mut self, index: &dyn PackageIndex) {
        let present: HashSet<String> = self.mods.iter().map(|m| m.id.clone()).collect();
        let mut resolved: HashMap<String, bool> = HashMap::new();

        for i in 0..self.mods.len() {
            let issue = {
                let m = &self.mods[i];
                self.resolution_issue_for(m, &present, &resolved, index)
            };

            let m = &mut self.mods[i];
            m.dependencies_satisfied = issue.is_none();
            if m.resolution_issue != issue {
                m.resolution_issue = issue;
                m.resolution_reported = false;
            }
            resolved.insert(m.id.clone(), m.dependencies_satisfied);
        }
    }

    fn resolution_issue_for(
        &self,
        m: &Mod,
        present: &HashSet<String>,
        resolved: &HashMap<String, bool>,
        index: &dyn PackageIndex,
    ) -> Option<String> {
        if m.cycle_member {
            return Some("participates in a dependency cycle".to_string());
        }

        if let Some(conflict) = m.conflicts.iter().find(|c| present.contains(*c)) {
            return Some(format!("conflicts with installed mod '{}'", conflict));
        }

        let report = index.check(&m.dependencies);
        if !report.satisfied {
            let rendered: Vec<String> = report
                .missing
                .iter()
                .map(|missing| match &missing.suggestion {
                    Some(suggestion) => format!("{} (did you mean '{}'?)", missing.id, suggestion),
                    None => missing.id.clone(),
                })
                .collect();
            return Some(format!("missing dependencies: {}", rendered.join(", ")));
        }

        if let Some(dep) = m
            .required_dependency_ids()
            .find(|dep| present.contains(*dep) && !resolved.get(*dep).copied().unwrap_or(false))
        {
            return Some(format!("dependency '{}' failed to resolve", dep));
        }

        None
    }
}
