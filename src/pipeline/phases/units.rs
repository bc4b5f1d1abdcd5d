//! Patch unit load and run steps
//!
//! Load always precedes run for the same cohort/stage. Both steps recompute
//! resolution first and skip unresolved mods with one reported error. The
//! run step flattens units across all resolved mods in the cohort and orders
//! them by the combined key (mod dependency position, intra-mod order, ids),
//! so fine-grained cross-mod constraints hold even between units of
//! different mods.

use crate::manifest::ModTier;
use crate::mods::PatchStage;
use crate::pipeline::{HostPhase, PipelineContext};
use crate::registry::ModRegistry;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Which mods a load/run step applies to
#[derive(Debug, Clone)]
pub enum Selection {
    /// One full cohort
    Tier(ModTier),
    /// An explicit set, for driving mods added after startup
    Ids(Vec<String>),
}

impl Selection {
    /// Selected mod ids in registry order
    fn mod_ids(&self, registry: &ModRegistry) -> Vec<String> {
        match self {
            Selection::Tier(tier) => registry.cohort_ids(*tier),
            Selection::Ids(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                registry
                    .ids()
                    .into_iter()
                    .filter(|id| wanted.contains(id.as_str()))
                    .collect()
            }
        }
    }
}

/// Record and log a resolution skip. The first skip of a mod is an error;
/// repeats across later steps demote to debug so each broken mod reports
/// exactly once.
fn skip_if_unresolved(context: &mut PipelineContext<'_>, mod_id: &str) -> bool {
    let skip = {
        let m = match context.registry.get_mut(mod_id) {
            Some(m) => m,
            None => return true,
        };
        if m.runnable() {
            None
        } else {
            let reason = m
                .resolution_issue
                .clone()
                .unwrap_or_else(|| "unresolved".to_string());
            let first = !m.resolution_reported;
            m.resolution_reported = true;
            Some((reason, first))
        }
    };

    match skip {
        Some((reason, first)) => {
            if first {
                error!(mod_id = %mod_id, reason = %reason, "Skipping unresolved mod");
            } else {
                debug!(mod_id = %mod_id, reason = %reason, "Skipping unresolved mod");
            }
            context.report.record_skip(mod_id, &reason);
            true
        }
        None => false,
    }
}

pub(crate) async fn load_units(
    context: &mut PipelineContext<'_>,
    selection: &Selection,
    stage: PatchStage,
) -> Result<()> {
    context.registry.resolve(context.index);

    for mod_id in selection.mod_ids(context.registry) {
        if skip_if_unresolved(context, &mod_id) {
            continue;
        }
        if context
            .registry
            .get(&mod_id)
            .map(|m| m.stage_load_failed(stage))
            .unwrap_or(true)
        {
            debug!(mod_id = %mod_id, stage = stage.as_str(), "Stage already failed, skipping load");
            continue;
        }

        let patch_ctx = context.patch_context(&mod_id);
        let unit_count = context
            .registry
            .get(&mod_id)
            .map(|m| m.units(stage).len())
            .unwrap_or(0);

        for index in 0..unit_count {
            let (result, unit_id) = {
                let m = match context.registry.get_mut(&mod_id) {
                    Some(m) => m,
                    None => break,
                };
                let unit = &mut m.units_mut(stage)[index];
                let unit_id = unit.id.clone();
                (unit.load(&patch_ctx).await, unit_id)
            };

            if let Err(err) = result {
                // one error per mod; the whole stage is failed and its run
                // step will not see this mod
                error!(
                    mod_id = %mod_id,
                    unit = %unit_id,
                    stage = stage.as_str(),
                    error = %err,
                    "Patch unit failed to load"
                );
                context
                    .report
                    .record_unit_failure(&mod_id, &unit_id, "load", &err.to_string());
                if let Some(m) = context.registry.get_mut(&mod_id) {
                    m.mark_stage_load_failed(stage);
                }
                break;
            }
        }
    }

    Ok(())
}

pub(crate) async fn run_units(
    context: &mut PipelineContext<'_>,
    selection: &Selection,
    stage: PatchStage,
) -> Result<()> {
    context.registry.resolve(context.index);

    // flatten across mods, then sort by the combined topological key rather
    // than running all of one mod before the next
    let mut plan: Vec<(usize, u32, String, String)> = Vec::new();
    for mod_id in selection.mod_ids(context.registry) {
        if skip_if_unresolved(context, &mod_id) {
            continue;
        }

        let m = match context.registry.get(&mod_id) {
            Some(m) => m,
            None => continue,
        };
        if m.stage_load_failed(stage) {
            debug!(
                mod_id = %mod_id,
                stage = stage.as_str(),
                "Stage load failed, excluded from run"
            );
            continue;
        }

        for unit in m.units(stage) {
            plan.push((m.order_key, unit.order, mod_id.clone(), unit.id.clone()));
        }
    }
    plan.sort();

    let mut executed = 0usize;
    let mut failed = 0usize;
    for (_, _, mod_id, unit_id) in plan {
        let patch_ctx = context.patch_context(&mod_id);
        let result = {
            let m = match context.registry.get_mut(&mod_id) {
                Some(m) => m,
                None => continue,
            };
            let unit = match m.units_mut(stage).iter_mut().find(|u| u.id == unit_id) {
                Some(unit) => unit,
                None => continue,
            };
            unit.run(&patch_ctx).await
        };

        match result {
            Ok(()) => executed += 1,
            Err(err) => {
                // isolated: the rest of the cohort keeps running
                failed += 1;
                error!(
                    mod_id = %mod_id,
                    unit = %unit_id,
                    stage = stage.as_str(),
                    error = %err,
                    "Patch unit failed during run"
                );
                context
                    .report
                    .record_unit_failure(&mod_id, &unit_id, "run", &err.to_string());
            }
        }
    }

    info!(
        stage = stage.as_str(),
        executed, failed, "Run step complete"
    );
    Ok(())
}

/// Cohort-wide load step
pub struct LoadUnitsPhase {
    tier: ModTier,
    stage: PatchStage,
}

impl LoadUnitsPhase {
    pub fn new(tier: ModTier, stage: PatchStage) -> Self {
        Self { tier, stage }
    }
}

#[async_trait]
impl HostPhase for LoadUnitsPhase {
    fn name(&self) -> &'static str {
        match (self.tier, self.stage) {
            (ModTier::Integration, PatchStage::Early) => "load:integration:early",
            (ModTier::Integration, PatchStage::Main) => "load:integration:main",
            (ModTier::Regular, PatchStage::Early) => "load:regular:early",
            (ModTier::Regular, PatchStage::Main) => "load:regular:main",
        }
    }

    async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()> {
        load_units(context, &Selection::Tier(self.tier), self.stage).await
    }
}

/// Cohort-wide run step
pub struct RunUnitsPhase {
    tier: ModTier,
    stage: PatchStage,
}

impl RunUnitsPhase {
    pub fn new(tier: ModTier, stage: PatchStage) -> Self {
        Self { tier, stage }
    }
}

#[async_trait]
impl HostPhase for RunUnitsPhase {
    fn name(&self) -> &'static str {
        match (self.tier, self.stage) {
            (ModTier::Integration, PatchStage::Early) => "run:integration:early",
            (ModTier::Integration, PatchStage::Main) => "run:integration:main",
            (ModTier::Regular, PatchStage::Early) => "run:regular:early",
            (ModTier::Regular, PatchStage::Main) => "run:regular:main",
        }
    }

    async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()> {
        run_units(context, &Selection::Tier(self.tier), self.stage).await
    }
}
