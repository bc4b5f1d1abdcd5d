//! Pipeline orchestrator

use super::phases::{
    DiscoverPhase, LoadUnitsPhase, MaterializePhase, RunUnitsPhase, Selection,
};
use super::{HostPhase, PipelineContext};
use crate::manifest::ModTier;
use crate::mods::PatchStage;
use anyhow::Result;
use std::time::Instant;
use tracing::{error, info};

/// Drives the fixed phase sequence. Phases execute strictly one after
/// another on the calling task; a phase-level failure is recorded and the
/// pipeline continues, matching the isolate-and-proceed error policy.
pub struct Orchestrator;

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Run the full nine-step pipeline
    pub async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()> {
        let start = Instant::now();
        info!(run_id = %context.report.run_id, "Starting mod pipeline");

        let phases: Vec<Box<dyn HostPhase>> = vec![
            Box::new(DiscoverPhase::new(ModTier::Integration)),
            Box::new(DiscoverPhase::new(ModTier::Regular)),
            Box::new(LoadUnitsPhase::new(ModTier::Integration, PatchStage::Early)),
            Box::new(RunUnitsPhase::new(ModTier::Integration, PatchStage::Early)),
            Box::new(LoadUnitsPhase::new(ModTier::Regular, PatchStage::Early)),
            Box::new(RunUnitsPhase::new(ModTier::Regular, PatchStage::Early)),
            Box::new(MaterializePhase),
            Box::new(LoadUnitsPhase::new(ModTier::Integration, PatchStage::Main)),
            Box::new(RunUnitsPhase::new(ModTier::Integration, PatchStage::Main)),
            Box::new(LoadUnitsPhase::new(ModTier::Regular, PatchStage::Main)),
            Box::new(RunUnitsPhase::new(ModTier::Regular, PatchStage::Main)),
        ];

        for phase in phases {
            self.drive(phase.as_ref(), context).await;
        }

        context.report.finished_at = Some(chrono::Utc::now());
        info!(
            run_id = %context.report.run_id,
            mods = context.registry.len(),
            clean = context.report.clean(),
            total_time_ms = start.elapsed().as_millis(),
            "Pipeline complete"
        );
        Ok(())
    }

    /// Drive a set of already-registered mods through load→run for both
    /// stages, outside a full pipeline run.
    pub async fn execute_subset(
        &self,
        context: &mut PipelineContext<'_>,
        mod_ids: Vec<String>,
    ) -> Result<()> {
        let start = Instant::now();
        info!(
            run_id = %context.report.run_id,
            mods = mod_ids.len(),
            "Starting subset run"
        );

        let selection = Selection::Ids(mod_ids);
        for stage in [PatchStage::Early, PatchStage::Main] {
            let (load_name, run_name) = match stage {
                PatchStage::Early => ("load:subset:early", "run:subset:early"),
                PatchStage::Main => ("load:subset:main", "run:subset:main"),
            };

            context.report.begin_step(load_name);
            info!(phase = %load_name, "Starting phase");
            let phase_start = Instant::now();
            if let Err(err) = super::phases::load_units(context, &selection, stage).await {
                error!(phase = %load_name, error = %err, "Phase failed");
                context.report.current_step().error = Some(err.to_string());
            }
            context.report.current_step().duration_ms = phase_start.elapsed().as_millis();

            context.report.begin_step(run_name);
            info!(phase = %run_name, "Starting phase");
            let phase_start = Instant::now();
            if let Err(err) = super::phases::run_units(context, &selection, stage).await {
                error!(phase = %run_name, error = %err, "Phase failed");
                context.report.current_step().error = Some(err.to_string());
            }
            context.report.current_step().duration_ms = phase_start.elapsed().as_millis();
        }

        context.report.finished_at = Some(chrono::Utc::now());
        info!(
            run_id = %context.report.run_id,
            clean = context.report.clean(),
            total_time_ms = start.elapsed().as_millis(),
            "Subset run complete"
        );
        Ok(())
    }

    async fn drive(&self, phase: &dyn HostPhase, context: &mut PipelineContext<'_>) {
        let name = phase.name();
        context.report.begin_step(name);
        info!(phase = %name, "Starting phase");

        let phase_start = Instant::now();
        if let Err(err) = phase.execute(context).await {
            error!(phase = %name, error = %err, "Phase failed");
            context.report.current_step().error = Some(err.to_string());
        }

        context.report.current_step().duration_ms = phase_start.elapsed().as_millis();
        info!(
            phase = %name,
            duration_ms = context.report.current_step().duration_ms,
            "Phase complete"
        );
    }
}
