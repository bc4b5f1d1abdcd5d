//! Phase-ordered pipeline execution
//!
//! The full run is nine strictly sequential steps, each a barrier over its
//! cohort: discover both tiers, load and run early patches (integration tier
//! first), materialize the host's own definitions, then load and run main
//! patches. A subset of mods can be driven through the same load→run
//! sequence after startup.

pub mod context;
pub mod orchestrator;
pub mod phases;
pub mod report;

pub use context::PipelineContext;
pub use orchestrator::Orchestrator;
pub use report::{PipelineReport, SkippedMod, StepReport, UnitFailure};

use anyhow::Result;
use async_trait::async_trait;

/// One barrier step of the pipeline
#[async_trait]
pub trait HostPhase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()>;
}
