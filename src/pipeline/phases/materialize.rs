//! Host definition materialization
//!
//! Step seven of the full pipeline: every definition the host ships is
//! resolved through the mod pool, so a mod-supplied replacement (or an early
//! patch's edit) wins over the pristine host artifact, and the host pool
//! serves the rest via fallback.

use crate::pipeline::{HostPhase, PipelineContext};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct MaterializePhase;

#[async_trait]
impl HostPhase for MaterializePhase {
    fn name(&self) -> &'static str {
        "materialize"
    }

    async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()> {
        let names = context.host_pool.available_names();
        info!(definitions = names.len(), "Materializing host definitions");

        for name in names {
            match context.mod_pool.lookup(&name).await {
                Some(definition) => {
                    debug!(
                        definition = %name,
                        fingerprint = %definition.fingerprint(),
                        size = definition.size(),
                        "Definition activated"
                    );
                    context.report.materialized_definitions.push(name);
                }
                None => {
                    warn!(definition = %name, "Host definition failed to materialize");
                }
            }
        }

        info!(
            activated = context.report.materialized_definitions.len(),
            "Materialization complete"
        );
        Ok(())
    }
}
