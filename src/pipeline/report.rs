//! Pipeline run reports

use serde::Serialize;

/// A mod skipped during a step, with the rendered reason
#[derive(Debug, Clone, Serialize)]
pub struct SkippedMod {
    pub mod_id: String,
    pub reason: String,
}

/// A patch unit that failed to load or run
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub mod_id: String,
    pub unit_id: String,
    /// Which lifecycle step failed: "load" or "run"
    pub step: String,
    pub error: String,
}

/// Outcome of one pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub duration_ms: u128,
    pub skipped: Vec<SkippedMod>,
    pub unit_failures: Vec<UnitFailure>,
    /// Set when the step itself failed, as opposed to individual units
    pub error: Option<String>,
}

impl StepReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration_ms: 0,
            skipped: Vec::new(),
            unit_failures: Vec::new(),
            error: None,
        }
    }
}

/// Aggregated outcome of a full or partial pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub steps: Vec<StepReport>,
    /// Host definitions activated during materialization
    pub materialized_definitions: Vec<String>,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            materialized_definitions: Vec::new(),
        }
    }

    pub fn begin_step(&mut self, name: &str) {
        self.steps.push(StepReport::new(name));
    }

    /// The step currently executing. Phases only run between `begin_step`
    /// calls, so this always exists while they record.
    pub fn current_step(&mut self) -> &mut StepReport {
        debug_assert!(!self.steps.is_empty());
        if self.steps.is_empty() {
            self.steps.push(StepReport::new("unnamed"));
        }
        self.steps.last_mut().unwrap()
    }

    pub fn record_skip(&mut self, mod_id: &str, reason: &str) {
        self.current_step().skipped.push(SkippedMod {
            mod_id: mod_id.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn record_unit_failure(&mut self, mod_id: &str, unit_id: &str, step: &str, error: &str) {
        self.current_step().unit_failures.push(UnitFailure {
            mod_id: mod_id.to_string(),
            unit_id: unit_id.to_string(),
            step: step.to_string(),
            error: error.to_string(),
        });
    }

    /// True when no step failed and no unit failed; skipped mods do not make
    /// a run unclean, their errors were already isolated.
    pub fn clean(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.error.is_none() && step.unit_failures.is_empty())
    }

    /// Every unit failure across all steps
    pub fn unit_failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.steps.iter().flat_map(|step| step.unit_failures.iter())
    }

    /// Every skipped mod id across all steps, deduplicated, in first-skip
    /// order
    pub fn skipped_mod_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for step in &self.steps {
            for skip in &step.skipped {
                if seen.insert(skip.mod_id.clone()) {
                    ids.push(skip.mod_id.clone());
                }
            }
        }
        ids
    }
}

impl Default for PipelineReport {
    fn default() -> Self {
        Self::new()
    }
}
