//! Pipeline phase implementations
//!
//! Each phase is a barrier: the orchestrator never starts the next phase
//! until the current one has finished for every member of its cohort.

mod discover;
mod materialize;
mod units;

pub use discover::DiscoverPhase;
pub use materialize::MaterializePhase;
pub use units::{LoadUnitsPhase, RunUnitsPhase, Selection};

pub(crate) use units::{load_units, run_units};
