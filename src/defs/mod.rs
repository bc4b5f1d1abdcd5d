//! Binary definition resolution
//!
//! Named binary code-unit definitions are parsed from search locations into a
//! mutable [`RawDefinition`], frozen into an [`ActiveDefinition`] on
//! activation, and cached in a [`DefinitionPool`]. Pools suppress duplicate
//! loads per key and may chain to one fallback pool (a mod pool falling back
//! to the host pool).

mod pool;
mod source;
mod types;

pub use pool::{DefinitionPool, PoolError};
pub use source::{DefinitionSource, FileDefinitionSource, MemoryDefinitionSource};
pub use types::{ActiveDefinition, RawDefinition};
