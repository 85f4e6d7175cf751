pub mod cascade;
pub mod memory;
pub mod pipeline;
pub mod quarantine;
pub mod reindex;
pub mod repair;

#[cfg(test)]
mod tests;

pub use cascade::{CallerCountCache, CascadeQueueBuilder};
pub use memory::{InMemoryCacheStore, InMemoryGraphStore, InMemoryVectorIndex};
pub use pipeline::{IndexingPipeline, RunSummary};
pub use quarantine::{ParseOutcome, QuarantineManager};
pub use reindex::BatchReindexer;
pub use repair::EdgeRepairer;

// Re-export common types for convenience
pub use codeatlas_core::{CodeAtlasError, Edge, Entity, EntityId, Result, Scope};
