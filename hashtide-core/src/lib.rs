//! Hashtide counts a live stream of short texts by (topic, sentiment) label.
//!
//! Events arrive as lines of text and are grouped into micro-batches, one per tick. Every
//! batch is classified, added to the running counts in the [state::StateStore] and a full
//! snapshot of the counts is written to a [sinks::SnapshotSink]. Counts are checkpointed
//! through a [checkpoint::PersistenceBackend] so a restarted process continues where the last
//! committed checkpoint left off.
pub mod checkpoint;
pub mod classify;
pub mod engine;
pub mod shutdown;
pub mod sinks;
pub mod sources;
pub mod state;
pub mod types;

pub use engine::{AggregationEngine, EngineError, EngineState, RunSummary, TickReport};
pub use shutdown::ShutdownSignal;

#[cfg(test)]
pub(crate) mod testing;
