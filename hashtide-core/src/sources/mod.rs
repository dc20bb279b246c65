//! Sources turn a raw feed of text lines into a sequence of micro-batches
mod iterator;
mod schedule;
mod socket;
mod ticked;

pub use iterator::IteratorSource;
pub use schedule::{SlowBatchPolicy, TickSchedule, MAX_INTERVAL};
pub use socket::{connect, spawn_reader};
pub use ticked::TickedSource;

use thiserror::Error;

use crate::{shutdown::ShutdownSignal, types::Batch};

/// Produces one batch per tick
pub trait BatchSource {
    /// Block until the next tick and return the events collected for it.
    ///
    /// Returns `Ok(None)` if the source is finished or shutdown was requested while waiting.
    /// Returns [SourceError::Disconnected] once the underlying feed is gone and every event
    /// received before has been handed out.
    fn next_batch(&mut self, shutdown: &ShutdownSignal) -> Result<Option<Batch>, SourceError>;
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn next_batch(&mut self, shutdown: &ShutdownSignal) -> Result<Option<Batch>, SourceError> {
        self.as_mut().next_batch(shutdown)
    }
}

/// Errors of the raw event feed
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Event feed disconnected")]
    Disconnected,
    #[error("Cannot connect to event feed at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
}
