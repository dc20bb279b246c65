use super::{BatchSource, SourceError};
use crate::{
    shutdown::ShutdownSignal,
    types::{Batch, Event, TickId},
};

/// A source which yields pre-built batches from an iterator, one per call, without waiting
/// for a wall-clock tick.
///
/// Batches are timestamped when they are handed out and numbered by their index in the
/// iterator. Once the iterator is exhausted the source is finished, or reports
/// [SourceError::Disconnected] if built with [IteratorSource::disconnect_at_end].
///
/// # Example
/// ```rust
/// use hashtide::sources::{BatchSource, IteratorSource};
/// use hashtide::ShutdownSignal;
///
/// let mut source = IteratorSource::new(vec![vec!["vote", "go team"], vec![]]);
/// let shutdown = ShutdownSignal::new();
/// assert_eq!(source.next_batch(&shutdown).unwrap().unwrap().len(), 2);
/// assert_eq!(source.next_batch(&shutdown).unwrap().unwrap().len(), 0);
/// assert!(source.next_batch(&shutdown).unwrap().is_none());
/// ```
pub struct IteratorSource {
    batches: Box<dyn Iterator<Item = Vec<Event>> + Send>,
    next_tick: TickId,
    disconnect_at_end: bool,
}

impl IteratorSource {
    /// Create a new source from an iterable of batches
    pub fn new<I, B, E>(batches: I) -> Self
    where
        I: IntoIterator<Item = B>,
        <I as IntoIterator>::IntoIter: Send + 'static,
        B: IntoIterator<Item = E> + 'static,
        E: Into<Event> + 'static,
    {
        Self {
            batches: Box::new(
                batches
                    .into_iter()
                    .map(|b| b.into_iter().map(Into::into).collect()),
            ),
            next_tick: 0,
            disconnect_at_end: false,
        }
    }

    /// Behave like a feed which drops its connection after the last batch
    pub fn disconnect_at_end(mut self) -> Self {
        self.disconnect_at_end = true;
        self
    }
}

impl BatchSource for IteratorSource {
    fn next_batch(&mut self, shutdown: &ShutdownSignal) -> Result<Option<Batch>, SourceError> {
        if shutdown.is_triggered() {
            return Ok(None);
        }
        match self.batches.next() {
            Some(events) => {
                let tick = self.next_tick;
                self.next_tick += 1;
                Ok(Some(Batch::now(tick, events)))
            }
            None if self.disconnect_at_end => Err(SourceError::Disconnected),
            None => Ok(None),
        }
    }
}
