use flume::Receiver;
use tracing::debug;

use super::{BatchSource, SourceError, TickSchedule};
use crate::{
    shutdown::ShutdownSignal,
    types::{Batch, Event},
};

/// Collects events from a channel and hands them out as one batch per tick.
///
/// The channel is usually fed by [spawn_reader](super::spawn_reader) but any producer works.
/// Once all senders are dropped and the channel is drained the source reports
/// [SourceError::Disconnected].
pub struct TickedSource {
    events: Receiver<Event>,
    schedule: TickSchedule,
    max_batch_events: Option<usize>,
}

impl TickedSource {
    /// Create a source draining `events` on every tick of `schedule`
    pub fn new(events: Receiver<Event>, schedule: TickSchedule) -> Self {
        Self {
            events,
            schedule,
            max_batch_events: None,
        }
    }

    /// Bound the number of events per batch. Events over the limit stay queued for the
    /// following ticks.
    pub fn with_max_batch_events(mut self, max: usize) -> Self {
        self.max_batch_events = Some(max.max(1));
        self
    }

    fn disconnected(&self) -> bool {
        self.events.is_disconnected() && self.events.is_empty()
    }
}

impl BatchSource for TickedSource {
    fn next_batch(&mut self, shutdown: &ShutdownSignal) -> Result<Option<Batch>, SourceError> {
        if self.disconnected() {
            return Err(SourceError::Disconnected);
        }
        let Some(tick) = self.schedule.wait(shutdown) else {
            return Ok(None);
        };
        let limit = self.max_batch_events.unwrap_or(usize::MAX);
        let events: Vec<Event> = self.events.try_iter().take(limit).collect();
        if events.is_empty() && self.disconnected() {
            return Err(SourceError::Disconnected);
        }
        debug!("Tick {tick} collected {} events", events.len());
        Ok(Some(Batch::now(tick, events)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sources::SlowBatchPolicy;

    fn schedule() -> TickSchedule {
        TickSchedule::new(Duration::from_millis(5), SlowBatchPolicy::Queue)
    }

    #[test]
    fn drains_per_tick() {
        let (tx, rx) = flume::unbounded();
        let mut source = TickedSource::new(rx, schedule());
        let shutdown = ShutdownSignal::new();
        tx.send(Event::from("a")).unwrap();
        tx.send(Event::from("b")).unwrap();

        let batch = source.next_batch(&shutdown).unwrap().unwrap();
        assert_eq!(batch.tick, 0);
        assert_eq!(batch.events, vec![Event::from("a"), Event::from("b")]);

        let empty = source.next_batch(&shutdown).unwrap().unwrap();
        assert_eq!(empty.tick, 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn limit_carries_over() {
        let (tx, rx) = flume::unbounded();
        let mut source = TickedSource::new(rx, schedule()).with_max_batch_events(2);
        let shutdown = ShutdownSignal::new();
        for text in ["1", "2", "3"] {
            tx.send(Event::from(text)).unwrap();
        }
        assert_eq!(source.next_batch(&shutdown).unwrap().unwrap().len(), 2);
        assert_eq!(source.next_batch(&shutdown).unwrap().unwrap().len(), 1);
    }

    /// Events received before the disconnect are still delivered
    #[test]
    fn disconnect_after_drain() {
        let (tx, rx) = flume::unbounded();
        let mut source = TickedSource::new(rx, schedule());
        let shutdown = ShutdownSignal::new();
        tx.send(Event::from("last words")).unwrap();
        drop(tx);

        let batch = source.next_batch(&shutdown).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(matches!(
            source.next_batch(&shutdown),
            Err(SourceError::Disconnected)
        ));
    }

    #[test]
    fn shutdown_ends_source() {
        let (_tx, rx) = flume::unbounded::<Event>();
        let mut source = TickedSource::new(rx, schedule());
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        assert!(source.next_batch(&shutdown).unwrap().is_none());
    }
}
