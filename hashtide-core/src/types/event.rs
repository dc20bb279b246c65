//! Raw events and the micro-batches carrying them.
use std::str::Utf8Error;

use chrono::{Local, NaiveDateTime, Timelike};

/// Wall clock time of a batch tick. Ticks are second-precision local time.
pub type Timestamp = NaiveDateTime;

/// Format used when writing and parsing tick timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sequence number of a batch tick, starting at 0 for every run
pub type TickId = u64;

/// One line of raw text from the feed.
///
/// The bytes are kept as received; decoding happens on classification so that a line with
/// invalid UTF-8 only fails that single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    raw: Vec<u8>,
}

impl Event {
    /// Create an event from raw bytes
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    /// Raw bytes of this event
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Decode the event as UTF-8 text
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.raw)
    }
}

impl From<&str> for Event {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for Event {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

/// The events collected during one tick
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sequence number of this tick
    pub tick: TickId,
    /// Time at which the tick fired
    pub timestamp: Timestamp,
    /// Events in arrival order
    pub events: Vec<Event>,
}

impl Batch {
    /// Create a batch for the given tick, timestamped now
    pub fn now(tick: TickId, events: Vec<Event>) -> Self {
        Self::new(tick, now_timestamp(), events)
    }

    /// Create a batch with an explicit timestamp
    pub fn new(tick: TickId, timestamp: Timestamp, events: Vec<Event>) -> Self {
        Self {
            tick,
            timestamp,
            events,
        }
    }

    /// Number of events in this batch
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if no events arrived during this tick
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Current local time truncated to whole seconds
pub(crate) fn now_timestamp() -> Timestamp {
    let now = Local::now().naive_local();
    // PANIC: zero nanoseconds is always in range
    #[allow(clippy::unwrap_used)]
    now.with_nanosecond(0).unwrap()
}
