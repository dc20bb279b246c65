//! Types used accross Hashtide
mod event;
mod label;
mod snapshot;

pub use event::{Batch, Event, TickId, Timestamp, TIMESTAMP_FORMAT};
pub use label::{Label, ParseLabelError, Sentiment, Topic, POSITIONS_PER_TOPIC};
pub use snapshot::CounterSnapshot;
