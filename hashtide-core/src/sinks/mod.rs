//! Sinks record every published snapshot
mod file;
mod stdout;
mod vec_sink;
pub use file::{read_history, FileSink, HistoryParseError, SnapshotRecord};
pub use stdout::StdOutSink;
pub use vec_sink::VecSink;

use std::fmt::Write;

use thiserror::Error;

use crate::types::{CounterSnapshot, Timestamp, TIMESTAMP_FORMAT};

/// Default limit of label rows written per snapshot
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Width of the label column in rendered snapshots
pub const LABEL_WIDTH: usize = 40;

/// Receives the snapshot of every tick
pub trait SnapshotSink {
    /// Record a snapshot taken at the given tick timestamp.
    /// When this returns `Ok` the record is durable, unless the sink documents otherwise.
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError>;
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        self.as_mut().publish(timestamp, snapshot)
    }
}

/// An absent sink accepts and drops everything
impl<S: SnapshotSink> SnapshotSink for Option<S> {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        match self {
            Some(sink) => sink.publish(timestamp, snapshot),
            None => Ok(()),
        }
    }
}

/// Publish to both sinks. The second sink is written even if the first one fails, the first
/// error is returned.
impl<A: SnapshotSink, B: SnapshotSink> SnapshotSink for (A, B) {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        let first = self.0.publish(timestamp, snapshot);
        let second = self.1.publish(timestamp, snapshot);
        first.and(second)
    }
}

/// How snapshots are rendered as text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Order rows by descending count instead of insertion order
    pub sort_by_count: bool,
    /// Write at most this many rows per snapshot
    pub max_rows: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sort_by_count: false,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Render a snapshot as a separator line followed by one `label count` row per label
pub fn render(timestamp: Timestamp, snapshot: &CounterSnapshot, options: &RenderOptions) -> String {
    let mut out = String::new();
    // writing to a String can not fail
    let _ = writeln!(out, "{}", separator(timestamp));
    let rows = if options.sort_by_count {
        snapshot.sorted_by_count()
    } else {
        snapshot.iter().copied().collect()
    };
    for (label, count) in rows.into_iter().take(options.max_rows) {
        let _ = writeln!(out, "{label:<LABEL_WIDTH$} {count}");
    }
    out
}

pub(crate) const SEPARATOR: &str = "-----------";

fn separator(timestamp: Timestamp) -> String {
    format!(
        "{SEPARATOR} {} {SEPARATOR}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Writing a snapshot failed
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SinkWriteError {
    #[error("Error writing snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sink rejected snapshot: {0}")]
    Rejected(String),
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::{Label, Sentiment, Topic};

    pub(crate) fn timestamp() -> Timestamp {
        NaiveDate::from_ymd_opt(2020, 11, 20)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap()
    }

    fn snapshot() -> CounterSnapshot {
        [
            (Label::new(Topic::Sports, Sentiment::Neutral), 1),
            (Label::new(Topic::Covid19, Sentiment::Negative), 12),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn renders_like_the_classic_output() {
        let text = render(timestamp(), &snapshot(), &RenderOptions::default());
        let expected = format!(
            "----------- 2020-11-20 12:34:56 -----------\n{:<40} 1\n{:<40} 12\n",
            "Sports neutral", "COVID-19 negative"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn sorted_and_limited() {
        let options = RenderOptions {
            sort_by_count: true,
            max_rows: 1,
        };
        let text = render(timestamp(), &snapshot(), &options);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("COVID-19 negative"));
    }

    #[test]
    fn empty_snapshot_is_only_a_separator() {
        let text = render(timestamp(), &CounterSnapshot::default(), &RenderOptions::default());
        assert_eq!(text, "----------- 2020-11-20 12:34:56 -----------\n");
    }

    #[test]
    fn tee_writes_both_and_reports_first_error() {
        let ok = VecSink::new();
        let mut tee = (crate::testing::FailingSink::always(), ok.clone());
        let res = tee.publish(timestamp(), &snapshot());
        assert!(res.is_err());
        assert_eq!(ok.into_iter().count(), 1);

        let mut absent: Option<VecSink> = None;
        assert!(absent.publish(timestamp(), &snapshot()).is_ok());
    }
}
