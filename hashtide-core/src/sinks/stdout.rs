use std::io::{Stdout, Write};

use super::{render, RenderOptions, SinkWriteError, SnapshotSink};
use crate::types::{CounterSnapshot, Timestamp};

/// Prints every snapshot to standard output in the same format the file sink writes.
///
/// A closed stdout (e.g. a broken pipe) is reported as [SinkWriteError::Io] like any other
/// write failure.
#[derive(Debug)]
pub struct StdOutSink<W = Stdout> {
    out: W,
    options: RenderOptions,
}

impl StdOutSink {
    /// Create a sink printing snapshots rendered with the given options
    pub fn new(options: RenderOptions) -> Self {
        Self::with_writer(std::io::stdout(), options)
    }
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl<W: Write> StdOutSink<W> {
    /// Print to `out` instead of stdout
    pub fn with_writer(out: W, options: RenderOptions) -> Self {
        Self { out, options }
    }
}

impl<W: Write> SnapshotSink for StdOutSink<W> {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        let text = render(timestamp, snapshot, &self.options);
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
