use std::{
    ops::RangeBounds,
    sync::{Arc, Mutex, PoisonError},
};

use super::{SinkWriteError, SnapshotSink};
use crate::types::{CounterSnapshot, Timestamp};

/// Collects published snapshots into a shared vector so they can be taken out again.
/// Mainly useful in tests. Clones share the same vector.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    inner: Arc<Mutex<Vec<(Timestamp, CounterSnapshot)>>>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots currently held
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing has been published (or everything was drained)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recently published snapshot
    pub fn last(&self) -> Option<(Timestamp, CounterSnapshot)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Take the given range out of this sink
    pub fn drain_vec<R: RangeBounds<usize>>(&self, range: R) -> Vec<(Timestamp, CounterSnapshot)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(range)
            .collect()
    }
}

impl IntoIterator for VecSink {
    type Item = (Timestamp, CounterSnapshot);

    type IntoIter = std::vec::IntoIter<(Timestamp, CounterSnapshot)>;

    fn into_iter(self) -> Self::IntoIter {
        self.drain_vec(..).into_iter()
    }
}

impl SnapshotSink for VecSink {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((timestamp, snapshot.clone()));
        Ok(())
    }
}
