//! The state store: the only long-lived mutable state in Hashtide.
//!
//! Labels are kept in an [IndexMap] behind a read-write lock, each count is an [AtomicU64].
//! Incrementing a label which already exists only needs the read lock, so any number of
//! classification workers can count concurrently. Only the first increment of a new label
//! takes the write lock.
use std::sync::{
    atomic::{AtomicU64, Ordering},
    PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CounterSnapshot, Label};

/// Version of the checkpoint encoding written by [StateStore::checkpoint]
pub const CHECKPOINT_FORMAT: u8 = 1;

/// Recoverable label -> count accumulator
#[derive(Debug, Default)]
pub struct StateStore {
    counts: RwLock<IndexMap<Label, AtomicU64>>,
}

#[derive(Serialize, Deserialize)]
struct CheckpointEnvelope {
    format: u8,
    entries: Vec<(Label, u64)>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a checkpoint blob
    pub fn from_checkpoint(blob: &[u8]) -> Result<Self, CorruptCheckpoint> {
        let store = Self::new();
        store.restore(blob)?;
        Ok(store)
    }

    /// Add `delta` to the count of `label`, creating the entry if it does not exist yet.
    pub fn increment(&self, label: Label, delta: u64) {
        {
            let counts = self.read();
            if let Some(count) = counts.get(&label) {
                count.fetch_add(delta, Ordering::Relaxed);
                return;
            }
        }
        // another worker may have created the entry in between, `entry` handles that
        self.write()
            .entry(label)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Current count of a single label
    pub fn get(&self, label: &Label) -> Option<u64> {
        self.read().get(label).map(|c| c.load(Ordering::Relaxed))
    }

    /// Copy all current (label, count) pairs.
    /// Increments racing with the snapshot may or may not be included.
    pub fn snapshot(&self) -> CounterSnapshot {
        self.read()
            .iter()
            .map(|(label, count)| (*label, count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.read()
            .values()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Serialize the full table for crash recovery
    pub fn checkpoint(&self) -> Vec<u8> {
        encode(&self.snapshot())
    }

    /// Replace the whole table with the content of a checkpoint.
    /// On error the current content is left untouched.
    pub fn restore(&self, blob: &[u8]) -> Result<(), CorruptCheckpoint> {
        let envelope: CheckpointEnvelope = rmp_serde::from_slice(blob)?;
        if envelope.format != CHECKPOINT_FORMAT {
            return Err(CorruptCheckpoint::UnknownFormat(envelope.format));
        }
        let mut restored = IndexMap::with_capacity(envelope.entries.len());
        for (label, count) in envelope.entries {
            if restored.insert(label, AtomicU64::new(count)).is_some() {
                return Err(CorruptCheckpoint::DuplicateLabel(label));
            }
        }
        *self.write() = restored;
        Ok(())
    }

    /// Drop all counts
    pub fn reset(&self) {
        self.write().clear();
    }

    // a panic while holding the lock can not leave a count half-updated, so poisoning is
    // ignored
    fn read(&self) -> RwLockReadGuard<'_, IndexMap<Label, AtomicU64>> {
        self.counts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<Label, AtomicU64>> {
        self.counts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encode a snapshot in the checkpoint format
pub(crate) fn encode(snapshot: &CounterSnapshot) -> Vec<u8> {
    let envelope = CheckpointEnvelope {
        format: CHECKPOINT_FORMAT,
        entries: snapshot.iter().copied().collect(),
    };
    // PANIC: a vec of plain enums and integers always encodes
    #[allow(clippy::unwrap_used)]
    rmp_serde::to_vec(&envelope).unwrap()
}

/// A checkpoint blob could not be turned back into a table
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CorruptCheckpoint {
    #[error("DecodingError: checkpoint is corrupt or incompatible: {0}")]
    Decoding(#[from] rmp_serde::decode::Error),
    #[error("Checkpoint has unknown format version {0}")]
    UnknownFormat(u8),
    #[error("Checkpoint contains label '{0}' more than once")]
    DuplicateLabel(Label),
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use proptest::prelude::*;

    use super::*;
    use crate::types::{Sentiment, Topic};

    fn label(topic: Topic, sentiment: Sentiment) -> Label {
        Label::new(topic, sentiment)
    }

    fn any_label() -> impl Strategy<Value = Label> {
        (0usize..5, 0usize..3).prop_map(|(t, s)| {
            let sentiment = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral][s];
            Label::new(Topic::ALL[t], sentiment)
        })
    }

    #[test]
    fn increment_creates_and_adds() {
        let store = StateStore::new();
        let tech = label(Topic::Technology, Sentiment::Positive);
        assert_eq!(store.get(&tech), None);
        store.increment(tech, 1);
        store.increment(tech, 4);
        assert_eq!(store.get(&tech), Some(5));
    }

    /// A zero increment still creates the entry
    #[test]
    fn zero_delta_creates_entry() {
        let store = StateStore::new();
        let sports = label(Topic::Sports, Sentiment::Neutral);
        store.increment(sports, 0);
        assert_eq!(store.snapshot().into_entries(), vec![(sports, 0)]);
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let store = StateStore::new();
        let a = label(Topic::Videogames, Sentiment::Negative);
        let b = label(Topic::Politics, Sentiment::Positive);
        store.increment(a, 1);
        store.increment(b, 3);
        store.increment(a, 1);
        assert_eq!(store.snapshot().into_entries(), vec![(a, 2), (b, 3)]);
    }

    /// Snapshots are copies and do not change after further increments
    #[test]
    fn snapshot_is_immutable() {
        let store = StateStore::new();
        let a = label(Topic::Covid19, Sentiment::Negative);
        store.increment(a, 1);
        let snapshot = store.snapshot();
        store.increment(a, 1);
        assert_eq!(snapshot.get(&a), Some(1));
        assert_eq!(store.get(&a), Some(2));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let store = Arc::new(StateStore::new());
        let labels: Vec<Label> = Topic::ALL
            .iter()
            .map(|t| label(*t, Sentiment::Positive))
            .collect();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let labels = labels.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        store.increment(labels[i % labels.len()], 1);
                    }
                })
            })
            .collect();
        // snapshot concurrently, counts must never go backwards
        let mut last_total = 0;
        for _ in 0..50 {
            let total = store.snapshot().total();
            assert!(total >= last_total);
            last_total = total;
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(store.total(), 8000);
        for l in labels {
            assert_eq!(store.get(&l), Some(1600));
        }
    }

    #[test]
    fn reset_clears() {
        let store = StateStore::new();
        store.increment(label(Topic::Sports, Sentiment::Positive), 3);
        store.reset();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn garbage_checkpoint_is_corrupt() {
        let store = StateStore::new();
        let a = label(Topic::Sports, Sentiment::Positive);
        store.increment(a, 3);
        let res = store.restore(b"definitely not messagepack");
        assert!(matches!(res, Err(CorruptCheckpoint::Decoding(_))));
        // content is untouched on failure
        assert_eq!(store.get(&a), Some(3));
    }

    #[test]
    fn duplicate_labels_are_corrupt() {
        let a = label(Topic::Sports, Sentiment::Positive);
        let blob = rmp_serde::to_vec(&CheckpointEnvelope {
            format: CHECKPOINT_FORMAT,
            entries: vec![(a, 1), (a, 2)],
        })
        .unwrap();
        assert!(matches!(
            StateStore::from_checkpoint(&blob),
            Err(CorruptCheckpoint::DuplicateLabel(l)) if l == a
        ));
    }

    #[test]
    fn unknown_format_is_corrupt() {
        let blob = rmp_serde::to_vec(&CheckpointEnvelope {
            format: 99,
            entries: vec![],
        })
        .unwrap();
        assert!(matches!(
            StateStore::from_checkpoint(&blob),
            Err(CorruptCheckpoint::UnknownFormat(99))
        ));
    }

    proptest! {
    /// Restoring a checkpoint reproduces every (label, count) pair
    #[test]
    fn checkpoint_restore_roundtrip(increments in prop::collection::vec((any_label(), 0u64..1000), 0..64)) {
        let store = StateStore::new();
        for (l, d) in increments.iter() {
            store.increment(*l, *d);
        }
        let restored = StateStore::from_checkpoint(&store.checkpoint()).unwrap();
        prop_assert_eq!(restored.snapshot(), store.snapshot());
    }

    /// Every label ends up with exactly the sum of its increments
    #[test]
    fn counts_equal_sum_of_increments(increments in prop::collection::vec(any_label(), 0..256)) {
        let store = StateStore::new();
        for l in increments.iter() {
            store.increment(*l, 1);
        }
        for l in increments.iter() {
            let expected = increments.iter().filter(|x| *x == l).count() as u64;
            prop_assert_eq!(store.get(l), Some(expected));
        }
        prop_assert_eq!(store.total(), increments.len() as u64);
    }
    }
}
