//! Helpers shared by unit tests
use std::collections::HashSet;

use crate::{
    checkpoint::{CheckpointVersion, InMemoryBackend, PersistenceBackend, PersistenceError},
    classify::{Classifier, KeywordTable},
    sinks::{SinkWriteError, SnapshotSink, VecSink},
    types::{CounterSnapshot, Timestamp},
};

/// A classifier with one keyword per topic decade:
/// `vote` (Politics), `goal` (Sports), `python` (Technology), `covid` (COVID-19),
/// `zelda` (Videogames).
/// Polarity is positive for texts containing `good`, negative for `bad`, neutral otherwise.
pub(crate) fn test_classifier() -> Classifier {
    let mut keywords: Vec<String> = (0..50).map(|i| format!("kw{i}")).collect();
    for (pos, word) in [(0, "vote"), (10, "goal"), (20, "python"), (30, "covid"), (40, "zelda")] {
        keywords[pos] = word.to_string();
    }
    let table = KeywordTable::new(keywords).unwrap();
    Classifier::new(table, |text: &str| {
        if text.contains("good") {
            1.0
        } else if text.contains("bad") {
            -1.0
        } else {
            0.0
        }
    })
}

/// A backend which refuses every write
#[derive(Debug, Default, Clone)]
pub(crate) struct FailingBackend;

impl PersistenceBackend for FailingBackend {
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError> {
        Ok(None)
    }

    fn load(&self, _version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(None)
    }

    fn persist(
        &mut self,
        _version: CheckpointVersion,
        _state: &[u8],
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::io(
            "/dev/full",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ))
    }

    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError> {
        Err(PersistenceError::NotPersisted(version))
    }
}

/// In-memory storage which refuses to persist selected versions. Clones share storage.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyBackend {
    fail_on: HashSet<CheckpointVersion>,
    inner: InMemoryBackend,
}

impl FlakyBackend {
    pub(crate) fn failing_on(versions: impl IntoIterator<Item = CheckpointVersion>) -> Self {
        Self {
            fail_on: versions.into_iter().collect(),
            inner: InMemoryBackend::default(),
        }
    }
}

impl PersistenceBackend for FlakyBackend {
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError> {
        self.inner.last_committed()
    }

    fn load(&self, version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.inner.load(version)
    }

    fn persist(
        &mut self,
        version: CheckpointVersion,
        state: &[u8],
    ) -> Result<(), PersistenceError> {
        if self.fail_on.contains(&version) {
            return FailingBackend.persist(version, state);
        }
        self.inner.persist(version, state)
    }

    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError> {
        self.inner.commit_version(version)
    }
}

/// A sink which fails on selected publish calls (counted from zero) and records every
/// successful one into a [VecSink]
#[derive(Debug, Clone, Default)]
pub(crate) struct FailingSink {
    fail_on: Option<HashSet<usize>>,
    calls: usize,
    pub(crate) recorded: VecSink,
}

impl FailingSink {
    /// Fail on every call
    pub(crate) fn always() -> Self {
        Self::default()
    }

    /// Fail only on the given calls
    pub(crate) fn on_calls(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: Some(calls.into_iter().collect()),
            ..Default::default()
        }
    }
}

impl SnapshotSink for FailingSink {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        let call = self.calls;
        self.calls += 1;
        let fails = self.fail_on.as_ref().map_or(true, |f| f.contains(&call));
        if fails {
            return Err(SinkWriteError::Rejected(format!("refusing call {call}")));
        }
        self.recorded.publish(timestamp, snapshot)
    }
}
