use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use super::{CheckpointVersion, PersistenceBackend, PersistenceError};

/// A backend which keeps checkpoints in memory.
/// Clones share the same storage, so a clone kept outside of the engine can be used to
/// inspect checkpoints or to "restart" with the same state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    states: IndexMap<CheckpointVersion, Vec<u8>>,
    commits: Vec<CheckpointVersion>,
}

impl InMemoryBackend {
    /// Versions committed so far, in commit order
    pub fn commits(&self) -> Vec<CheckpointVersion> {
        self.lock().commits.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceBackend for InMemoryBackend {
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError> {
        Ok(self.lock().commits.last().copied())
    }

    fn next_version(&self) -> Result<CheckpointVersion, PersistenceError> {
        Ok(self.lock().states.keys().max().map_or(0, |v| v + 1))
    }

    fn load(&self, version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.lock().states.get(&version).cloned())
    }

    fn persist(
        &mut self,
        version: CheckpointVersion,
        state: &[u8],
    ) -> Result<(), PersistenceError> {
        self.lock().states.insert(version, state.to_vec());
        Ok(())
    }

    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if !inner.states.contains_key(&version) {
            return Err(PersistenceError::NotPersisted(version));
        }
        inner.commits.push(version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_if_no_committed() {
        let backend = InMemoryBackend::default();
        assert_eq!(backend.last_committed().unwrap(), None);
    }

    /// Check we do not restore uncommitted changes
    #[test]
    fn no_uncommitted_restored() {
        let mut backend = InMemoryBackend::default();
        backend.persist(1, b"one").unwrap();
        backend.commit_version(1).unwrap();
        backend.persist(2, b"two").unwrap();
        assert_eq!(
            backend.load_last_committed().unwrap(),
            Some((1, b"one".to_vec()))
        );
    }

    /// Check we return the last committed version, not the highest version
    #[test]
    fn last_committed_not_highest() {
        let mut backend = InMemoryBackend::default();
        backend.persist(42, b"a").unwrap();
        backend.persist(3, b"b").unwrap();
        backend.commit_version(42).unwrap();
        backend.commit_version(3).unwrap();
        assert_eq!(backend.last_committed().unwrap(), Some(3));
    }

    #[test]
    fn commit_requires_persist() {
        let mut backend = InMemoryBackend::default();
        assert!(matches!(
            backend.commit_version(7),
            Err(PersistenceError::NotPersisted(7))
        ));
    }

    #[test]
    fn clones_share_storage() {
        let backend = InMemoryBackend::default();
        let mut clone = backend.clone();
        clone.persist(1, b"x").unwrap();
        clone.commit_version(1).unwrap();
        assert_eq!(backend.commits(), vec![1]);
    }
}
