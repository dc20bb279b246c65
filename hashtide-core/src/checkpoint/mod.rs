//! Checkpoints are periodically saved copies of the state store. Regular checkpoints allow
//! resuming counting after a restart, losing at most the ticks since the last committed one.
mod filesystem;
mod memory;
mod triggers;
mod writer;

use std::path::PathBuf;

pub use filesystem::FilesystemBackend;
pub use memory::InMemoryBackend;
use thiserror::Error;
pub use triggers::{
    CheckpointCadence, CheckpointTrigger, EveryNTicks, IntervalCheckpoints, NoCheckpoints,
};
pub use writer::CheckpointError;
pub(crate) use writer::CheckpointWriter;

/// Version of a checkpoint. Versions increase with every checkpoint taken.
pub type CheckpointVersion = u64;

/// A persistence backend provides storage for checkpoints across restarts.
/// This may be on a local disk, in memory or anything really which can reliably store bytes.
///
/// Checkpoints are written in two phases: [persist](PersistenceBackend::persist) stores the
/// data, [commit_version](PersistenceBackend::commit_version) marks it as complete. Only
/// committed versions are ever restored.
pub trait PersistenceBackend: Send + 'static {
    /// Return the version of the last committed checkpoint or `None` if no version has been
    /// committed yet.
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError>;

    /// Version the next checkpoint should be written as. Must be higher than any version
    /// this backend holds data for, committed or not.
    fn next_version(&self) -> Result<CheckpointVersion, PersistenceError> {
        Ok(self.last_committed()?.map_or(0, |v| v + 1))
    }

    /// Load the data of a specific version, `None` if it does not exist
    fn load(&self, version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Store checkpoint data for a version
    fn persist(&mut self, version: CheckpointVersion, state: &[u8])
        -> Result<(), PersistenceError>;

    /// Mark a persisted version as finished
    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError>;

    /// Load the last committed checkpoint, if any
    fn load_last_committed(
        &self,
    ) -> Result<Option<(CheckpointVersion, Vec<u8>)>, PersistenceError> {
        match self.last_committed()? {
            Some(version) => Ok(self.load(version)?.map(|blob| (version, blob))),
            None => Ok(None),
        }
    }
}

impl PersistenceBackend for Box<dyn PersistenceBackend> {
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError> {
        self.as_ref().last_committed()
    }

    fn next_version(&self) -> Result<CheckpointVersion, PersistenceError> {
        self.as_ref().next_version()
    }

    fn load(&self, version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.as_ref().load(version)
    }

    fn persist(
        &mut self,
        version: CheckpointVersion,
        state: &[u8],
    ) -> Result<(), PersistenceError> {
        self.as_mut().persist(version, state)
    }

    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError> {
        self.as_mut().commit_version(version)
    }
}

/// A persistence backend which does not retain any data. This is mostly useful for testing or
/// situations where you always want to start counting from zero
#[derive(Clone, Debug, Default)]
pub struct NoPersistence;

impl PersistenceBackend for NoPersistence {
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
        Ok(())
    }

    fn commit_version(&mut self, _version: CheckpointVersion) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Errors reading or writing checkpoint storage
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Checkpoint storage IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot commit version {0} which was never persisted")]
    NotPersisted(CheckpointVersion),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
