//! Background thread writing checkpoints, so a slow disk does not delay ticks.
use std::thread::JoinHandle;

use flume::{Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, info};

use super::{CheckpointVersion, PersistenceBackend, PersistenceError};

struct Job {
    version: CheckpointVersion,
    blob: Vec<u8>,
}

enum Status {
    Committed(CheckpointVersion),
    Failed(CheckpointVersion, PersistenceError),
}

/// Failure of the checkpoint writer. These are not recoverable.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Error writing checkpoint version {version}: {source}")]
    Persistence {
        version: CheckpointVersion,
        source: PersistenceError,
    },
    #[error("Checkpoint writer thread panicked")]
    WriterPanicked,
    #[error("Error spawning checkpoint writer thread: {0}")]
    Spawn(std::io::Error),
}

/// Owns the persistence backend while the engine runs.
/// At most one checkpoint waits behind the one currently being written; further requests are
/// dropped until the writer catches up.
pub(crate) struct CheckpointWriter {
    jobs: Option<Sender<Job>>,
    status: Receiver<Status>,
    handle: Option<JoinHandle<()>>,
    last_committed: Option<CheckpointVersion>,
}

impl CheckpointWriter {
    pub(crate) fn spawn<P: PersistenceBackend>(mut backend: P) -> Result<Self, CheckpointError> {
        let (jobs, job_rx) = flume::bounded::<Job>(1);
        let (status_tx, status) = flume::unbounded();
        let handle = std::thread::Builder::new()
            .name("hashtide-checkpoint".into())
            .spawn(move || {
                for Job { version, blob } in job_rx.iter() {
                    let result = backend
                        .persist(version, &blob)
                        .and_then(|_| backend.commit_version(version));
                    let msg = match result {
                        Ok(()) => {
                            debug!("Committed checkpoint version {version}");
                            Status::Committed(version)
                        }
                        Err(e) => Status::Failed(version, e),
                    };
                    // the engine may already be gone, nothing left to report to
                    let _ = status_tx.send(msg);
                }
            })
            .map_err(CheckpointError::Spawn)?;
        Ok(Self {
            jobs: Some(jobs),
            status,
            handle: Some(handle),
            last_committed: None,
        })
    }

    /// Queue a checkpoint. Returns false if the writer is still busy and the checkpoint was
    /// not queued.
    pub(crate) fn submit(&self, version: CheckpointVersion, blob: Vec<u8>) -> bool {
        let Some(jobs) = self.jobs.as_ref() else {
            return false;
        };
        match jobs.try_send(Job { version, blob }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Collect the results of finished checkpoints. Returns the latest version committed since
    /// the last poll, or the first failure. Commits reported after a failure are still recorded
    /// in [last_committed](CheckpointWriter::last_committed).
    pub(crate) fn poll(&mut self) -> Result<Option<CheckpointVersion>, CheckpointError> {
        let mut committed = None;
        let mut failure = None;
        for status in self.status.try_iter() {
            match status {
                Status::Committed(v) => committed = Some(v),
                Status::Failed(version, source) => {
                    failure.get_or_insert(CheckpointError::Persistence { version, source });
                }
            }
        }
        if committed.is_some() {
            self.last_committed = committed;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(committed),
        }
    }

    /// Latest version this writer committed
    pub(crate) fn last_committed(&self) -> Option<CheckpointVersion> {
        self.last_committed
    }

    /// Write a final checkpoint, wait for all queued checkpoints and stop the writer thread.
    pub(crate) fn finish(
        &mut self,
        last: Option<(CheckpointVersion, Vec<u8>)>,
    ) -> Result<Option<CheckpointVersion>, CheckpointError> {
        if let (Some(jobs), Some((version, blob))) = (self.jobs.as_ref(), last) {
            // blocks until the writer has room, the thread only exits once all senders drop
            let _ = jobs.send(Job { version, blob });
        }
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| CheckpointError::WriterPanicked)?;
        }
        let result = self.poll();
        if let Some(v) = self.last_committed {
            info!("Last committed checkpoint version {v}");
        }
        result
    }
}

impl Drop for CheckpointWriter {
    fn drop(&mut self) {
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
