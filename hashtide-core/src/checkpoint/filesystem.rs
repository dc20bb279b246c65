use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use super::{CheckpointVersion, PersistenceBackend, PersistenceError};

const COMMITS_FILE: &str = "commits";
const VERSION_PREFIX: &str = "checkpoint-";
const VERSION_SUFFIX: &str = ".bin";

/// A backend storing checkpoints as files in a local directory.
///
/// Every version is written to `checkpoint-<version>.bin` and made visible with an atomic
/// rename. Committed versions are recorded in a `commits` file. After each commit only the
/// last `retain` committed versions are kept on disk, together with versions newer than the
/// latest commit. Older files which were never committed are removed as well.
#[derive(Debug)]
pub struct FilesystemBackend {
    directory: PathBuf,
    commits: Vec<CheckpointVersion>,
    // every version with a checkpoint file in the directory
    on_disk: BTreeSet<CheckpointVersion>,
    retain: usize,
}

impl FilesystemBackend {
    /// Open or create a checkpoint directory.
    ///
    /// Fails if the directory can not be created or the commit log can not be read.
    /// A commit log which exists but can not be decoded is discarded with a warning and the
    /// backend starts without committed versions. New versions are still numbered past every
    /// checkpoint file found in the directory, so existing files are never overwritten.
    pub fn open(directory: impl Into<PathBuf>, retain: usize) -> Result<Self, PersistenceError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| PersistenceError::io(&directory, e))?;
        let commits_path = directory.join(COMMITS_FILE);
        let commits = match fs::read(&commits_path) {
            Ok(content) => match rmp_serde::from_slice::<Vec<CheckpointVersion>>(&content) {
                Ok(commits) => commits,
                Err(e) => {
                    warn!(
                        "Commit log at {} is corrupt, ignoring it: {e}",
                        commits_path.display()
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(PersistenceError::io(commits_path, e)),
        };
        let on_disk = scan_versions(&directory)?;
        debug!(
            "Opened checkpoint directory {} with {} committed versions, {} files",
            directory.display(),
            commits.len(),
            on_disk.len()
        );
        Ok(Self {
            directory,
            commits,
            on_disk,
            retain: retain.max(1),
        })
    }

    /// Directory this backend writes to
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Committed versions still on disk, in commit order
    pub fn commits(&self) -> &[CheckpointVersion] {
        &self.commits
    }

    fn version_path(&self, version: CheckpointVersion) -> PathBuf {
        self.directory
            .join(format!("{VERSION_PREFIX}{version}{VERSION_SUFFIX}"))
    }

    /// Remove committed versions beyond the retention limit and every uncommitted file older
    /// than the latest commit
    fn purge(&mut self) -> Result<(), PersistenceError> {
        if self.commits.len() > self.retain {
            let purge_count = self.commits.len() - self.retain;
            self.commits.drain(..purge_count);
            write_atomic(&self.directory.join(COMMITS_FILE), &encode_commits(&self.commits))?;
        }
        let Some(newest) = self.commits.last().copied() else {
            return Ok(());
        };
        let stale: Vec<CheckpointVersion> = self
            .on_disk
            .range(..newest)
            .filter(|v| !self.commits.contains(v))
            .copied()
            .collect();
        for version in stale {
            let path = self.version_path(version);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Purged checkpoint version {version}"),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => return Err(PersistenceError::io(path, e)),
            }
            self.on_disk.remove(&version);
        }
        Ok(())
    }
}

impl PersistenceBackend for FilesystemBackend {
    fn last_committed(&self) -> Result<Option<CheckpointVersion>, PersistenceError> {
        Ok(self.commits.last().copied())
    }

    fn next_version(&self) -> Result<CheckpointVersion, PersistenceError> {
        let highest = self.on_disk.last().copied().max(self.commits.last().copied());
        Ok(highest.map_or(0, |v| v + 1))
    }

    fn load(&self, version: CheckpointVersion) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.version_path(version);
        match fs::read(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    fn persist(
        &mut self,
        version: CheckpointVersion,
        state: &[u8],
    ) -> Result<(), PersistenceError> {
        write_atomic(&self.version_path(version), state)?;
        self.on_disk.insert(version);
        Ok(())
    }

    fn commit_version(&mut self, version: CheckpointVersion) -> Result<(), PersistenceError> {
        if !self.version_path(version).exists() {
            return Err(PersistenceError::NotPersisted(version));
        }
        self.commits.push(version);
        write_atomic(&self.directory.join(COMMITS_FILE), &encode_commits(&self.commits))?;
        self.purge()
    }
}

fn encode_commits(commits: &[CheckpointVersion]) -> Vec<u8> {
    // PANIC: a list of integers always encodes
    #[allow(clippy::unwrap_used)]
    rmp_serde::to_vec(commits).unwrap()
}

/// Versions of all checkpoint files in `directory`
fn scan_versions(directory: &Path) -> Result<BTreeSet<CheckpointVersion>, PersistenceError> {
    let entries = fs::read_dir(directory).map_err(|e| PersistenceError::io(directory, e))?;
    let mut versions = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io(directory, e))?;
        let name = entry.file_name();
        let version = name
            .to_str()
            .and_then(|n| n.strip_prefix(VERSION_PREFIX))
            .and_then(|n| n.strip_suffix(VERSION_SUFFIX))
            .and_then(|v| v.parse().ok());
        if let Some(version) = version {
            versions.insert(version);
        }
    }
    Ok(versions)
}

/// Write to a temporary sibling, sync it and rename it over the target
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| PersistenceError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))
}
