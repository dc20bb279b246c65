//! Append-only output file and its replay
use std::{
    fmt::Debug,
    fs::{File, OpenOptions},
    io::{BufRead, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, warn};

use super::{render, RenderOptions, SinkWriteError, SnapshotSink, SEPARATOR};
use crate::types::{CounterSnapshot, Label, ParseLabelError, Timestamp, TIMESTAMP_FORMAT};

/// Where a [FileSink] writes to. Besides writing, a failed record must be cut off again.
pub(crate) trait OutputFile: Write + Seek + Send + Debug {
    fn set_len(&self, len: u64) -> std::io::Result<()>;
    fn sync_data(&self) -> std::io::Result<()>;
}

impl OutputFile for File {
    fn set_len(&self, len: u64) -> std::io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> std::io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes every snapshot to a file. The file is truncated on creation and only ever appended
/// to afterwards. Each publish is flushed and synced before it returns.
///
/// A snapshot is either written completely or not at all: if writing fails midway, the
/// partial record is cut off so the file stays readable by [read_history].
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Box<dyn OutputFile>,
    options: RenderOptions,
}

impl FileSink {
    /// Create (or truncate) the output file at `path`
    pub fn create(path: impl AsRef<Path>, options: RenderOptions) -> Result<Self, SinkWriteError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        debug!("Writing snapshots to {}", path.display());
        Ok(Self {
            path,
            file: Box::new(file),
            options,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_output(file: impl OutputFile + 'static, options: RenderOptions) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            file: Box::new(file),
            options,
        }
    }

    fn append(&mut self, record: &[u8]) -> std::io::Result<()> {
        self.file.write_all(record)?;
        self.file.flush()?;
        self.file.sync_data()
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    /// Location of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSink {
    fn publish(
        &mut self,
        timestamp: Timestamp,
        snapshot: &CounterSnapshot,
    ) -> Result<(), SinkWriteError> {
        let text = render(timestamp, snapshot, &self.options);
        let start = self.file.stream_position()?;
        if let Err(e) = self.append(text.as_bytes()) {
            if let Err(cut) = self.truncate(start) {
                warn!(
                    "Cannot remove partial snapshot from {}: {cut}",
                    self.path.display()
                );
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// One snapshot read back from an output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Tick timestamp from the separator line
    pub timestamp: Timestamp,
    /// Rows in the order they were written
    pub counts: CounterSnapshot,
}

/// Parse an output file back into its snapshots
pub fn read_history<R: BufRead>(reader: R) -> Result<Vec<SnapshotRecord>, HistoryParseError> {
    let mut records: Vec<(Timestamp, Vec<(Label, u64)>)> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(timestamp) = parse_separator(line) {
            let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
                .map_err(|source| HistoryParseError::Timestamp {
                    line: line_no,
                    source,
                })?;
            records.push((timestamp, Vec::new()));
            continue;
        }
        let Some((_, rows)) = records.last_mut() else {
            return Err(HistoryParseError::RowBeforeSeparator(line_no));
        };
        let (label, count) = line
            .rsplit_once(' ')
            .ok_or_else(|| HistoryParseError::MalformedRow(line_no))?;
        let label: Label = label
            .trim_end()
            .parse()
            .map_err(|source| HistoryParseError::Label {
                line: line_no,
                source,
            })?;
        let count = count
            .parse()
            .map_err(|_| HistoryParseError::MalformedRow(line_no))?;
        rows.push((label, count));
    }
    Ok(records
        .into_iter()
        .map(|(timestamp, rows)| SnapshotRecord {
            timestamp,
            counts: rows.into_iter().collect(),
        })
        .collect())
}

fn parse_separator(line: &str) -> Option<&str> {
    line.strip_prefix(SEPARATOR)?
        .strip_suffix(SEPARATOR)
        .map(str::trim)
}

/// The output file could not be parsed
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum HistoryParseError {
    #[error("Error reading history: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: invalid timestamp")]
    Timestamp {
        line: usize,
        source: chrono::ParseError,
    },
    #[error("Line {0}: row appears before any snapshot separator")]
    RowBeforeSeparator(usize),
    #[error("Line {0}: expected `<label> <count>`")]
    MalformedRow(usize),
    #[error("Line {line}: invalid label")]
    Label {
        line: usize,
        source: ParseLabelError,
    },
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use super::*;
    use crate::{
        sinks::tests::timestamp,
        types::{Sentiment, Topic},
    };

    fn snapshot(count: u64) -> CounterSnapshot {
        [
            (Label::new(Topic::Technology, Sentiment::Positive), count),
            (Label::new(Topic::Covid19, Sentiment::Negative), 3),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn written_file_replays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut sink = FileSink::create(&path, RenderOptions::default()).unwrap();
        sink.publish(timestamp(), &snapshot(1)).unwrap();
        sink.publish(timestamp(), &CounterSnapshot::default()).unwrap();
        sink.publish(timestamp(), &snapshot(2)).unwrap();

        let file = std::io::BufReader::new(File::open(&path).unwrap());
        let history = read_history(file).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].counts, snapshot(1));
        assert!(history[1].counts.is_empty());
        assert_eq!(history[2].counts, snapshot(2));
        assert_eq!(history[2].timestamp, timestamp());
    }

    #[test]
    fn create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale content\n").unwrap();
        let _sink = FileSink::create(&path, RenderOptions::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    /// An append-only in-memory file which accepts a limited number of bytes
    #[derive(Debug, Clone, Default)]
    struct ShortFile {
        data: Arc<Mutex<Vec<u8>>>,
        budget: Arc<AtomicUsize>,
    }

    impl ShortFile {
        fn len(&self) -> u64 {
            self.data.lock().unwrap().len() as u64
        }
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let budget = self.budget.load(Ordering::SeqCst);
            if budget == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }
            let n = buf.len().min(budget);
            self.budget.fetch_sub(n, Ordering::SeqCst);
            self.data.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortFile {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            let len = self.len();
            match pos {
                SeekFrom::Start(n) if n == len => Ok(n),
                SeekFrom::Current(0) | SeekFrom::End(0) => Ok(len),
                _ => Err(std::io::ErrorKind::Unsupported.into()),
            }
        }
    }

    impl OutputFile for ShortFile {
        fn set_len(&self, len: u64) -> std::io::Result<()> {
            self.data.lock().unwrap().truncate(len as usize);
            Ok(())
        }

        fn sync_data(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_record() {
        let file = ShortFile::default();
        file.budget.store(usize::MAX, Ordering::SeqCst);
        let mut sink = FileSink::from_output(file.clone(), RenderOptions::default());
        sink.publish(timestamp(), &snapshot(1)).unwrap();
        let first_len = file.len();

        // enough for the separator and part of a row
        file.budget.store(60, Ordering::SeqCst);
        assert!(sink.publish(timestamp(), &snapshot(2)).is_err());
        assert_eq!(file.len(), first_len);

        file.budget.store(usize::MAX, Ordering::SeqCst);
        sink.publish(timestamp(), &snapshot(3)).unwrap();

        let data = file.data.lock().unwrap().clone();
        let history = read_history(Cursor::new(data)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].counts, snapshot(1));
        assert_eq!(history[1].counts, snapshot(3));
    }

    #[test]
    fn reports_line_numbers() {
        let text = "Technology positive 1\n";
        let err = read_history(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, HistoryParseError::RowBeforeSeparator(1)));

        let text = "----------- 2020-11-20 12:34:56 -----------\nTechnology positive many\n";
        let err = read_history(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, HistoryParseError::MalformedRow(2)));

        let text = "----------- yesterday -----------\n";
        let err = read_history(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, HistoryParseError::Timestamp { line: 1, .. }));
    }
}
