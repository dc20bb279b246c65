//! The ordered keyword list. A keyword's position in the list decides its topic.
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use thiserror::Error;
use tracing::debug;

use crate::types::{Topic, POSITIONS_PER_TOPIC};

/// Highest number of keywords which still map onto a topic
pub const MAX_KEYWORDS: usize = Topic::ALL.len() * POSITIONS_PER_TOPIC;

/// Immutable, validated keyword configuration shared by all classifications.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    keywords: Vec<String>,
    // keyword -> highest position it occupies in the list
    last_position: HashMap<String, usize>,
}

impl KeywordTable {
    /// Build a table from keywords in position order.
    ///
    /// Fails if the list is empty or longer than [MAX_KEYWORDS], since positions past the last
    /// topic decade could never be counted.
    pub fn new<I, S>(keywords: I) -> Result<Self, KeywordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        if keywords.is_empty() {
            return Err(KeywordError::Empty);
        }
        if keywords.len() > MAX_KEYWORDS {
            return Err(KeywordError::TooManyKeywords {
                count: keywords.len(),
                max: MAX_KEYWORDS,
            });
        }
        let last_position = keywords
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        Ok(Self {
            keywords,
            last_position,
        })
    }

    /// Parse a keyword file: the first line is a header and skipped, every following line
    /// holds whitespace separated keywords.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, KeywordError> {
        let mut keywords = Vec::new();
        for line in reader.lines().skip(1) {
            keywords.extend(line?.split_whitespace().map(str::to_string));
        }
        Self::new(keywords)
    }

    /// Read a keyword file from disk, see [KeywordTable::from_reader]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KeywordError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| KeywordError::Open(path.display().to_string(), e))?;
        let table = Self::from_reader(BufReader::new(file))?;
        debug!("Loaded {} keywords from {}", table.len(), path.display());
        Ok(table)
    }

    /// Position of the given token in the list. If the token occurs several times, the
    /// last occurrence is returned.
    pub fn position(&self, token: &str) -> Option<usize> {
        self.last_position.get(token).copied()
    }

    /// True if the token is one of the keywords
    pub fn contains(&self, token: &str) -> bool {
        self.last_position.contains_key(token)
    }

    /// Keywords in position order
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Number of keywords, counting duplicates
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Always false for a validated table, present for API completeness
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Errors loading the keyword configuration
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("Error reading keyword file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot open keyword file '{0}': {1}")]
    Open(String, std::io::Error),
    #[error("Keyword list is empty")]
    Empty,
    #[error("Keyword list has {count} entries, at most {max} map to a topic")]
    TooManyKeywords { count: usize, max: usize },
}
