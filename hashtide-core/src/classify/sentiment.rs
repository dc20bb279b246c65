//! Polarity scoring. Hashtide only depends on the sign of the score, the scorer itself is
//! pluggable.
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use thiserror::Error;

/// Scores text polarity in `[-1, 1]`: negative below zero, positive above.
pub trait PolarityScorer: Send + Sync + 'static {
    /// Polarity of the given text
    fn polarity(&self, text: &str) -> f64;
}

impl<F> PolarityScorer for F
where
    F: Fn(&str) -> f64 + Send + Sync + 'static,
{
    fn polarity(&self, text: &str) -> f64 {
        self(text)
    }
}

const DEFAULT_LEXICON: &[(&str, f64)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("excellent", 1.0),
    ("amazing", 0.6),
    ("awesome", 1.0),
    ("best", 1.0),
    ("better", 0.5),
    ("love", 0.5),
    ("happy", 0.8),
    ("win", 0.8),
    ("wins", 0.8),
    ("won", 0.8),
    ("nice", 0.6),
    ("fun", 0.3),
    ("cool", 0.35),
    ("safe", 0.5),
    ("strong", 0.43),
    ("beautiful", 0.85),
    ("perfect", 1.0),
    ("hope", 0.3),
    ("bad", -0.7),
    ("worse", -0.4),
    ("worst", -1.0),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("horrible", -1.0),
    ("hate", -0.8),
    ("sad", -0.5),
    ("angry", -0.5),
    ("lose", -0.3),
    ("lost", -0.3),
    ("loses", -0.3),
    ("fail", -0.5),
    ("failed", -0.5),
    ("wrong", -0.5),
    ("dead", -0.2),
    ("sick", -0.71),
    ("fake", -0.5),
    ("stupid", -0.8),
    ("boring", -1.0),
    ("crisis", -0.3),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "isn't", "wasn't", "can't", "won't"];

/// Flipping factor applied to a word preceded by a negation
const NEGATION_FACTOR: f64 = -0.5;

/// Averages the polarity of every known word in the text.
/// A negation word flips and halves the polarity of the word directly after it.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<String, f64>,
    negations: HashSet<String>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new(DEFAULT_LEXICON.iter().map(|(w, s)| (w.to_string(), *s)))
    }
}

impl LexiconScorer {
    /// Create a scorer from (word, polarity) pairs. Polarities are clamped to `[-1, 1]`.
    pub fn new(words: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            lexicon: words
                .into_iter()
                .map(|(w, s)| (w.to_lowercase(), s.clamp(-1.0, 1.0)))
                .collect(),
            negations: NEGATIONS.iter().map(|x| x.to_string()).collect(),
        }
    }

    /// Read a lexicon with one `word polarity` pair per line.
    /// Empty lines and lines starting with `#` are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, LexiconError> {
        let mut words = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parsed = trimmed
                .split_once(char::is_whitespace)
                .and_then(|(w, s)| s.trim().parse::<f64>().ok().map(|s| (w.to_string(), s)))
                .filter(|(_, s)| s.is_finite());
            match parsed {
                Some(entry) => words.push(entry),
                None => {
                    return Err(LexiconError::Malformed {
                        line: i + 1,
                        content: line,
                    })
                }
            }
        }
        Ok(Self::new(words))
    }

    /// Read a lexicon file, see [LexiconScorer::from_reader]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LexiconError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl PolarityScorer for LexiconScorer {
    fn polarity(&self, text: &str) -> f64 {
        let mut scores = Vec::new();
        let mut negate = false;
        for token in text.split_whitespace() {
            let word = normalize(token);
            if self.negations.contains(&word) {
                negate = true;
                continue;
            }
            if let Some(score) = self.lexicon.get(&word) {
                scores.push(if negate { score * NEGATION_FACTOR } else { *score });
            }
            negate = false;
        }
        if scores.is_empty() {
            return 0.0;
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        mean.clamp(-1.0, 1.0)
    }
}

/// lowercase and strip surrounding punctuation, hashtag and mention markers
fn normalize(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .trim_matches('\'')
        .to_lowercase()
}

/// Errors loading a lexicon
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Error reading lexicon: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lexicon line {line} is not of the form 'word polarity': '{content}'")]
    Malformed { line: usize, content: String },
}
