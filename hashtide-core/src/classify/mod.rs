//! Classification of events into topic/sentiment labels.
//!
//! An event is relevant if any of its whitespace separated tokens is a configured keyword.
//! The topic comes from the **last** matching token: every match overwrites the previously
//! matched position and there is no early exit, so `"vote for python"` is a technology event
//! if `python` is a technology keyword, regardless of `vote`.
mod keywords;
mod sentiment;

use std::{str::Utf8Error, sync::Arc};

pub use keywords::{KeywordError, KeywordTable, MAX_KEYWORDS};
pub use sentiment::{LexiconError, LexiconScorer, PolarityScorer};
use thiserror::Error;

use crate::types::{Event, Label, Sentiment, Topic};

/// Maps text to an optional [Label]. Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct Classifier {
    keywords: Arc<KeywordTable>,
    scorer: Arc<dyn PolarityScorer>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("keywords", &self.keywords.len())
            .finish()
    }
}

impl Classifier {
    /// Create a classifier from a keyword table and a polarity scorer
    pub fn new(keywords: KeywordTable, scorer: impl PolarityScorer) -> Self {
        Self {
            keywords: Arc::new(keywords),
            scorer: Arc::new(scorer),
        }
    }

    /// The keyword configuration used by this classifier
    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// Classify a text. Returns `Ok(None)` if no token is a keyword.
    pub fn classify(&self, text: &str) -> Result<Option<Label>, ClassificationError> {
        let Some(topic) = self.topic(text) else {
            return Ok(None);
        };
        let polarity = self.scorer.polarity(text);
        if !polarity.is_finite() {
            return Err(ClassificationError::InvalidPolarity(polarity));
        }
        Ok(Some(Label::new(topic, Sentiment::from_polarity(polarity))))
    }

    /// Decode and classify a raw event
    pub fn classify_event(&self, event: &Event) -> Result<Option<Label>, ClassificationError> {
        self.classify(event.text()?)
    }

    /// Topic of the last token which is a keyword, `None` if no token matches.
    /// Since the keyword table is validated, every position maps to a topic.
    fn topic(&self, text: &str) -> Option<Topic> {
        text.split_whitespace()
            .filter_map(|token| self.keywords.position(token))
            .last()
            .and_then(Topic::from_position)
    }
}

/// Errors which make a single event unclassifiable
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq)]
pub enum ClassificationError {
    #[error("Event is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("Scorer returned non-finite polarity {0}")]
    InvalidPolarity(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fifty keywords with a few recognizable ones on fixed positions
    fn keyword_list() -> Vec<String> {
        let mut keywords: Vec<String> = (0..50).map(|i| format!("#kw{i}")).collect();
        keywords[0] = "election".into();
        keywords[1] = "vote".into();
        keywords[12] = "nba".into();
        keywords[25] = "python".into();
        keywords[31] = "covid".into();
        keywords[44] = "zelda".into();
        keywords
    }

    fn classifier() -> Classifier {
        Classifier::new(
            KeywordTable::new(keyword_list()).unwrap(),
            LexiconScorer::default(),
        )
    }

    fn label(topic: Topic, sentiment: Sentiment) -> Option<Label> {
        Some(Label::new(topic, sentiment))
    }

    #[test]
    fn later_match_wins() {
        let c = classifier();
        assert_eq!(
            c.classify("vote for python today").unwrap(),
            label(Topic::Technology, Sentiment::Neutral)
        );
    }

    /// The topic follows token order, not list order
    #[test]
    fn last_token_wins_over_higher_position() {
        let c = classifier();
        assert_eq!(
            c.classify("covid stats before the vote").unwrap(),
            label(Topic::Politics, Sentiment::Neutral)
        );
    }

    #[test]
    fn no_keyword_no_label() {
        let c = classifier();
        assert_eq!(c.classify("nothing relevant here").unwrap(), None);
        assert_eq!(c.classify("").unwrap(), None);
        // tokens must match exactly
        assert_eq!(c.classify("voters love python3").unwrap(), None);
    }

    #[test]
    fn sentiment_from_scorer() {
        let c = classifier();
        assert_eq!(
            c.classify("great nba game").unwrap(),
            label(Topic::Sports, Sentiment::Positive)
        );
        assert_eq!(
            c.classify("covid is terrible").unwrap(),
            label(Topic::Covid19, Sentiment::Negative)
        );
        assert_eq!(
            c.classify("zelda").unwrap(),
            label(Topic::Videogames, Sentiment::Neutral)
        );
    }

    #[test]
    fn deterministic() {
        let c = classifier();
        for text in ["vote for python today", "great nba game", "meh", "covid bad zelda"] {
            assert_eq!(c.classify(text).unwrap(), c.classify(text).unwrap());
        }
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let c = classifier();
        let event = Event::new(b"vote \xff".to_vec());
        assert!(matches!(
            c.classify_event(&event),
            Err(ClassificationError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn nan_polarity_is_an_error() {
        let c = Classifier::new(KeywordTable::new(["vote"]).unwrap(), |_: &str| f64::NAN);
        assert!(matches!(
            c.classify("vote"),
            Err(ClassificationError::InvalidPolarity(_))
        ));
        // unmatched events never reach the scorer
        assert_eq!(c.classify("other").unwrap(), None);
    }
}
