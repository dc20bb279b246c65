//! Aggregation keys: a topic and a sentiment class.
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of keyword positions mapped to one topic
pub const POSITIONS_PER_TOPIC: usize = 10;

/// Topic an event is assigned to by its matching keyword
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    Politics,
    Sports,
    Technology,
    #[serde(rename = "COVID-19")]
    Covid19,
    Videogames,
}

impl Topic {
    /// All topics in keyword-position order
    pub const ALL: [Topic; 5] = [
        Topic::Politics,
        Topic::Sports,
        Topic::Technology,
        Topic::Covid19,
        Topic::Videogames,
    ];

    /// Map a position in the keyword list to its topic.
    /// Positions come in decades: `[0, 10)` is politics, `[10, 20)` sports and so on.
    /// Returns `None` for positions past the last decade.
    pub fn from_position(position: usize) -> Option<Topic> {
        Self::ALL.get(position / POSITIONS_PER_TOPIC).copied()
    }

    /// Name as it appears in the output artifact
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Politics => "Politics",
            Topic::Sports => "Sports",
            Topic::Technology => "Technology",
            Topic::Covid19 => "COVID-19",
            Topic::Videogames => "Videogames",
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseLabelError::UnknownTopic(s.to_string()))
    }
}

/// Sentiment class derived from the sign of a polarity score
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Classify a polarity by its sign only.
    pub fn from_polarity(polarity: f64) -> Sentiment {
        if polarity > 0.0 {
            Sentiment::Positive
        } else if polarity < 0.0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    /// Name as it appears in the output artifact
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(ParseLabelError::UnknownSentiment(other.to_string())),
        }
    }
}

/// The aggregation key. Two labels are equal iff topic and sentiment match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// Topic of the last matching keyword
    pub topic: Topic,
    /// Sign of the event's polarity
    pub sentiment: Sentiment,
}

impl Label {
    /// Create a new label
    pub fn new(topic: Topic, sentiment: Sentiment) -> Self {
        Self { topic, sentiment }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `{:<40}` in the sink pads the whole label, so write it as one string
        let rendered = format!("{} {}", self.topic, self.sentiment);
        f.pad(&rendered)
    }
}

impl FromStr for Label {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (topic, sentiment) = s
            .trim()
            .rsplit_once(' ')
            .ok_or_else(|| ParseLabelError::Malformed(s.to_string()))?;
        Ok(Label::new(topic.trim_end().parse()?, sentiment.parse()?))
    }
}

/// Errors parsing the textual form of a label
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseLabelError {
    #[error("Label '{0}' is not of the form '<topic> <sentiment>'")]
    Malformed(String),
    #[error("Unknown topic '{0}'")]
    UnknownTopic(String),
    #[error("Unknown sentiment '{0}'")]
    UnknownSentiment(String),
}
