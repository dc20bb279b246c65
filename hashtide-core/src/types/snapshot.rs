//! Point-in-time copies of the counter table
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::Label;

/// An immutable copy of all (label, count) pairs at some point in time.
/// Entries keep the order in which labels were first counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    entries: Vec<(Label, u64)>,
}

impl CounterSnapshot {
    pub(crate) fn new(entries: Vec<(Label, u64)>) -> Self {
        Self { entries }
    }

    /// Count for the given label, or `None` if it was never counted
    pub fn get(&self, label: &Label) -> Option<u64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(Label, u64)> {
        self.entries.iter()
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no label has been counted yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Entries ordered by descending count. Ties keep insertion order.
    pub fn sorted_by_count(&self) -> Vec<(Label, u64)> {
        self.entries
            .iter()
            .copied()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect()
    }

    /// Consume the snapshot returning its entries
    pub fn into_entries(self) -> Vec<(Label, u64)> {
        self.entries
    }
}

impl FromIterator<(Label, u64)> for CounterSnapshot {
    fn from_iter<I: IntoIterator<Item = (Label, u64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
