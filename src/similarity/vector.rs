//! Sparse token frequency vectors.

use std::collections::HashMap;
use std::hash::Hash;

/// Occurrence count per distinct token. Built once from an extracted token
/// sequence and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyVector<T: Eq + Hash> {
    counts: HashMap<T, u64>,
}

impl<T: Eq + Hash> FrequencyVector<T> {
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut counts = HashMap::new();
        for token in tokens {
            *counts.entry(token).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Count for `token`, zero when absent.
    pub fn get(&self, token: &T) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, u64)> {
        self.counts.iter().map(|(token, count)| (token, *count))
    }

    /// Sum of squared counts.
    pub(crate) fn squared_norm(&self) -> u64 {
        self.counts.values().map(|c| c * c).sum()
    }
}

impl<T: Eq + Hash> FromIterator<T> for FrequencyVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_tokens(iter)
    }
}
