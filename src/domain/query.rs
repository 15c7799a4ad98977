//! Query inputs: the per-request parameters and the raw per-IP counts.

use std::collections::HashMap;

use chrono::NaiveDate;

/// Upper end of the epsilon range the dashboard slider recommends.
///
/// Larger values are accepted; they just buy very little privacy.
pub const RECOMMENDED_MAX_EPSILON: f64 = 10.0;

/// Errors raised while building a query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("epsilon must be a finite value > 0, got {0}")]
    InvalidEpsilon(f64),
}

/// A single "how many attacks on this day" request.
///
/// Created per request and discarded once the answer is returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackQuery {
    date: NaiveDate,
    epsilon: f64,
}

impl AttackQuery {
    /// Build a query, rejecting non-positive or non-finite epsilon.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidEpsilon` if `epsilon <= 0` or is NaN/infinite.
    pub fn new(date: NaiveDate, epsilon: f64) -> Result<Self, QueryError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(QueryError::InvalidEpsilon(epsilon));
        }
        Ok(Self { date, epsilon })
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether epsilon falls inside the recommended `(0, 10]` range.
    #[must_use]
    pub fn is_recommended_epsilon(&self) -> bool {
        self.epsilon <= RECOMMENDED_MAX_EPSILON
    }
}

/// Attack counts for one day, keyed by source IP.
///
/// Supplied by the fetch collaborator. The engine only ever reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerIpCounts {
    counts: HashMap<String, u64>,
}

impl PerIpCounts {
    /// Create an empty mapping (a day with no recorded attacks).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` attacks for `ip`, accumulating if the IP is already present.
    pub fn add(&mut self, ip: impl Into<String>, count: u64) {
        let entry = self.counts.entry(ip.into()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    #[must_use]
    pub fn get(&self, ip: &str) -> Option<u64> {
        self.counts.get(ip).copied()
    }

    /// Number of distinct IPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over `(ip, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(ip, &count)| (ip.as_str(), count))
    }

    /// Iterate over the counts only.
    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.values().copied()
    }

    /// Exact (unprotected) total of all attacks.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.values().fold(0u64, u64::saturating_add)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for PerIpCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (ip, count) in iter {
            counts.add(ip, count);
        }
        counts
    }
}

impl<S: Into<String>, const N: usize> From<[(S, u64); N]> for PerIpCounts {
    fn from(pairs: [(S, u64); N]) -> Self {
        pairs.into_iter().collect()
    }
}
