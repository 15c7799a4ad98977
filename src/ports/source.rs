//! Attack source port: Trait for the fetch collaborator.
//!
//! This trait abstracts the attack log backend (Elasticsearch, SQLite) from
//! the query service.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::PerIpCounts;

/// Errors raised by a fetch collaborator.
///
/// These are propagated to the caller unchanged; the query service never
/// substitutes a count when a fetch fails.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend rejected query ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(NaiveDate),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend misconfigured: {0}")]
    Misconfigured(String),
}

/// Trait for retrieving raw per-IP attack counts for one day.
///
/// A day with no attacks is an empty mapping, not an error.
pub trait AttackSource: Send + Sync {
    /// Fetch the per-IP attack counts recorded on `date` (UTC day).
    ///
    /// # Errors
    /// Returns error if the backend cannot be reached or answers garbage.
    fn fetch_counts(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError>;
}

impl<T: AttackSource + ?Sized> AttackSource for Box<T> {
    fn fetch_counts(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
        (**self).fetch_counts(date)
    }
}

impl<T: AttackSource + ?Sized> AttackSource for Arc<T> {
    fn fetch_counts(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
        (**self).fetch_counts(date)
    }
}
