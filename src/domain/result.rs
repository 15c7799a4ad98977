//! Engine output for a single query.

use chrono::NaiveDate;

use super::Contributor;

/// Result of one differentially private count query.
///
/// Always carries every field; the formatter decides what leaves the
/// process. `top_contributors` is only populated for debug queries.
#[derive(Debug, Clone, PartialEq)]
pub struct DpResult {
    pub date: NaiveDate,
    pub epsilon: f64,

    /// Largest single-IP count for the day
    pub sensitivity: u64,

    /// Published count: `max(0, round(true_count + noise))`
    pub noisy_count: u64,

    /// Exact total (debug only)
    pub true_count: u64,

    /// Laplace draw added to the true total (debug only)
    pub noise_value: f64,

    /// Laplace scale `sensitivity / epsilon` (debug only)
    pub noise_scale: f64,

    /// Distinct source IPs (debug only)
    pub num_ips: usize,

    /// Largest contributors (debug only)
    pub top_contributors: Vec<Contributor>,
}
