//! Per-day aggregate: true total, sensitivity and top contributors.

use serde::{Deserialize, Serialize};

use super::PerIpCounts;

/// One source IP and its attack count for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub ip: String,
    pub count: u64,
}

/// Global sensitivity of the daily count: the largest single-IP count.
///
/// Removing one IP's records changes the total by exactly that IP's count,
/// so the maximum over all IPs bounds the change. A dominant IP is allowed to
/// push this arbitrarily high; no capping is applied. Empty days yield `0`.
#[must_use]
pub fn compute_sensitivity(counts: &PerIpCounts) -> u64 {
    counts.values().max().unwrap_or(0)
}

/// The `n` largest contributors, count descending, IP ascending on ties.
#[must_use]
pub fn top_contributors(counts: &PerIpCounts, n: usize) -> Vec<Contributor> {
    let mut ranked: Vec<(&str, u64)> = counts.iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(ip, count)| Contributor {
            ip: ip.to_string(),
            count,
        })
        .collect()
}

/// Derived summary of one day's counts. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAggregate {
    /// Exact, unprotected total
    pub true_count: u64,

    /// Largest single-IP contribution
    pub sensitivity: u64,

    /// Number of distinct source IPs
    pub num_ips: usize,

    /// Largest contributors (empty unless requested)
    pub top_contributors: Vec<Contributor>,
}

impl DayAggregate {
    /// Summarize `counts`, keeping the `top_n` largest contributors.
    ///
    /// Pass `top_n = 0` when the contributors must not be materialized.
    #[must_use]
    pub fn summarize(counts: &PerIpCounts, top_n: usize) -> Self {
        Self {
            true_count: counts.total(),
            sensitivity: compute_sensitivity(counts),
            num_ips: counts.len(),
            top_contributors: top_contributors(counts, top_n),
        }
    }
}
