//! Query service: the caller-facing `run_query(date, epsilon, debug)`.
//!
//! Validates the request, fetches the day's counts, runs the engine with a
//! freshly seeded noise mechanism and formats the result. Holds no state
//! between queries.

use chrono::NaiveDate;

use crate::adapters::LaplaceMechanism;
use crate::application::engine::{AggregationEngine, DEFAULT_TOP_N};
use crate::application::format::{format, Presentation};
use crate::domain::{AttackQuery, DpResult, PerIpCounts};
use crate::ports::{AttackSource, NoiseMechanism};
use crate::AttackDpError;

/// Service answering differentially private attack-count queries.
pub struct QueryService<S>
where
    S: AttackSource,
{
    source: S,
    engine: AggregationEngine,
}

impl<S> QueryService<S>
where
    S: AttackSource,
{
    /// Create a new query service over an attack source.
    pub fn new(source: S) -> Self {
        Self::with_top_n(source, DEFAULT_TOP_N)
    }

    /// Create a service listing `top_n` contributors in debug output.
    pub fn with_top_n(source: S, top_n: usize) -> Self {
        Self {
            source,
            engine: AggregationEngine::new(top_n),
        }
    }

    /// Answer "how many attacks on `date`" with epsilon-DP.
    ///
    /// Each call draws from its own entropy-seeded generator.
    ///
    /// # Errors
    /// - `InvalidParameter` if epsilon is not a finite value > 0 (nothing is fetched)
    /// - `UpstreamFetch` if the attack source fails
    pub fn run_query(
        &self,
        date: NaiveDate,
        epsilon: f64,
        debug: bool,
    ) -> Result<Presentation, AttackDpError> {
        let mut noise = LaplaceMechanism::from_entropy();
        let result = self.run_query_with(date, epsilon, debug, &mut noise)?;
        Ok(format(&result, debug))
    }

    /// Like [`QueryService::run_query`], with an injected noise mechanism and
    /// the unformatted result.
    ///
    /// # Errors
    /// See [`QueryService::run_query`].
    pub fn run_query_with<N>(
        &self,
        date: NaiveDate,
        epsilon: f64,
        debug: bool,
        noise: &mut N,
    ) -> Result<DpResult, AttackDpError>
    where
        N: NoiseMechanism + ?Sized,
    {
        let query = AttackQuery::new(date, epsilon)
            .map_err(|e| AttackDpError::InvalidParameter(e.to_string()))?;

        if !query.is_recommended_epsilon() {
            tracing::warn!("Epsilon {epsilon} is outside the recommended (0, 10] range");
        }

        let counts = self.source.fetch_counts(date).map_err(|e| {
            tracing::error!("Fetch for {date} failed: {e}");
            e
        })?;

        let result = self.engine.run(&query, &counts, debug, noise)?;

        tracing::info!(
            "Released DP attack count for {date} (ε={epsilon}): {}",
            result.noisy_count
        );
        tracing::debug!(
            "True count {} from {} source IPs, sensitivity {}",
            result.true_count,
            result.num_ips,
            result.sensitivity
        );

        Ok(result)
    }

    /// Fetch the raw per-IP counts for `date`, unprotected.
    ///
    /// Operator tooling only; never expose this through a public surface.
    ///
    /// # Errors
    /// Returns `UpstreamFetch` if the attack source fails.
    pub fn raw_counts(&self, date: NaiveDate) -> Result<PerIpCounts, AttackDpError> {
        Ok(self.source.fetch_counts(date)?)
    }
}
