//! Aggregation engine: the Laplace mechanism over one day's counts.
//!
//! Pure with respect to its inputs: the only side effect is consuming
//! randomness from the injected noise mechanism.

use crate::domain::{AttackQuery, DayAggregate, DpResult, PerIpCounts};
use crate::ports::{DpError, NoiseMechanism};

/// Number of contributors listed in debug output by default.
pub const DEFAULT_TOP_N: usize = 5;

/// Largest scale handed to the noise mechanism. A Laplace draw is at most
/// `52 * ln 2 < 64` scales from zero, so the noise stays finite.
const MAX_NOISE_SCALE: f64 = f64::MAX / 64.0;

/// Computes a differentially private daily attack count.
#[derive(Debug, Clone, Copy)]
pub struct AggregationEngine {
    top_n: usize,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl AggregationEngine {
    /// Create an engine listing `top_n` contributors in debug results.
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Run the Laplace mechanism for `query` over `counts`.
    ///
    /// `noise` must be a fresh mechanism owned by this query alone.
    /// Top contributors are only materialized when `debug` is set.
    ///
    /// # Errors
    /// Returns `DpError` if the noise mechanism rejects the derived scale.
    pub fn run<N>(
        &self,
        query: &AttackQuery,
        counts: &PerIpCounts,
        debug: bool,
        noise: &mut N,
    ) -> Result<DpResult, DpError>
    where
        N: NoiseMechanism + ?Sized,
    {
        let epsilon = query.epsilon();
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DpError::InvalidEpsilon(epsilon));
        }

        let top_n = if debug { self.top_n } else { 0 };
        let aggregate = DayAggregate::summarize(counts, top_n);

        // Sensitivity 0 gives scale 0, and the mechanism returns exactly 0.
        let mut scale = aggregate.sensitivity as f64 / epsilon;
        if scale > MAX_NOISE_SCALE {
            // Vanishing epsilon: the release is pure noise either way.
            tracing::warn!(
                "Noise scale for ε={epsilon} overflows; clamping to {:e}",
                MAX_NOISE_SCALE
            );
            scale = MAX_NOISE_SCALE;
        }
        let noise_value = noise.sample_laplace(scale)?;

        Ok(DpResult {
            date: query.date(),
            epsilon,
            sensitivity: aggregate.sensitivity,
            noisy_count: release(aggregate.true_count, noise_value),
            true_count: aggregate.true_count,
            noise_value,
            noise_scale: scale,
            num_ips: aggregate.num_ips,
            top_contributors: aggregate.top_contributors,
        })
    }
}

/// `max(0, round(true_count + noise))`.
fn release(true_count: u64, noise: f64) -> u64 {
    let noisy = (true_count as f64 + noise).round();
    if noisy <= 0.0 {
        0
    } else {
        // Float-to-int casts saturate.
        noisy as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LaplaceMechanism;
    use chrono::NaiveDate;

    /// Noise source returning a fixed value, for exact arithmetic checks.
    struct FixedNoise(f64);

    impl NoiseMechanism for FixedNoise {
        fn sample_laplace(&mut self, scale: f64) -> Result<f64, DpError> {
            Ok(if scale == 0.0 { 0.0 } else { self.0 })
        }
    }

    fn query(epsilon: f64) -> AttackQuery {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date");
        AttackQuery::new(date, epsilon).expect("valid epsilon")
    }

    fn sample_counts() -> PerIpCounts {
        PerIpCounts::from([("A", 500), ("B", 100), ("C", 100)])
    }

    fn variance(xs: &[f64]) -> f64 {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn test_release_arithmetic() {
        let engine = AggregationEngine::default();
        let result = engine
            .run(&query(1.0), &sample_counts(), true, &mut FixedNoise(-12.6))
            .expect("engine runs");

        assert_eq!(result.true_count, 700);
        assert_eq!(result.sensitivity, 500);
        assert_eq!(result.noise_scale, 500.0);
        assert_eq!(result.noisy_count, 687);
    }

    #[test]
    fn test_negative_release_floors_at_zero() {
        let engine = AggregationEngine::default();
        let result = engine
            .run(&query(1.0), &sample_counts(), false, &mut FixedNoise(-5_000.0))
            .expect("engine runs");

        assert_eq!(result.noisy_count, 0);
    }

    #[test]
    fn test_empty_day_is_exactly_zero() {
        let engine = AggregationEngine::default();
        let mut noise = LaplaceMechanism::from_entropy();

        for _ in 0..50 {
            let result = engine
                .run(&query(1.0), &PerIpCounts::new(), true, &mut noise)
                .expect("engine runs");
            assert_eq!(result.true_count, 0);
            assert_eq!(result.sensitivity, 0);
            assert_eq!(result.noise_value, 0.0);
            assert_eq!(result.noisy_count, 0);
            assert!(result.top_contributors.is_empty());
        }
    }

    #[test]
    fn test_top_contributors_only_in_debug() {
        let engine = AggregationEngine::default();
        let mut noise = LaplaceMechanism::with_seed(1);

        let clean = engine
            .run(&query(1.0), &sample_counts(), false, &mut noise)
            .expect("engine runs");
        assert!(clean.top_contributors.is_empty());

        let debug = engine
            .run(&query(1.0), &sample_counts(), true, &mut noise)
            .expect("engine runs");
        assert_eq!(debug.top_contributors.len(), 3);
        assert_eq!(debug.top_contributors[0].ip, "A");
    }

    #[test]
    fn test_top_n_truncates() {
        let counts: PerIpCounts = (0..20).map(|i| (format!("192.0.2.{i}"), i)).collect();
        let result = AggregationEngine::new(5)
            .run(&query(1.0), &counts, true, &mut LaplaceMechanism::with_seed(2))
            .expect("engine runs");

        assert_eq!(result.top_contributors.len(), 5);
        assert_eq!(result.top_contributors[0].count, 19);
    }

    #[test]
    fn test_repeated_runs_vary_but_truth_is_stable() {
        let engine = AggregationEngine::default();
        let counts = sample_counts();

        let results: Vec<DpResult> = (0..20)
            .map(|_| {
                engine
                    .run(&query(1.0), &counts, true, &mut LaplaceMechanism::from_entropy())
                    .expect("engine runs")
            })
            .collect();

        assert!(results.iter().all(|r| r.true_count == 700 && r.sensitivity == 500));

        let mut noisy: Vec<u64> = results.iter().map(|r| r.noisy_count).collect();
        noisy.sort_unstable();
        noisy.dedup();
        assert!(noisy.len() > 1, "noisy counts never varied");

        let first = results[0].noise_value;
        assert!(results.iter().any(|r| r.noise_value != first));
    }

    #[test]
    fn test_noise_centered_on_true_count() {
        let engine = AggregationEngine::default();
        let counts = sample_counts();
        let mut noise = LaplaceMechanism::with_seed(11);

        let noisy: Vec<f64> = (0..10_000)
            .map(|_| {
                engine
                    .run(&query(1.0), &counts, false, &mut noise)
                    .expect("engine runs")
                    .noise_value
            })
            .collect();

        let mean = noisy.iter().sum::<f64>() / noisy.len() as f64;
        let mad = noisy.iter().map(|x| x.abs()).sum::<f64>() / noisy.len() as f64;
        assert!(mean.abs() < 40.0, "mean noise {mean}");
        assert!((mad - 500.0).abs() < 35.0, "mean absolute noise {mad}");
    }

    #[test]
    fn test_smaller_epsilon_means_more_noise() {
        let engine = AggregationEngine::default();
        let counts = sample_counts();
        let mut noise = LaplaceMechanism::with_seed(5);

        let mut draws = |eps: f64| -> Vec<f64> {
            (0..2_000)
                .map(|_| {
                    engine
                        .run(&query(eps), &counts, false, &mut noise)
                        .expect("engine runs")
                        .noise_value
                })
                .collect()
        };

        let strong = variance(&draws(0.1));
        let weak = variance(&draws(5.0));
        // Scale ratio is 50, so variance ratio is ~2500.
        assert!(strong > 100.0 * weak, "var(eps=0.1)={strong}, var(eps=5)={weak}");
    }

    #[test]
    fn test_vanishing_epsilon_still_releases() {
        let engine = AggregationEngine::default();

        for seed in 0..20 {
            let mut noise = LaplaceMechanism::with_seed(seed);
            let result = engine
                .run(&query(1e-310), &sample_counts(), true, &mut noise)
                .expect("tiny epsilon is still valid");

            assert_eq!(result.true_count, 700);
            assert_eq!(result.noise_scale, MAX_NOISE_SCALE);
            assert!(result.noise_value.is_finite());
            assert!(result.noisy_count == 0 || result.noisy_count == u64::MAX);
        }
    }

    #[test]
    fn test_noisy_count_floor_applies() {
        let engine = AggregationEngine::default();
        let counts = PerIpCounts::from([("A", 1_000), ("B", 1)]);
        let mut noise = LaplaceMechanism::with_seed(8);
        let mut floored = 0;

        for _ in 0..1_000 {
            let result = engine
                .run(&query(0.05), &counts, false, &mut noise)
                .expect("engine runs");
            if (result.true_count as f64 + result.noise_value).round() < 0.0 {
                assert_eq!(result.noisy_count, 0);
                floored += 1;
            }
        }
        // Scale is 20_000, so roughly half of the draws land below zero.
        assert!(floored > 100, "only {floored} draws exercised the floor");
    }
}
