//! Laplace adapter: Implementation of NoiseMechanism.
//!
//! Samples Laplace noise by inverse CDF over a ChaCha20 CSPRNG.
//!
//! # Independence
//!
//! Each `LaplaceMechanism` owns its generator. Production code builds one
//! from OS entropy per query and drops it with the query, so no draw or
//! seed is ever reused across queries.

use rand::distributions::Open01;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::ports::{DpError, NoiseMechanism};

/// Laplace noise source backed by a cryptographically secure generator.
pub struct LaplaceMechanism<R = ChaCha20Rng> {
    rng: R,
}

impl LaplaceMechanism<ChaCha20Rng> {
    /// Create a mechanism with a fresh generator seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Create a deterministic mechanism. Tests only; never use for releases.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl<R: RngCore + CryptoRng> LaplaceMechanism<R> {
    /// Wrap an existing cryptographically secure generator.
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + CryptoRng> NoiseMechanism for LaplaceMechanism<R> {
    fn sample_laplace(&mut self, scale: f64) -> Result<f64, DpError> {
        if !scale.is_finite() || scale < 0.0 {
            tracing::error!("Invalid Laplace scale: {scale}. Refusing to sample.");
            return Err(DpError::InvalidScale(scale));
        }
        // Nothing to protect on an empty day.
        if scale == 0.0 {
            return Ok(0.0);
        }

        // Laplace(0, b) via inverse CDF.
        // IMPORTANT: u must never be -0.5, which would yield ln(0) => -inf.
        // Open01 excludes both ends and its smallest value (2^-53) survives
        // the shift, unlike a guard on a [0, 1) draw.
        let u01: f64 = self.rng.sample(Open01); // (0, 1)
        let u = u01 - 0.5; // (-0.5, 0.5)

        let inner = 1.0 - 2.0 * u.abs();
        Ok(-scale * u.signum() * inner.ln())
    }
}
