//! Differential Privacy port: Trait for the noise source.
//!
//! This trait abstracts the randomness behind the Laplace mechanism from the
//! aggregation engine, so production draws from a fresh CSPRNG per query and
//! tests can inject a seeded one.

/// Errors that can occur during differential privacy operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DpError {
    #[error("Invalid epsilon: {0}")]
    InvalidEpsilon(f64),

    #[error("Invalid noise scale: {0}")]
    InvalidScale(f64),
}

/// Source of Laplace noise for a single query.
///
/// Implementations own their random state. A mechanism must never be shared
/// between queries: each query gets its own, independently seeded instance.
pub trait NoiseMechanism {
    /// Draw one sample from Laplace(0, `scale`).
    ///
    /// A scale of exactly `0` must return `0` without consuming randomness.
    ///
    /// # Errors
    /// Returns `DpError::InvalidScale` for negative or non-finite scales.
    fn sample_laplace(&mut self, scale: f64) -> Result<f64, DpError>;
}
