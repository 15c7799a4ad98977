//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the engine and external systems (attack log stores, randomness).

mod privacy;
mod source;

pub use privacy::{DpError, NoiseMechanism};
pub use source::{AttackSource, FetchError};
