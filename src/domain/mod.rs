//! Domain layer: Core types and pure logic.
//!
//! This module contains pure Rust types with no I/O. Nothing in here
//! outlives a single query invocation.

mod aggregate;
mod query;
mod result;

pub use aggregate::{compute_sensitivity, top_contributors, Contributor, DayAggregate};
pub use query::{AttackQuery, PerIpCounts, QueryError, RECOMMENDED_MAX_EPSILON};
pub use result::DpResult;
