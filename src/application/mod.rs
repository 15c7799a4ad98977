//! Application layer: Engine, formatting and the query use case.
//!
//! This module keeps the privacy-critical computation (`engine`) separate
//! from presentation (`format`) and from I/O orchestration (`query`).

pub mod engine;
pub mod format;
mod query;

pub use engine::AggregationEngine;
pub use format::{format, CleanView, DebugView, Presentation};
pub use query::QueryService;
