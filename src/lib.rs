//! # attackdp
//!
//! Differentially private answers to "how many attacks occurred on day X".
//!
//! This crate provides:
//! - A Laplace-mechanism aggregation engine over per-IP daily attack counts
//! - Fetch adapters for Elasticsearch and a local SQLite attack log
//! - Clean and debug presentations of each query result
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (AttackQuery, PerIpCounts, DayAggregate, DpResult)
//! - `ports`: Trait definitions for the fetch collaborator and noise source
//! - `adapters`: Concrete implementations (ChaCha20 Laplace, Elasticsearch, SQLite)
//! - `application`: Aggregation engine, result formatter and query service
//! - `config`: Environment-driven configuration passed into adapters

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{AggregationEngine, Presentation, QueryService};
pub use domain::{AttackQuery, DayAggregate, DpResult, PerIpCounts};

/// Result type for attackdp operations
pub type Result<T> = std::result::Result<T, AttackDpError>;

/// Main error type for attackdp
#[derive(Debug, thiserror::Error)]
pub enum AttackDpError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(#[from] ports::FetchError),

    #[error("Privacy error: {0}")]
    Privacy(#[from] ports::DpError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
