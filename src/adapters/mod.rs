//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external systems:
//! - `laplace`: ChaCha20-backed Laplace noise
//! - `elastic`: Elasticsearch attack log
//! - `sqlite`: SQLite attack log for local use
//! - `sanitize`: IP and secret filtering for logs

pub mod elastic;
pub mod laplace;
pub mod sanitize;
pub mod sqlite;

pub use elastic::ElasticSource;
pub use laplace::LaplaceMechanism;
pub use sqlite::{SqliteStorage, StorageError};
