//! SQLite adapter: Implementation of AttackSource.
//!
//! Provides a local attack log for offline use and tests. Each row is one
//! observed attack event; per-IP daily counts are derived at query time.
//!
//! # Mutex Behavior
//!
//! The connection is protected by `Mutex`. A poisoned mutex is reported as a
//! `FetchError::Storage` rather than a panic, so a failed query can never be
//! mistaken for an empty day.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, Connection};

use crate::config::{AttackFilter, ConfigError};
use crate::domain::PerIpCounts;
use crate::ports::{AttackSource, FetchError};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid attack record: {0}")]
    InvalidRecord(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl From<StorageError> for FetchError {
    fn from(e: StorageError) -> Self {
        FetchError::Storage(e.to_string())
    }
}

/// SQLite attack log adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    filter: AttackFilter,
    exclude: Regex,
}

impl SqliteStorage {
    /// Open (or create) the attack log at `path`.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or the exclude pattern
    /// does not compile.
    pub fn new<P: AsRef<Path>>(path: P, filter: AttackFilter) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?, filter)
    }

    /// Create an in-memory attack log (for testing).
    ///
    /// # Errors
    /// Returns error if the database cannot be created.
    pub fn in_memory(filter: AttackFilter) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, filter)
    }

    fn with_connection(conn: Connection, filter: AttackFilter) -> Result<Self, StorageError> {
        let exclude = filter.compile_exclude()?;
        let storage = Self {
            conn: Mutex::new(conn),
            filter,
            exclude,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS attack_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                src_ip TEXT NOT NULL,
                dest_port INTEGER NOT NULL,
                occurred_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attack_events_time
                ON attack_events(occurred_at, dest_port);
            ",
        )?;

        Ok(())
    }

    /// Record one attack event.
    ///
    /// # Errors
    /// Returns error if the IP is empty or the insert fails.
    pub fn record_attack(
        &self,
        src_ip: &str,
        dest_port: u16,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let src_ip = src_ip.trim();
        if src_ip.is_empty() {
            return Err(StorageError::InvalidRecord("empty source IP".to_string()));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO attack_events (src_ip, dest_port, occurred_at) VALUES (?1, ?2, ?3)",
            params![src_ip, dest_port, timestamp(occurred_at)],
        )?;

        tracing::debug!("Recorded attack event on port {dest_port}");
        Ok(())
    }

    /// Count all stored events (any day, any port).
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count_events(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM attack_events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn query_day(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
        let start = date.and_hms_opt(0, 0, 0).ok_or(FetchError::DateOutOfRange(date))?;
        let end = date
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .ok_or(FetchError::DateOutOfRange(date))?;

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                r"
                SELECT src_ip, COUNT(*) AS attacks
                FROM attack_events
                WHERE dest_port = ?1 AND occurred_at >= ?2 AND occurred_at < ?3
                GROUP BY src_ip
                ORDER BY attacks DESC, src_ip ASC
                ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(
                params![
                    self.filter.dest_port,
                    timestamp(start.and_utc()),
                    timestamp(end.and_utc()),
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(StorageError::from)?;

        let mut counts = PerIpCounts::new();
        for row in rows {
            let (ip, attacks) = row.map_err(StorageError::from)?;
            if self.exclude.is_match(&ip) {
                continue;
            }
            if counts.len() >= self.filter.max_results {
                tracing::warn!(
                    "Per-IP result limit ({}) reached for {date}; remaining IPs dropped",
                    self.filter.max_results
                );
                break;
            }
            counts.add(ip, u64::try_from(attacks).unwrap_or(0));
        }

        Ok(counts)
    }
}

impl AttackSource for SqliteStorage {
    fn fetch_counts(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
        let counts = self.query_day(date)?;
        tracing::debug!("Loaded {} source IPs for {date} from SQLite", counts.len());
        Ok(counts)
    }
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
