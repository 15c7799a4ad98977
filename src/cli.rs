//! Command-line arguments for the `attackdp` binary.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about = "Differentially private daily attack counts", long_about = None)]
pub struct Cli {
    /// Show true counts, noise and top attackers alongside the DP result
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Set the logging level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Release the DP attack count for one day
    Query(QueryArgs),
    /// Print the raw per-IP counts for one day (operator use only)
    Fetch(FetchArgs),
    /// Record an attack event in the local SQLite log
    Record(RecordArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Elastic,
    Sqlite,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Day to query (YYYY-MM-DD, UTC)
    #[arg(value_parser = parse_date)]
    pub date: NaiveDate,

    /// Privacy budget; smaller means more noise (defaults to ATTACKDP_DEFAULT_EPSILON or 1.0)
    #[arg(short, long)]
    pub epsilon: Option<f64>,

    /// Attack log backend
    #[arg(short, long, value_enum, default_value_t = Backend::Elastic)]
    pub backend: Backend,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Day to fetch (YYYY-MM-DD, UTC)
    #[arg(value_parser = parse_date)]
    pub date: NaiveDate,

    /// Attack log backend
    #[arg(short, long, value_enum, default_value_t = Backend::Elastic)]
    pub backend: Backend,

    /// Number of top attackers to list
    #[arg(short = 'n', long, default_value_t = 5)]
    pub top: usize,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Source IP of the attack
    pub ip: String,

    /// Destination port (defaults to the configured port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Time of the attack (RFC 3339); defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<DateTime<Utc>>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format: {s}. Use YYYY-MM-DD"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp {s}: {e}"))
}
