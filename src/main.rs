//! attackdp: differentially private daily attack counts.
//!
//! Main entry point for the command-line front end.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use attackdp::adapters::sanitize::SanitizingMakeWriter;
use attackdp::adapters::{ElasticSource, SqliteStorage};
use attackdp::config::AppConfig;
use attackdp::domain::top_contributors;
use attackdp::ports::AttackSource;
use attackdp::QueryService;

use cli::{Backend, Cli, Commands, FetchArgs, QueryArgs, RecordArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs never go to stdout, which carries results.
    let log_mode = std::env::var("ATTACKDP_LOG_MODE").unwrap_or_else(|_| "auto".to_string());
    let log_file = std::env::var("ATTACKDP_LOG_FILE").ok();

    let (writer, _guard) = if use_log_file(&log_mode, log_file.is_some()) {
        let log_file = log_file.unwrap_or_else(|| "attackdp.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("cannot open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!("Loaded configuration: {config:?}");

    match cli.command {
        Commands::Query(args) => run_query(&config, args, cli.debug),
        Commands::Fetch(args) => run_fetch(&config, args),
        Commands::Record(args) => run_record(&config, args),
    }
}

/// `file` and `stderr` are explicit; `auto` (or anything else) logs to a
/// file only when `ATTACKDP_LOG_FILE` names one.
fn use_log_file(mode: &str, log_file_set: bool) -> bool {
    match mode {
        "file" => true,
        "stderr" => false,
        // auto
        _ => log_file_set,
    }
}

fn open_source(config: &AppConfig, backend: Backend) -> Result<Box<dyn AttackSource>> {
    Ok(match backend {
        Backend::Elastic => Box::new(
            ElasticSource::new(&config.elastic, config.filter.clone())
                .context("cannot build Elasticsearch client")?,
        ),
        Backend::Sqlite => Box::new(open_sqlite(config)?),
    })
}

fn open_sqlite(config: &AppConfig) -> Result<SqliteStorage> {
    SqliteStorage::new(&config.sqlite.path, config.filter.clone()).with_context(|| {
        format!("cannot open attack log {}", config.sqlite.path.display())
    })
}

fn run_query(config: &AppConfig, args: QueryArgs, debug: bool) -> Result<()> {
    if debug {
        tracing::warn!("Debug mode: true counts and top attackers will be shown");
    }

    let epsilon = args.epsilon.unwrap_or(config.default_epsilon);
    let service = QueryService::with_top_n(open_source(config, args.backend)?, config.top_n);

    let presentation = service
        .run_query(args.date, epsilon, debug)
        .with_context(|| format!("query for {} failed", args.date))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&presentation)?);
    } else {
        println!("{presentation}");
    }
    Ok(())
}

fn run_fetch(config: &AppConfig, args: FetchArgs) -> Result<()> {
    let service = QueryService::new(open_source(config, args.backend)?);
    let counts = service
        .raw_counts(args.date)
        .with_context(|| format!("fetch for {} failed", args.date))?;

    println!("Found {} attacking IPs", counts.len());
    println!("Total attacks: {}", counts.total());

    let top = top_contributors(&counts, args.top);
    if !top.is_empty() {
        println!("\nTop {} attackers:", top.len());
        for (rank, c) in top.iter().enumerate() {
            println!("  {}. {}: {} attacks", rank + 1, c.ip, c.count);
        }
    }
    Ok(())
}

fn run_record(config: &AppConfig, args: RecordArgs) -> Result<()> {
    let storage = open_sqlite(config)?;
    let port = args.port.unwrap_or(config.filter.dest_port);
    let at = args.at.unwrap_or_else(chrono::Utc::now);

    storage
        .record_attack(&args.ip, port, at)
        .context("cannot record attack")?;

    tracing::info!("Recorded attack on port {port} at {at}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_destination() {
        assert!(use_log_file("file", false));
        assert!(!use_log_file("stderr", true));
        assert!(use_log_file("auto", true));
        assert!(!use_log_file("auto", false));
        assert!(!use_log_file("bogus", false));
    }
}
