//! Configuration for attack sources and query defaults.
//!
//! Configuration is built once at startup and passed explicitly into adapter
//! constructors; nothing below reads ambient state after that.
//!
//! Supported environment overrides:
//! - `ATTACKDP_ES_URL`, `ATTACKDP_ES_INDEX`, `ATTACKDP_ES_VERIFY_CERTS`, `ATTACKDP_ES_TIMEOUT_SECS`
//! - `ATTACKDP_ES_API_KEY_FILE` (preferred) or `ATTACKDP_ES_API_KEY`
//! - `ATTACKDP_DEST_PORT`, `ATTACKDP_EXCLUDE_PATTERN`, `ATTACKDP_MAX_RESULTS`
//! - `ATTACKDP_SQLITE_PATH`
//! - `ATTACKDP_DEFAULT_EPSILON`, `ATTACKDP_TOP_N`

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use zeroize::Zeroizing;

/// Errors raised while building configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot read API key file {}: {source}", path.display())]
    ApiKeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which attacks count towards a day's total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackFilter {
    /// Destination port under attack
    pub dest_port: u16,

    /// Source IPs matching this pattern (whole-string match) are ignored
    pub exclude_pattern: String,

    /// Maximum number of distinct source IPs returned per day
    pub max_results: usize,
}

impl Default for AttackFilter {
    fn default() -> Self {
        Self {
            dest_port: 22,
            exclude_pattern: r"139\.91\..*".to_string(),
            max_results: 10_000,
        }
    }
}

impl AttackFilter {
    /// Compile the exclude pattern with whole-string semantics.
    ///
    /// Elasticsearch `regexp` queries are implicitly anchored; the same
    /// anchoring is applied here so both backends agree.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` if the pattern does not compile.
    pub fn compile_exclude(&self) -> Result<Regex, ConfigError> {
        Regex::new(&format!("^(?:{})$", self.exclude_pattern)).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: self.exclude_pattern.clone(),
                source,
            }
        })
    }
}

/// Connection settings for the Elasticsearch attack log.
#[derive(Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub index: String,
    pub api_key: Option<Zeroizing<String>>,
    pub verify_certs: bool,
    pub timeout: Duration,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".to_string(),
            index: "logstash-*".to_string(),
            api_key: None,
            verify_certs: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticConfig")
            .field("url", &self.url)
            .field("index", &self.index)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("verify_certs", &self.verify_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Location of the local SQLite attack log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("attackdp.db"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub elastic: ElasticConfig,
    pub sqlite: SqliteConfig,
    pub filter: AttackFilter,

    /// Epsilon used when the caller does not pick one
    pub default_epsilon: f64,

    /// Contributors listed in debug output
    pub top_n: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            elastic: ElasticConfig::default(),
            sqlite: SqliteConfig::default(),
            filter: AttackFilter::default(),
            default_epsilon: 1.0,
            top_n: 5,
        }
    }
}

impl AppConfig {
    /// Load config overrides from the process environment.
    ///
    /// # Errors
    /// Returns error if the exclude pattern is invalid or an API key file
    /// was named but cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config overrides through an arbitrary key lookup.
    ///
    /// Malformed numeric or boolean values are ignored with a warning
    /// (best-effort), keeping the default.
    ///
    /// # Errors
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("ATTACKDP_ES_URL") {
            cfg.elastic.url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ATTACKDP_ES_INDEX") {
            cfg.elastic.index = v;
        }
        if let Some(v) = get("ATTACKDP_ES_VERIFY_CERTS") {
            match parse_bool(&v) {
                Some(b) => cfg.elastic.verify_certs = b,
                None => tracing::warn!("Ignoring malformed ATTACKDP_ES_VERIFY_CERTS={v}"),
            }
        }
        if let Some(secs) = parse_num::<u64>(&get, "ATTACKDP_ES_TIMEOUT_SECS").filter(|&s| s > 0) {
            cfg.elastic.timeout = Duration::from_secs(secs);
        }

        if let Some(path) = get("ATTACKDP_ES_API_KEY_FILE") {
            let path = PathBuf::from(path);
            let content = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::ApiKeyFile { path: path.clone(), source })?;
            let key = content.trim_end_matches(['\n', '\r']).to_string();
            if !key.is_empty() {
                cfg.elastic.api_key = Some(Zeroizing::new(key));
            }
        } else if let Some(key) = get("ATTACKDP_ES_API_KEY") {
            cfg.elastic.api_key = Some(Zeroizing::new(key));
        }

        if let Some(port) = parse_num::<u16>(&get, "ATTACKDP_DEST_PORT") {
            cfg.filter.dest_port = port;
        }
        if let Some(v) = get("ATTACKDP_EXCLUDE_PATTERN") {
            cfg.filter.exclude_pattern = v;
        }
        if let Some(n) = parse_num::<usize>(&get, "ATTACKDP_MAX_RESULTS").filter(|&n| n > 0) {
            cfg.filter.max_results = n;
        }

        if let Some(v) = get("ATTACKDP_SQLITE_PATH") {
            cfg.sqlite.path = PathBuf::from(v);
        }

        if let Some(eps) =
            parse_num::<f64>(&get, "ATTACKDP_DEFAULT_EPSILON").filter(|e| e.is_finite() && *e > 0.0)
        {
            cfg.default_epsilon = eps;
        }
        if let Some(n) = parse_num::<usize>(&get, "ATTACKDP_TOP_N") {
            cfg.top_n = n;
        }

        // Fail fast on a bad pattern rather than on the first query.
        cfg.filter.compile_exclude()?;

        Ok(cfg)
    }
}

fn parse_num<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring malformed {key}={raw}");
            None
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).expect("defaults are valid");

        assert_eq!(cfg.filter.dest_port, 22);
        assert_eq!(cfg.filter.max_results, 10_000);
        assert_eq!(cfg.elastic.index, "logstash-*");
        assert_eq!(cfg.default_epsilon, 1.0);
        assert_eq!(cfg.top_n, 5);
        assert!(cfg.elastic.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("ATTACKDP_ES_URL", "https://es.internal:9200/"),
            ("ATTACKDP_ES_VERIFY_CERTS", "false"),
            ("ATTACKDP_ES_API_KEY", "abc123"),
            ("ATTACKDP_DEST_PORT", "2222"),
            ("ATTACKDP_DEFAULT_EPSILON", "0.5"),
            ("ATTACKDP_TOP_N", "10"),
        ]))
        .expect("valid overrides");

        assert_eq!(cfg.elastic.url, "https://es.internal:9200");
        assert!(!cfg.elastic.verify_certs);
        assert_eq!(cfg.elastic.api_key.as_deref().map(String::as_str), Some("abc123"));
        assert_eq!(cfg.filter.dest_port, 2222);
        assert_eq!(cfg.default_epsilon, 0.5);
        assert_eq!(cfg.top_n, 10);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("ATTACKDP_DEST_PORT", "ssh"),
            ("ATTACKDP_DEFAULT_EPSILON", "-3"),
            ("ATTACKDP_ES_VERIFY_CERTS", "maybe"),
        ]))
        .expect("malformed values are ignored");

        assert_eq!(cfg.filter.dest_port, 22);
        assert_eq!(cfg.default_epsilon, 1.0);
        assert!(cfg.elastic.verify_certs);
    }

    #[test]
    fn test_invalid_pattern_is_hard_error() {
        let err = AppConfig::from_lookup(lookup(&[("ATTACKDP_EXCLUDE_PATTERN", "10\\.(")]))
            .expect_err("unbalanced group must fail");
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_exclude_pattern_is_anchored() {
        let re = AttackFilter::default().compile_exclude().expect("default compiles");
        assert!(re.is_match("139.91.4.7"));
        assert!(!re.is_match("10.139.91.4"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let cfg = ElasticConfig {
            api_key: Some(Zeroizing::new("super-secret".to_string())),
            ..ElasticConfig::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
