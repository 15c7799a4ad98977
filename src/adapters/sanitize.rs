//! Log sanitization for source IPs and secrets.
//!
//! Source IP addresses are exactly the identities the noise protects, so they
//! must never reach a log sink in clear text. This module provides
//! string-based redaction applied to formatted log output, covering:
//! - IPv4 addresses
//! - IPv6 addresses
//! - Elasticsearch API keys and bearer tokens
//! - Contextual secrets (`api_key=...`, `password: ...`)
//!
//! # Important: prefer not logging identities at all
//!
//! Sanitizing strings is a fallback. Call sites should log aggregate values
//! only; this writer catches what slips through.
//!
//! # Performance / DoS
//!
//! `sanitize()` enforces a maximum input size (see
//! `ATTACKDP_SANITIZE_MAX_BYTES`) to bound the cost of very large lines.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

/// Compiled redaction patterns.
static REDACTION_PATTERNS: OnceLock<RedactionPatterns> = OnceLock::new();

/// Maximum number of bytes to sanitize per call.
///
/// Defaults to 16 KiB; can be overridden via `ATTACKDP_SANITIZE_MAX_BYTES`.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// A compiled pattern with its replacement text.
struct RedactionPattern {
    regex: Regex,
    replacement: &'static str,
}

struct RedactionPatterns {
    set: RegexSet,
    patterns: Vec<RedactionPattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("ATTACKDP_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static RedactionPatterns {
    REDACTION_PATTERNS.get_or_init(|| {
        // Order matters: secrets first so a key that happens to contain an
        // address-like run is redacted as a whole.
        let rules: Vec<(&'static str, &'static str)> = vec![
            // Authorization header values
            (
                r"(?i)\b(?:ApiKey|Bearer|Basic)\s+[A-Za-z0-9+/._=-]{8,}",
                "[REDACTED-CREDENTIAL]",
            ),
            // Contextual secrets
            (
                r"(?i)\b(?:api[_-]?key|access[_-]?token|secret|password|passwd|token)\b\s*[:=]\s*\S{8,}",
                "[REDACTED-SECRET]",
            ),
            // IPv4, optionally with a port
            (
                r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b(?::[0-9]{1,5})?",
                "[REDACTED-IP]",
            ),
            // IPv6 (full and compressed forms)
            (
                r"(?i)(?:\b[0-9a-f]{1,4}:){7}[0-9a-f]{1,4}\b|(?:\b[0-9a-f]{1,4}:){1,6}(?::[0-9a-f]{1,4}){1,6}\b|::(?:[0-9a-f]{1,4}:){0,6}[0-9a-f]{1,4}\b|(?:\b[0-9a-f]{1,4}:){1,7}:",
                "[REDACTED-IP]",
            ),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let patterns = rules
            .into_iter()
            .map(|(pattern, replacement)| RedactionPattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        RedactionPatterns { set, patterns }
    })
}

/// Sanitize a string by redacting IP addresses and secrets.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();

    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    // Fast path: single scan for "any match".
    let matched: Vec<usize> = patterns.set.matches(prefix).into_iter().collect();
    let mut result = prefix.to_string();
    for idx in matched {
        let pattern = &patterns.patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .to_string();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains an IP address or secret.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let (prefix, _truncated) = truncate_to_char_boundary(input, max_sanitize_bytes());
    get_patterns().set.is_match(prefix)
}

/// A `tracing_subscriber` writer wrapper that sanitizes formatted log output
/// before it is written to the underlying sink.
///
/// This keeps sanitization centralized (no need to call `sanitize()` at every
/// callsite). It is still defense-in-depth: prefer structured logging and
/// redaction-by-type to avoid sensitive data entering formatted strings.
#[derive(Debug)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M> Clone for SanitizingMakeWriter<M>
where
    M: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let line_str = String::from_utf8_lossy(&line);
            let sanitized = sanitize(&line_str);
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // Prevent unbounded buffering if the formatter writes a huge line with no newlines.
        // We fall back to lossy UTF-8 conversion; `sanitize()` will also cap the output.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if hard_cap > 0 && self.buffer.len() > hard_cap {
            let s = String::from_utf8_lossy(&self.buffer).to_string();
            let sanitized = sanitize(&s);
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n[TRUNCATED]\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;

        if !self.buffer.is_empty() {
            let s = String::from_utf8_lossy(&self.buffer);
            let sanitized = sanitize(&s);
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }

        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_ipv4() {
        let sanitized = sanitize("top contributor 203.0.113.5 with 500 attacks");
        assert!(sanitized.contains("[REDACTED-IP]"));
        assert!(!sanitized.contains("203.0.113.5"));
        assert!(sanitized.contains("500 attacks"));
    }

    #[test]
    fn test_sanitize_ipv4_with_port() {
        let sanitized = sanitize("connect to 10.0.0.1:9200 failed");
        assert_eq!(sanitized, "connect to [REDACTED-IP] failed");
    }

    #[test]
    fn test_sanitize_ipv6() {
        for input in [
            "src=2001:db8:85a3::8a2e:370:7334",
            "src=fe80::1",
            "src=2001:0db8:0000:0000:0000:ff00:0042:8329",
        ] {
            let sanitized = sanitize(input);
            assert_eq!(sanitized, "src=[REDACTED-IP]", "{input}");
        }
    }

    #[test]
    fn test_sanitize_api_key_header() {
        let sanitized = sanitize("Authorization: ApiKey UkhBVUVaTUJCZktQZkpUUENMWmw6V2xtcXN0");
        assert!(sanitized.contains("[REDACTED-CREDENTIAL]"));
        assert!(!sanitized.contains("UkhBVUVa"));
    }

    #[test]
    fn test_sanitize_contextual_secret() {
        let sanitized = sanitize("api_key=QWxhZGRpbjpvcGVuIHNlc2FtZQ");
        assert!(sanitized.contains("[REDACTED-SECRET]"));
    }

    #[test]
    fn test_leaves_ordinary_log_lines_alone() {
        let line = "2025-01-15T10:30:45.123456Z  INFO attackdp::application::query: date=2025-01-15 epsilon=1 noisy_count=712";
        assert_eq!(sanitize(line), line);
        assert!(!contains_sensitive(line));
    }

    #[test]
    fn test_contains_sensitive() {
        assert!(contains_sensitive("ip 192.0.2.44"));
        assert!(contains_sensitive("password: hunter22hunter22"));
        assert!(!contains_sensitive("Just normal log text"));
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("prefix 192.0.2.1 suffix that is long", 16);
        assert!(sanitized.ends_with(" [TRUNCATED]"));
    }

    #[test]
    fn test_writer_sanitizes_lines() {
        use std::io::Write;

        let mut writer = SanitizingWriter::new(Vec::new());
        writer.write_all(b"first 198.51.100.7\nsecond ").expect("write");
        writer.write_all(b"line\n").expect("write");
        writer.flush().expect("flush");

        let out = String::from_utf8(writer.inner).expect("utf8");
        assert_eq!(out, "first [REDACTED-IP]\nsecond line\n");
    }
}
