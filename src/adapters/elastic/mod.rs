//! Elasticsearch adapter: Implementation of AttackSource.
//!
//! Counts attacks per source IP for one day with a single terms aggregation
//! over the logstash indices. No documents are returned (`size: 0`); only the
//! aggregation buckets are read.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{AttackFilter, ElasticConfig};
use crate::domain::PerIpCounts;
use crate::ports::{AttackSource, FetchError};

/// Elasticsearch 8 compatibility media type.
const ES8_MEDIA_TYPE: &str = "application/vnd.elasticsearch+json; compatible-with=8";

/// Maximum number of response body bytes kept in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    aggregations: Aggregations,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    attacking_ips: TermsAggregation,
}

#[derive(Debug, Deserialize)]
struct TermsAggregation {
    buckets: Vec<Bucket>,

    /// Documents from IPs beyond the `size` cutoff
    #[serde(default)]
    sum_other_doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    key: String,
    doc_count: u64,
}

/// Elasticsearch attack log adapter.
pub struct ElasticSource {
    client: Client,
    search_url: String,
    filter: AttackFilter,
}

impl ElasticSource {
    /// Build an adapter from explicit connection settings.
    ///
    /// # Errors
    /// Returns `FetchError::Misconfigured` if the API key is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(config: &ElasticConfig, filter: AttackFilter) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ES8_MEDIA_TYPE));
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("ApiKey {}", key.as_str()))
                .map_err(|_| {
                    FetchError::Misconfigured("API key is not a valid header value".to_string())
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if !config.verify_certs {
            tracing::warn!("TLS certificate verification disabled for Elasticsearch");
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| FetchError::Misconfigured(e.to_string()))?;

        Ok(Self {
            client,
            search_url: search_url(config),
            filter,
        })
    }
}

impl AttackSource for ElasticSource {
    fn fetch_counts(&self, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
        let body = build_search_body(date, &self.filter)?;
        let payload =
            serde_json::to_vec(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let response = self
            .client
            .post(&self.search_url)
            .header(CONTENT_TYPE, ES8_MEDIA_TYPE)
            .body(payload)
            .send()
            .map_err(|e| {
                tracing::error!("Elasticsearch request failed: {e}");
                FetchError::Unreachable(e.without_url().to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        if !status.is_success() {
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(FetchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let counts = parse_search_response(&text, date)?;
        tracing::debug!("Loaded {} source IPs for {date} from Elasticsearch", counts.len());
        Ok(counts)
    }
}

fn search_url(config: &ElasticConfig) -> String {
    format!(
        "{}/{}/_search",
        config.url.trim_end_matches('/'),
        config.index.trim_matches('/')
    )
}

/// Build the aggregation query for the UTC day `[date, date + 1)`.
fn build_search_body(date: NaiveDate, filter: &AttackFilter) -> Result<Value, FetchError> {
    let next = date.succ_opt().ok_or(FetchError::DateOutOfRange(date))?;
    let start = format!("{}T00:00:00", date.format("%Y-%m-%d"));
    let end = format!("{}T00:00:00", next.format("%Y-%m-%d"));

    Ok(json!({
        "size": 0,
        "query": {
            "bool": {
                "filter": [
                    { "term": { "dest_port": filter.dest_port } },
                    { "range": { "@timestamp": { "gte": start, "lt": end } } }
                ],
                "must_not": [
                    { "regexp": { "src_ip.keyword": filter.exclude_pattern } }
                ]
            }
        },
        "aggs": {
            "attacking_ips": {
                "terms": {
                    "field": "src_ip.keyword",
                    "size": filter.max_results,
                    "order": { "_count": "desc" }
                }
            }
        }
    }))
}

fn parse_search_response(text: &str, date: NaiveDate) -> Result<PerIpCounts, FetchError> {
    let response: SearchResponse =
        serde_json::from_str(text).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
    let terms = response.aggregations.attacking_ips;

    if terms.sum_other_doc_count > 0 {
        tracing::warn!(
            "Per-IP result limit reached for {date}; {} attacks from remaining IPs dropped",
            terms.sum_other_doc_count
        );
    }

    Ok(terms.buckets.into_iter().map(|b| (b.key, b.doc_count)).collect())
}
