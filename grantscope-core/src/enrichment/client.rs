//! HTTP Enrichment Client
//!
//! Posts candidate batches to the intelligence service and maps the reply to
//! one `IntelligenceOutcome` per submitted candidate.
//!
//! # Wire Format
//! Request: `POST {endpoint}` with bearer key and JSON body
//! `{"candidates": [...], "context": {...}}`
//!
//! Response: `{"records": [...]}` where each entry is a tagged outcome
//! (`status`: `record` | `failed` | `parse_error`). Entries that do not parse
//! become `ParseError` markers; candidates missing from the reply become
//! `Failed` markers. Only an unreadable body fails the whole call.
//!
//! # Rate Limiting
//! Token bucket (governor), `requests_per_minute` per client instance.

use super::{EnrichmentContext, EnrichmentResponse, EnrichmentService, IntelligenceOutcome};
use crate::error::EnrichmentError;
use crate::types::Candidate;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use grantscope_common::config::EnrichmentSection;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("grantscope/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for `HttpEnrichmentClient`
#[derive(Debug, Clone)]
pub struct EnrichmentClientConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub cost_per_candidate: f64,
    pub requests_per_minute: u32,
}

impl EnrichmentClientConfig {
    /// Build from the `[enrichment]` TOML section and a resolved API key
    pub fn from_section(section: &EnrichmentSection, api_key: String) -> Self {
        Self {
            endpoint: section.endpoint.clone(),
            api_key,
            timeout: Duration::from_secs(section.timeout_secs),
            cost_per_candidate: section.cost_per_candidate,
            requests_per_minute: section.requests_per_minute,
        }
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    candidates: &'a [Candidate],
    context: &'a EnrichmentContext,
}

#[derive(Deserialize)]
struct SubmitReply {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

/// Enrichment service over HTTP
pub struct HttpEnrichmentClient {
    client: Client,
    endpoint: String,
    api_key: String,
    cost_per_candidate: f64,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpEnrichmentClient {
    /// Create a client
    ///
    /// # Errors
    /// `EnrichmentError::Config` for an empty endpoint or key, a zero rate
    /// limit, or an HTTP client that cannot be built
    pub fn new(config: EnrichmentClientConfig) -> Result<Self, EnrichmentError> {
        if config.endpoint.trim().is_empty() {
            return Err(EnrichmentError::Config("endpoint is empty".to_string()));
        }
        if config.api_key.trim().is_empty() {
            return Err(EnrichmentError::Config("API key is empty".to_string()));
        }
        let per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            EnrichmentError::Config("requests_per_minute must be greater than zero".to_string())
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EnrichmentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            cost_per_candidate: config.cost_per_candidate,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }
}

#[async_trait]
impl EnrichmentService for HttpEnrichmentClient {
    fn name(&self) -> &str {
        "http-enrichment"
    }

    fn cost_per_candidate(&self) -> f64 {
        self.cost_per_candidate
    }

    async fn submit(
        &self,
        batch: &[Candidate],
        context: &EnrichmentContext,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        self.rate_limiter.until_ready().await;

        debug!(
            endpoint = %self.endpoint,
            batch_size = batch.len(),
            batch_id = %context.batch_id,
            "Submitting enrichment batch"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SubmitRequest {
                candidates: batch,
                context,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichmentError::Timeout(e.to_string())
                } else {
                    EnrichmentError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EnrichmentError::Network(format!("failed to read response body: {}", e)))?;

        parse_reply(&body, batch)
    }
}

/// Map a reply body to one outcome per submitted candidate
///
/// Outcomes for ids that were not submitted are dropped.
pub fn parse_reply(body: &str, batch: &[Candidate]) -> Result<EnrichmentResponse, EnrichmentError> {
    let reply: SubmitReply = serde_json::from_str(body)
        .map_err(|e| EnrichmentError::Parse(format!("response is not valid JSON: {}", e)))?;

    let submitted: HashSet<&str> = batch.iter().map(|c| c.id.as_str()).collect();
    let mut answered: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(batch.len());

    for value in reply.records {
        let outcome = match serde_json::from_value::<IntelligenceOutcome>(value.clone()) {
            Ok(outcome) => outcome,
            Err(_) => IntelligenceOutcome::ParseError {
                candidate_id: value
                    .get("candidate_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                raw: value.to_string(),
            },
        };

        let id = outcome.candidate_id();
        if !submitted.contains(id) || !answered.insert(id.to_string()) {
            debug!(candidate_id = %id, "Ignoring unexpected enrichment record");
            continue;
        }
        records.push(outcome);
    }

    for candidate in batch {
        if !answered.contains(&candidate.id) {
            records.push(IntelligenceOutcome::Failed {
                candidate_id: candidate.id.clone(),
                reason: "no record returned".to_string(),
            });
        }
    }

    Ok(EnrichmentResponse { records })
}
