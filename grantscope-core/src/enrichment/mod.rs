//! External enrichment (intelligence) service contract
//!
//! The enrichment service receives batches of candidates together with the
//! requester context and returns one outcome per candidate: a structured
//! intelligence record, or an explicit failure / parse-error marker.
//!
//! `HttpEnrichmentClient` is the production adapter; tests substitute their
//! own `EnrichmentService` implementations.

pub mod client;

pub use client::{EnrichmentClientConfig, HttpEnrichmentClient};

use crate::error::EnrichmentError;
use crate::types::{Candidate, RequesterProfile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action suggested by the enrichment service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Pursue,
    Monitor,
    Decline,
}

/// Structured intelligence about one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceRecord {
    pub candidate_id: String,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub summary: String,
    /// Service's own fit estimate (0.0-1.0), if it gives one
    #[serde(default)]
    pub fit_estimate: Option<f64>,
    #[serde(default)]
    pub estimated_award: Option<f64>,
    #[serde(default)]
    pub application_deadline: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Per-candidate result of an enrichment call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntelligenceOutcome {
    Record(IntelligenceRecord),
    Failed { candidate_id: String, reason: String },
    ParseError { candidate_id: String, raw: String },
}

impl IntelligenceOutcome {
    pub fn candidate_id(&self) -> &str {
        match self {
            IntelligenceOutcome::Record(record) => &record.candidate_id,
            IntelligenceOutcome::Failed { candidate_id, .. } => candidate_id,
            IntelligenceOutcome::ParseError { candidate_id, .. } => candidate_id,
        }
    }
}

/// Response to one `submit` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub records: Vec<IntelligenceOutcome>,
}

/// Requester context sent with every batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentContext {
    pub batch_id: Uuid,
    pub profile: RequesterProfile,
}

impl EnrichmentContext {
    pub fn new(batch_id: Uuid, profile: &RequesterProfile) -> Self {
        Self {
            batch_id,
            profile: profile.clone(),
        }
    }
}

/// External intelligence service
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Service name for logging
    fn name(&self) -> &str;

    /// Declared cost units per submitted candidate
    fn cost_per_candidate(&self) -> f64;

    /// Submit a batch of candidates
    ///
    /// # Errors
    /// Returns `EnrichmentError` when the call as a whole fails (network,
    /// status, unreadable body). Per-candidate problems are reported as
    /// `Failed` / `ParseError` outcomes instead.
    async fn submit(
        &self,
        batch: &[Candidate],
        context: &EnrichmentContext,
    ) -> Result<EnrichmentResponse, EnrichmentError>;
}
