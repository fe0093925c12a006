//! Error types for grantscope-core
//!
//! Severity ladder, lowest first:
//! - `DimensionScoringError`: one dimension of one candidate; recovered with the
//!   neutral score and a confidence penalty
//! - `ScoringError`: one candidate; recovered with a degraded `ScoringResult`
//!   (except `UnknownTrack` / `InvalidTrackConfiguration`, which are configuration errors)
//! - `StageError`: one stage; recovered by the executor (timeout, fail-open / fail-closed)
//! - `PipelineError`: aborts the run

use crate::stages::{StageMetrics, StageName};
use crate::tracks::Dimension;
use thiserror::Error;
use uuid::Uuid;

/// Scoring error for a single candidate or for the track configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    /// Track identifier outside the closed set
    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    /// Track configuration violates an invariant (weights, band, thresholds)
    #[error("Invalid track configuration: {0}")]
    InvalidTrackConfiguration(String),

    /// No dimension could be scored from the candidate's data
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Aggregation produced NaN or infinity
    #[error("Non-finite score: {0}")]
    NonFiniteScore(String),
}

/// Failure to score one dimension (malformed, not missing, data)
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Dimension {dimension} could not be scored: {reason}")]
pub struct DimensionScoringError {
    pub dimension: Dimension,
    pub reason: String,
}

impl DimensionScoringError {
    pub fn new(dimension: Dimension, reason: impl Into<String>) -> Self {
        Self {
            dimension,
            reason: reason.into(),
        }
    }
}

/// External enrichment service error
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Service returned an error status
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request exceeded the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Client misconfiguration (missing key, bad endpoint)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error raised by a stage implementation
#[derive(Debug, Error)]
pub enum StageError {
    /// Stage exceeded its configured timeout
    #[error("Stage timed out after {0} ms")]
    Timeout(u64),

    /// External dependency failed; handled by the stage's failure policy
    #[error("Stage service error: {0}")]
    Service(String),

    /// Unrecoverable internal error; aborts the pipeline run
    #[error("Fatal stage error: {0}")]
    Fatal(String),
}

impl StageError {
    /// Stage error for a failed enrichment call
    ///
    /// A timed-out call becomes `Timeout(timeout_ms)` so the executor records
    /// the stage as timed out instead of applying the failure policy.
    pub fn from_enrichment(err: EnrichmentError, timeout_ms: u64) -> Self {
        match err {
            EnrichmentError::Timeout(_) => StageError::Timeout(timeout_ms),
            other => StageError::Service(other.to_string()),
        }
    }
}

/// Persistence error
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database directory could not be created
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error that aborts a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage reported an unrecoverable error
    #[error("Stage {stage} failed fatally: {message}")]
    Fatal { stage: StageName, message: String },
}

/// Fatal pipeline failure surfaced to the caller with the metrics of the
/// stages that completed before the failure
#[derive(Debug, Error)]
#[error("Pipeline run {batch_id} failed: {source}")]
pub struct PipelineFatalError {
    pub batch_id: Uuid,
    pub completed_stages: Vec<StageMetrics>,
    #[source]
    pub source: PipelineError,
}
