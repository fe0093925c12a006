//! Pipeline stages
//!
//! Each stage takes the survivors of the previous stage and returns a subset
//! of them, possibly annotated (scores, local fit, intelligence).
//!
//! # Stages
//! 1. `ValidationStage`: structural checks, local, free
//! 2. `StrategicScoringStage`: track scoring and promotion cut, local, free
//! 3. `LocalScoringStage`: geographic / focus fit, local, free, optional
//! 4. `EnrichmentBridgeStage`: external intelligence service, remote, costed
//!
//! Stages 2 and 3 run concurrently on the validation survivors.
//!
//! `StageExecutor` wraps a stage with timing, cost accounting, timeout and
//! failure policy so the orchestrator only ever sees survivors plus metrics.

pub mod enrichment_bridge;
pub mod executor;
pub mod local;
pub mod strategic;
pub mod validation;

pub use enrichment_bridge::EnrichmentBridgeStage;
pub use executor::{StageExecutor, StagePolicy};
pub use local::LocalScoringStage;
pub use strategic::StrategicScoringStage;
pub use validation::ValidationStage;

use crate::error::StageError;
use crate::enrichment::IntelligenceRecord;
use crate::types::{Candidate, RequesterProfile, ScoringResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Validation,
    StrategicScoring,
    LocalScoring,
    EnrichmentBridge,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Validation => "validation",
            StageName::StrategicScoring => "strategic_scoring",
            StageName::LocalScoring => "local_scoring",
            StageName::EnrichmentBridge => "enrichment_bridge",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Stage ran to completion
    Passed,
    /// Stage exceeded its timeout; no survivors
    Timeout,
    /// Service failure under fail-open; input passed through unchanged
    FailedOpen,
    /// Service failure under fail-closed; no survivors
    FailedClosed,
    /// Stage not invoked (disabled, or an earlier stage left nothing)
    Skipped,
}

/// Per-stage metrics recorded for every stage of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: StageName,
    pub candidates_in: usize,
    pub candidates_out: usize,
    pub elapsed_ms: u64,
    /// Cost units charged (0.0 for local stages)
    pub cost: f64,
    /// Fraction of inputs the stage processed without error (0.0-1.0)
    pub success_rate: f64,
    pub outcome: StageOutcome,
    #[serde(default)]
    pub error: Option<String>,
}

/// A candidate flowing through the stages, with whatever annotations the
/// stages so far have attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCandidate {
    pub candidate: Candidate,
    #[serde(default)]
    pub scoring: Option<ScoringResult>,
    /// Mean of geographic and focus alignment (0.0-1.0)
    #[serde(default)]
    pub local_fit: Option<f64>,
    #[serde(default)]
    pub intelligence: Option<IntelligenceRecord>,
}

impl PipelineCandidate {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            scoring: None,
            local_fit: None,
            intelligence: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

impl From<Candidate> for PipelineCandidate {
    fn from(candidate: Candidate) -> Self {
        Self::new(candidate)
    }
}

/// Priority order: promotion category desc, overall score desc, confidence
/// desc, candidate id asc. Unscored candidates sort last.
pub fn priority_order(a: &PipelineCandidate, b: &PipelineCandidate) -> Ordering {
    match (&a.scoring, &b.scoring) {
        (Some(x), Some(y)) => y
            .promotion_category
            .cmp(&x.promotion_category)
            .then_with(|| y.overall_score.total_cmp(&x.overall_score))
            .then_with(|| y.confidence_level.total_cmp(&x.confidence_level))
            .then_with(|| a.id().cmp(b.id())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id().cmp(b.id()),
    }
}

/// Result of a successful stage execution
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub survivors: Vec<PipelineCandidate>,
    /// Inputs processed without error (degraded scores, unparseable records
    /// and the like do not count)
    pub processed_ok: usize,
}

/// One step of the filtering pipeline
///
/// A stage never adds candidates: survivors are a subset of its input.
/// The executor enforces this regardless of the implementation.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Cost units charged per billable candidate when the stage is invoked
    fn cost_per_candidate(&self) -> f64 {
        0.0
    }

    /// Candidates out of `candidates_in` that the stage bills for
    fn billable_candidates(&self, candidates_in: usize) -> usize {
        candidates_in
    }

    /// Filter and annotate a batch of candidates
    ///
    /// # Errors
    /// - `StageError::Service` when an external dependency fails; the
    ///   executor applies the configured failure policy
    /// - `StageError::Timeout` when an external call timed out; no survivors
    /// - `StageError::Fatal` for unrecoverable errors; aborts the run
    async fn execute(
        &self,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
    ) -> Result<StageOutput, StageError>;
}
