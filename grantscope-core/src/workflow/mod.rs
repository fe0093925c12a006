//! Pipeline workflow
//!
//! Drives a batch of discovered candidates through the stages and produces a
//! `PipelineRun` report:
//!
//! ```text
//! validation → strategic_scoring ∥ local_scoring → enrichment_bridge → done
//! ```
//!
//! Progress is reported through optional `PipelineEvent`s.

pub mod orchestrator;

pub use orchestrator::PipelineOrchestrator;

use crate::enrichment::IntelligenceRecord;
use crate::stages::{PipelineCandidate, StageMetrics, StageName};
use crate::tracks::TrackId;
use crate::types::PromotionCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every stage ran or was skipped; survivors may be empty
    Completed,
    /// A stage failed fatally; only stored, never returned from `run`
    Failed,
}

/// A surviving candidate in final priority order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedCandidate {
    /// 1-based position in the final list
    pub rank: usize,
    pub candidate_id: String,
    pub organization_name: String,
    pub track: TrackId,
    pub promotion_category: PromotionCategory,
    pub overall_score: f64,
    pub confidence_level: f64,
    pub revenue_compatibility: f64,
    #[serde(default)]
    pub local_fit: Option<f64>,
    #[serde(default)]
    pub intelligence: Option<IntelligenceRecord>,
}

impl PrioritizedCandidate {
    /// `None` for a candidate that was never scored
    pub fn from_survivor(rank: usize, pc: PipelineCandidate) -> Option<Self> {
        let scoring = pc.scoring?;
        Some(Self {
            rank,
            candidate_id: pc.candidate.id,
            organization_name: pc.candidate.organization_name,
            track: scoring.track,
            promotion_category: scoring.promotion_category,
            overall_score: scoring.overall_score,
            confidence_level: scoring.confidence_level,
            revenue_compatibility: scoring.revenue_compatibility,
            local_fit: pc.local_fit,
            intelligence: pc.intelligence,
        })
    }
}

/// Report of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub batch_id: Uuid,
    pub profile_id: String,
    pub status: PipelineStatus,
    /// One entry per stage, in pipeline order (skipped stages included)
    pub stage_metrics: Vec<StageMetrics>,
    pub prioritized: Vec<PrioritizedCandidate>,
    pub total_cost: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn metrics_for(&self, stage: StageName) -> Option<&StageMetrics> {
        self.stage_metrics.iter().find(|m| m.stage == stage)
    }
}

/// Pipeline progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Run accepted; candidates are being collected from the source
    RunStarted {
        batch_id: Uuid,
        profile_id: String,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    StageStarted {
        batch_id: Uuid,
        stage: StageName,
        candidates_in: usize,
    },

    StageCompleted {
        batch_id: Uuid,
        metrics: StageMetrics,
    },

    /// Stage disabled, or nothing left to process
    StageSkipped { batch_id: Uuid, stage: StageName },

    RunCompleted {
        batch_id: Uuid,
        survivors: usize,
        total_cost: f64,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// Fatal stage error; the run is aborted
    RunFailed {
        batch_id: Uuid,
        stage: StageName,
        message: String,
    },
}
