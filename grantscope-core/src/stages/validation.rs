//! Validation stage
//!
//! Structural checks only; nothing is scored here.
//!
//! Drops candidates with:
//! - blank id or organization name
//! - an id already seen in the batch (first occurrence kept)
//! - a funding capacity that is negative or not finite

use super::{PipelineCandidate, Stage, StageName, StageOutput};
use crate::error::StageError;
use crate::types::{Candidate, RequesterProfile};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ValidationStage;

impl ValidationStage {
    pub fn new() -> Self {
        Self
    }
}

/// Reason a candidate fails structural validation
fn rejection_reason(candidate: &Candidate) -> Option<&'static str> {
    if candidate.id.trim().is_empty() {
        return Some("blank id");
    }
    if candidate.organization_name.trim().is_empty() {
        return Some("blank organization name");
    }
    match candidate.funding_capacity {
        Some(v) if !v.is_finite() => Some("non-finite funding capacity"),
        Some(v) if v < 0.0 => Some("negative funding capacity"),
        _ => None,
    }
}

#[async_trait]
impl Stage for ValidationStage {
    fn name(&self) -> StageName {
        StageName::Validation
    }

    async fn execute(
        &self,
        candidates: Vec<PipelineCandidate>,
        _profile: &RequesterProfile,
    ) -> Result<StageOutput, StageError> {
        let total = candidates.len();
        let mut seen = HashSet::new();
        let mut survivors = Vec::with_capacity(candidates.len());

        for pc in candidates {
            if let Some(reason) = rejection_reason(&pc.candidate) {
                debug!(candidate_id = %pc.id(), reason, "Candidate failed validation");
                continue;
            }
            if !seen.insert(pc.id().to_string()) {
                debug!(candidate_id = %pc.id(), "Duplicate candidate id dropped");
                continue;
            }
            survivors.push(pc);
        }

        // Rejections are the stage's verdict, not processing errors
        Ok(StageOutput {
            survivors,
            processed_ok: total,
        })
    }
}
