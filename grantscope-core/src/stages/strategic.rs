//! Strategic scoring stage
//!
//! Scores every candidate on its best track and keeps those whose promotion
//! category reaches `min_promotion`. Scoring is pure and never awaits.

use super::{PipelineCandidate, Stage, StageName, StageOutput};
use crate::error::StageError;
use crate::scoring::TrackScorer;
use crate::types::{PromotionCategory, RequesterProfile};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct StrategicScoringStage {
    scorer: Arc<TrackScorer>,
    min_promotion: PromotionCategory,
}

impl StrategicScoringStage {
    pub fn new(scorer: Arc<TrackScorer>) -> Self {
        Self {
            scorer,
            min_promotion: PromotionCategory::LowPriority,
        }
    }

    /// Lowest category that survives (default `LowPriority`)
    pub fn with_min_promotion(mut self, min_promotion: PromotionCategory) -> Self {
        self.min_promotion = min_promotion;
        self
    }
}

#[async_trait]
impl Stage for StrategicScoringStage {
    fn name(&self) -> StageName {
        StageName::StrategicScoring
    }

    async fn execute(
        &self,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
    ) -> Result<StageOutput, StageError> {
        let mut processed_ok = 0;
        let mut survivors = Vec::with_capacity(candidates.len());

        for mut pc in candidates {
            let result = self.scorer.score_opportunity(&pc.candidate, profile);
            if !result.is_degraded() {
                processed_ok += 1;
            }

            let keep = result.promotion_category >= self.min_promotion;
            debug!(
                candidate_id = %pc.id(),
                category = %result.promotion_category,
                keep,
                "Strategic scoring"
            );

            pc.scoring = Some(result);
            if keep {
                survivors.push(pc);
            }
        }

        Ok(StageOutput {
            survivors,
            processed_ok,
        })
    }
}
