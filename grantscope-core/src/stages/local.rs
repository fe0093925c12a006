//! Local scoring stage
//!
//! Cheap locality check run concurrently with strategic scoring:
//! `local_fit` is the mean of the geographic and focus alignment scores under
//! the candidate's track. Candidates below `min_local_fit` are dropped.

use super::{PipelineCandidate, Stage, StageName, StageOutput};
use crate::error::StageError;
use crate::scoring::dimensions::{score_dimension, NEUTRAL_SCORE};
use crate::scoring::{round_score, TrackScorer};
use crate::tracks::Dimension;
use crate::types::RequesterProfile;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Default minimum local fit
pub const DEFAULT_MIN_LOCAL_FIT: f64 = 0.4;

const LOCAL_DIMENSIONS: [Dimension; 2] = [Dimension::GeographicAlignment, Dimension::FocusAlignment];

pub struct LocalScoringStage {
    scorer: Arc<TrackScorer>,
    min_local_fit: f64,
}

impl LocalScoringStage {
    pub fn new(scorer: Arc<TrackScorer>) -> Self {
        Self {
            scorer,
            min_local_fit: DEFAULT_MIN_LOCAL_FIT,
        }
    }

    pub fn with_min_local_fit(mut self, min_local_fit: f64) -> Self {
        self.min_local_fit = min_local_fit;
        self
    }
}

#[async_trait]
impl Stage for LocalScoringStage {
    fn name(&self) -> StageName {
        StageName::LocalScoring
    }

    async fn execute(
        &self,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
    ) -> Result<StageOutput, StageError> {
        let mut processed_ok = 0;
        let mut survivors = Vec::with_capacity(candidates.len());

        for mut pc in candidates {
            let track_id = self.scorer.determine_best_track(&pc.candidate);
            let track = self.scorer.registry().get_track(track_id);

            let mut failed = false;
            let total: f64 = LOCAL_DIMENSIONS
                .iter()
                .map(|&d| {
                    score_dimension(d, &pc.candidate, profile, track).unwrap_or_else(|e| {
                        debug!(candidate_id = %pc.candidate.id, error = %e, "Local dimension fell back to neutral");
                        failed = true;
                        NEUTRAL_SCORE
                    })
                })
                .sum();
            if !failed {
                processed_ok += 1;
            }

            let local_fit = round_score(total / LOCAL_DIMENSIONS.len() as f64);
            pc.local_fit = Some(local_fit);

            if local_fit >= self.min_local_fit {
                survivors.push(pc);
            } else {
                debug!(candidate_id = %pc.id(), local_fit, "Below minimum local fit");
            }
        }

        Ok(StageOutput {
            survivors,
            processed_ok,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::TrackRegistry;
    use crate::types::Candidate;

    fn stage() -> LocalScoringStage {
        LocalScoringStage::new(Arc::new(TrackScorer::new(Arc::new(TrackRegistry::new()))))
    }

    fn profile() -> RequesterProfile {
        RequesterProfile {
            profile_id: "p-1".to_string(),
            focus_areas: vec!["housing".to_string()],
            geography: vec!["MN".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_local_fit_attached_and_filtered() {
        let mut near = Candidate::new("near", "Twin Cities Housing Fund");
        near.geographic_tags = vec!["MN".to_string()];
        near.focus_tags = vec!["housing".to_string()];

        let mut far = Candidate::new("far", "Desert Arts Council");
        far.geographic_tags = vec!["AZ".to_string()];
        far.focus_tags = vec!["sculpture".to_string()];

        let unknown = Candidate::new("unknown", "Quiet Fund");

        let output = stage()
            .execute(vec![near.into(), far.into(), unknown.into()], &profile())
            .await
            .unwrap();

        let fits: Vec<(&str, f64)> = output
            .survivors
            .iter()
            .map(|c| (c.id(), c.local_fit.unwrap()))
            .collect();
        // far: (0.3 + 0.3) / 2 = 0.3 < 0.4
        assert_eq!(fits, vec![("near", 1.0), ("unknown", NEUTRAL_SCORE)]);
        assert_eq!(output.processed_ok, 3);
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let mut c = Candidate::new("c", "Fund");
        c.geographic_tags = vec!["MN".to_string()];
        let output = stage()
            .with_min_local_fit(0.9)
            .execute(vec![c.into()], &profile())
            .await
            .unwrap();
        // (1.0 + 0.5) / 2 = 0.75
        assert!(output.survivors.is_empty());
    }
}
