//! Track-Specific Scorer
//!
//! Chooses a track for a candidate, scores every dimension in the track's
//! weight map, aggregates the weighted sum, computes confidence, and classifies
//! the result into a promotion category.
//!
//! # Track Selection (fixed priority order)
//! 1. Category code present ⇒ `CategoryBased`
//! 2. Federal agency ⇒ `PublicAgency`
//! 3. State / local agency, or any geographic tag ⇒ `RegionalAgency`
//! 4. Otherwise ⇒ `CommercialPartner`
//!
//! # Error Policy
//! A failed dimension falls back to the neutral score and lowers confidence.
//! A failure of the whole candidate (no dimension could be scored, non-finite
//! aggregate) yields a degraded result: overall 0.1, confidence 0.0,
//! `exclude`, error recorded. Scoring one candidate never fails a batch.

use super::confidence::{confidence_level, ConfidenceInputs};
use super::dimensions::{revenue_compatibility, score_dimension, NEUTRAL_SCORE};
use super::round_score;
use crate::error::ScoringError;
use crate::tracks::{Dimension, TrackId, TrackRegistry};
use crate::types::{
    AgencyScope, Candidate, DimensionScore, PromotionCategory, RequesterProfile, ScoringResult,
};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Overall score assigned to a degraded result
pub const DEGRADED_OVERALL_SCORE: f64 = 0.1;

/// Classify a candidate into a track
pub fn determine_best_track(candidate: &Candidate) -> TrackId {
    if candidate.category_code().is_some() {
        return TrackId::CategoryBased;
    }
    match candidate.agency_scope {
        Some(AgencyScope::Federal) => TrackId::PublicAgency,
        Some(AgencyScope::State) | Some(AgencyScope::Local) => TrackId::RegionalAgency,
        None if candidate.geographic_tags.iter().any(|t| !t.trim().is_empty()) => {
            TrackId::RegionalAgency
        }
        None => TrackId::CommercialPartner,
    }
}

/// Track-specific scorer
///
/// Stateless apart from the shared read-only registry; safe to share across tasks.
#[derive(Debug, Clone)]
pub struct TrackScorer {
    registry: Arc<TrackRegistry>,
}

impl TrackScorer {
    pub fn new(registry: Arc<TrackRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    /// Classify a candidate into a track
    pub fn determine_best_track(&self, candidate: &Candidate) -> TrackId {
        determine_best_track(candidate)
    }

    /// Score a candidate on its best track
    pub fn score_opportunity(
        &self,
        candidate: &Candidate,
        profile: &RequesterProfile,
    ) -> ScoringResult {
        let track = determine_best_track(candidate);
        self.score_opportunity_by_track(candidate, profile, track)
    }

    /// Score a candidate on a given track
    ///
    /// Always returns a result; internal failures produce a degraded one.
    pub fn score_opportunity_by_track(
        &self,
        candidate: &Candidate,
        profile: &RequesterProfile,
        track_id: TrackId,
    ) -> ScoringResult {
        match self.try_score(candidate, profile, track_id) {
            Ok(result) => {
                debug!(
                    candidate_id = %candidate.id,
                    track = %track_id,
                    overall = result.overall_score,
                    confidence = result.confidence_level,
                    category = %result.promotion_category,
                    "Candidate scored"
                );
                result
            }
            Err(e) => {
                warn!(
                    candidate_id = %candidate.id,
                    track = %track_id,
                    error = %e,
                    "Scoring failed, returning degraded result"
                );
                degraded_result(candidate, track_id, &e)
            }
        }
    }

    fn try_score(
        &self,
        candidate: &Candidate,
        profile: &RequesterProfile,
        track_id: TrackId,
    ) -> Result<ScoringResult, ScoringError> {
        let track = self.registry.get_track(track_id);

        let mut dimension_scores = Vec::with_capacity(track.weights.len());
        let mut computed = Vec::with_capacity(track.weights.len());
        let mut failed: BTreeSet<Dimension> = BTreeSet::new();

        for &dimension in track.weights.keys() {
            let score = match score_dimension(dimension, candidate, profile, track) {
                Ok(score) => {
                    computed.push(score);
                    score
                }
                Err(e) => {
                    debug!(candidate_id = %candidate.id, error = %e, "Dimension fell back to neutral");
                    failed.insert(dimension);
                    NEUTRAL_SCORE
                }
            };
            dimension_scores.push(DimensionScore { dimension, score });
        }

        if computed.is_empty() {
            return Err(ScoringError::InsufficientData(format!(
                "no dimension of track {} could be scored for candidate {}",
                track_id, candidate.id
            )));
        }

        let weighted: f64 = dimension_scores
            .iter()
            .map(|d| d.score * track.weight(d.dimension))
            .sum();
        if !weighted.is_finite() {
            return Err(ScoringError::NonFiniteScore(format!(
                "weighted sum for candidate {} is {}",
                candidate.id, weighted
            )));
        }
        let overall_score = round_score(weighted.clamp(0.0, 1.0));

        let revenue_compatibility = match revenue_compatibility(candidate, track) {
            Ok(score) => round_score(score),
            Err(e) => {
                debug!(candidate_id = %candidate.id, error = %e, "Revenue compatibility fell back to neutral");
                failed.insert(e.dimension);
                NEUTRAL_SCORE
            }
        };

        let confidence_level = confidence_level(
            candidate,
            ConfidenceInputs {
                dimension_scores: &computed,
                failed_dimensions: failed.len(),
            },
        );

        let promotion_category = track.thresholds.classify(overall_score, confidence_level);

        Ok(ScoringResult {
            candidate_id: candidate.id.clone(),
            track: track_id,
            dimension_scores,
            overall_score,
            confidence_level,
            revenue_compatibility,
            promotion_category,
            error: None,
            scored_at: Utc::now(),
        })
    }
}

fn degraded_result(candidate: &Candidate, track: TrackId, error: &ScoringError) -> ScoringResult {
    ScoringResult {
        candidate_id: candidate.id.clone(),
        track,
        dimension_scores: Vec::new(),
        overall_score: DEGRADED_OVERALL_SCORE,
        confidence_level: 0.0,
        revenue_compatibility: NEUTRAL_SCORE,
        promotion_category: PromotionCategory::Exclude,
        error: Some(error.to_string()),
        scored_at: Utc::now(),
    }
}
