//! Confidence Model
//!
//! Confidence measures how much evidence backs a score, independently of how
//! good the score is.
//!
//! # Calculation
//! 1. Base: 0.5, or 0.6 when auxiliary data names at least one source
//! 2. Evidence bonuses (sum capped at 0.2):
//!    - declared web presence: +0.05
//!    - known affiliations: +0.05
//!    - historical grant records: +0.10
//! 3. Consistency bonus: +0.05 when dimension scores agree (variance < 0.02)
//! 4. Penalties: -0.05 per missing core field, -0.10 per dimension that failed
//! 5. Clamp to 0.0-1.0, rounded to six decimal places

use super::round_score;
use crate::types::Candidate;

pub const BASE_CONFIDENCE: f64 = 0.5;
pub const BASE_CONFIDENCE_WITH_AUXILIARY: f64 = 0.6;
pub const WEB_PRESENCE_BONUS: f64 = 0.05;
pub const AFFILIATIONS_BONUS: f64 = 0.05;
pub const GRANT_HISTORY_BONUS: f64 = 0.10;
pub const MAX_EVIDENCE_BONUS: f64 = 0.2;
pub const CONSISTENCY_BONUS: f64 = 0.05;
pub const CONSISTENCY_VARIANCE_LIMIT: f64 = 0.02;
pub const MISSING_FIELD_PENALTY: f64 = 0.05;
pub const FAILED_DIMENSION_PENALTY: f64 = 0.10;

/// Inputs to the confidence calculation beyond the candidate itself
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInputs<'a> {
    /// Scores of the dimensions that were computed
    pub dimension_scores: &'a [f64],
    /// Number of dimensions that failed and fell back to neutral
    pub failed_dimensions: usize,
}

/// Core fields whose absence lowers confidence
pub fn missing_core_fields(candidate: &Candidate) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if candidate.category_code().is_none() {
        missing.push("category_code");
    }
    if candidate.funding_capacity.is_none() {
        missing.push("funding_capacity");
    }
    if candidate.geographic_tags.iter().all(|t| t.trim().is_empty()) {
        missing.push("geographic_tags");
    }
    if !candidate.has_description() {
        missing.push("description");
    }
    missing
}

/// Capped bonus for auxiliary evidence
pub fn evidence_bonus(candidate: &Candidate) -> f64 {
    let Some(aux) = &candidate.auxiliary else {
        return 0.0;
    };

    let mut bonus = 0.0;
    if aux.web_presence.as_deref().is_some_and(|w| !w.trim().is_empty()) {
        bonus += WEB_PRESENCE_BONUS;
    }
    if !aux.affiliations.is_empty() {
        bonus += AFFILIATIONS_BONUS;
    }
    if !aux.grant_history.is_empty() {
        bonus += GRANT_HISTORY_BONUS;
    }
    bonus.min(MAX_EVIDENCE_BONUS)
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Auxiliary data is attached and names at least one non-blank source
pub fn has_auxiliary_sources(candidate: &Candidate) -> bool {
    candidate
        .auxiliary
        .as_ref()
        .is_some_and(|aux| aux.sources.iter().any(|s| !s.trim().is_empty()))
}

/// Confidence level for a candidate (0.0-1.0)
pub fn confidence_level(candidate: &Candidate, inputs: ConfidenceInputs<'_>) -> f64 {
    let base = if has_auxiliary_sources(candidate) {
        BASE_CONFIDENCE_WITH_AUXILIARY
    } else {
        BASE_CONFIDENCE
    };

    let consistency = if inputs.dimension_scores.len() > 1
        && variance(inputs.dimension_scores) < CONSISTENCY_VARIANCE_LIMIT
    {
        CONSISTENCY_BONUS
    } else {
        0.0
    };

    let penalty = missing_core_fields(candidate).len() as f64 * MISSING_FIELD_PENALTY
        + inputs.failed_dimensions as f64 * FAILED_DIMENSION_PENALTY;

    round_score((base + evidence_bonus(candidate) + consistency - penalty).clamp(0.0, 1.0))
}
