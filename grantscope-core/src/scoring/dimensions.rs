//! Dimension Scorers
//!
//! One pure function per dimension. Each returns a score in 0.0-1.0.
//!
//! # Rules
//! - Absent input (on either the candidate or the profile) ⇒ `NEUTRAL_SCORE`.
//!   Missing data lowers confidence, not the score.
//! - No overlap at all ⇒ `MISMATCH_FLOOR`, never zero: a single weak signal
//!   must not sink a candidate on its own.
//! - Malformed input (negative or non-finite figures) ⇒ `DimensionScoringError`.
//!
//! # Revenue Compatibility
//! Informational score reported next to (not inside) the weighted sum:
//! - inside the track band (inclusive): 0.9
//! - below `min`: `0.1 + 0.8 * (value / min)`
//! - above `max`: `0.2 + 0.7 * (max / value)`
//!
//! Undersized organizations are penalised harder than oversized ones.

use crate::error::DimensionScoringError;
use crate::tracks::{Dimension, RevenueBand, TrackConfiguration};
use crate::types::{Candidate, RequesterProfile};

/// Score used when the input needed by a dimension is absent
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Lowest score for a present-but-mismatching signal
pub const MISMATCH_FLOOR: f64 = 0.3;

/// Category codes sharing the major group (first letter)
pub const PARTIAL_CATEGORY_SCORE: f64 = 0.7;

/// Candidate declares national reach
pub const NATIONAL_SCOPE_SCORE: f64 = 0.8;

/// Revenue inside the track band
pub const IN_BAND_SCORE: f64 = 0.9;

/// Floor approached far below the band
pub const UNDER_BAND_FLOOR: f64 = 0.1;

/// Floor approached far above the band
pub const OVER_BAND_FLOOR: f64 = 0.2;

const NATIONAL_TAGS: [&str; 4] = ["national", "nationwide", "us", "usa"];

type DimensionResult = Result<f64, DimensionScoringError>;

/// Score one dimension
pub fn score_dimension(
    dimension: Dimension,
    candidate: &Candidate,
    profile: &RequesterProfile,
    track: &TrackConfiguration,
) -> DimensionResult {
    let score = match dimension {
        Dimension::CategoryMatch => category_match(candidate, profile, track),
        Dimension::FocusAlignment => focus_alignment(candidate, profile, track),
        Dimension::GeographicAlignment => geographic_alignment(candidate, profile, track),
        Dimension::ScaleFit => scale_fit(candidate, profile, track),
    }?;
    Ok(score.clamp(0.0, 1.0))
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalized_set(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| normalize(v))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Category code compatibility
///
/// Exact match with any requester code ⇒ 1.0; same major group ⇒ 0.7.
pub fn category_match(
    candidate: &Candidate,
    profile: &RequesterProfile,
    _track: &TrackConfiguration,
) -> DimensionResult {
    let Some(code) = candidate.category_code().map(normalize) else {
        return Ok(NEUTRAL_SCORE);
    };
    let requester_codes = normalized_set(&profile.category_codes);
    if requester_codes.is_empty() {
        return Ok(NEUTRAL_SCORE);
    }

    if requester_codes.iter().any(|c| *c == code) {
        return Ok(1.0);
    }

    let major_group = code.chars().next();
    if requester_codes.iter().any(|c| c.chars().next() == major_group) {
        return Ok(PARTIAL_CATEGORY_SCORE);
    }

    Ok(MISMATCH_FLOOR)
}

/// Lowercased alphanumeric words of a text
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `phrase` occurs in `text` as a run of whole words
fn contains_phrase(text: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && text.windows(phrase.len()).any(|window| window == phrase)
}

/// Share of requester focus areas present in the candidate's tags or, as
/// whole words, in its description
pub fn focus_alignment(
    candidate: &Candidate,
    profile: &RequesterProfile,
    _track: &TrackConfiguration,
) -> DimensionResult {
    let focus_areas = normalized_set(&profile.focus_areas);
    let tags = normalized_set(&candidate.focus_tags);
    if focus_areas.is_empty() || (tags.is_empty() && !candidate.has_description()) {
        return Ok(NEUTRAL_SCORE);
    }

    let description = words(&candidate.description);
    let matched = focus_areas
        .iter()
        .filter(|area| tags.contains(area) || contains_phrase(&description, &words(area)))
        .count();
    let fraction = matched as f64 / focus_areas.len() as f64;

    Ok(MISMATCH_FLOOR + (1.0 - MISMATCH_FLOOR) * fraction)
}

/// Geographic overlap between candidate tags and requester geography
pub fn geographic_alignment(
    candidate: &Candidate,
    profile: &RequesterProfile,
    _track: &TrackConfiguration,
) -> DimensionResult {
    let candidate_tags = normalized_set(&candidate.geographic_tags);
    let requester_geography = normalized_set(&profile.geography);
    if candidate_tags.is_empty() || requester_geography.is_empty() {
        return Ok(NEUTRAL_SCORE);
    }

    if candidate_tags.iter().any(|t| requester_geography.contains(t)) {
        return Ok(1.0);
    }
    if candidate_tags.iter().any(|t| NATIONAL_TAGS.contains(&t.as_str())) {
        return Ok(NATIONAL_SCOPE_SCORE);
    }

    Ok(MISMATCH_FLOOR)
}

/// Candidate funding capacity relative to the requester's revenue
///
/// A funder at least as large as the requester scores 1.0; smaller funders
/// decay linearly toward the mismatch floor.
pub fn scale_fit(
    candidate: &Candidate,
    profile: &RequesterProfile,
    _track: &TrackConfiguration,
) -> DimensionResult {
    let (Some(capacity), Some(revenue)) = (candidate.funding_capacity, profile.annual_revenue)
    else {
        return Ok(NEUTRAL_SCORE);
    };
    let capacity = checked_figure(Dimension::ScaleFit, "funding_capacity", capacity)?;
    let revenue = checked_figure(Dimension::ScaleFit, "annual_revenue", revenue)?;
    if revenue == 0.0 {
        return Ok(NEUTRAL_SCORE);
    }

    let ratio = capacity / revenue;
    if ratio >= 1.0 {
        Ok(1.0)
    } else {
        Ok(MISMATCH_FLOOR + (1.0 - MISMATCH_FLOOR) * ratio)
    }
}

/// Revenue band compatibility of the candidate's declared figure
///
/// Not a weighted dimension; reported separately on the scoring result.
pub fn revenue_compatibility(
    candidate: &Candidate,
    track: &TrackConfiguration,
) -> Result<f64, DimensionScoringError> {
    let Some(value) = candidate.funding_capacity else {
        return Ok(NEUTRAL_SCORE);
    };
    let value = checked_figure(Dimension::ScaleFit, "funding_capacity", value)?;
    Ok(band_score(value, &track.revenue_band))
}

/// Score a figure against a band
pub fn band_score(value: f64, band: &RevenueBand) -> f64 {
    if band.contains(value) {
        IN_BAND_SCORE
    } else if value < band.min {
        let ratio = value / band.min;
        UNDER_BAND_FLOOR + (IN_BAND_SCORE - UNDER_BAND_FLOOR) * ratio
    } else {
        let ratio = band.max / value;
        OVER_BAND_FLOOR + (IN_BAND_SCORE - OVER_BAND_FLOOR) * ratio
    }
}

fn checked_figure(dimension: Dimension, field: &str, value: f64) -> DimensionResult {
    if !value.is_finite() {
        return Err(DimensionScoringError::new(
            dimension,
            format!("{} is not a finite number", field),
        ));
    }
    if value < 0.0 {
        return Err(DimensionScoringError::new(
            dimension,
            format!("{} is negative ({})", field, value),
        ));
    }
    Ok(value)
}
