//! Track scoring properties
//!
//! Checks the scorer as a whole against the built-in registry and against
//! registries patched through configuration.

mod common;

use common::*;
use grantscope_common::config::TrackSection;
use grantscope_core::scoring::TrackScorer;
use grantscope_core::tracks::{Dimension, TrackId, TrackRegistry};
use grantscope_core::types::{AgencyScope, Candidate, PromotionCategory};
use std::collections::BTreeMap;
use std::sync::Arc;

fn scorer() -> TrackScorer {
    TrackScorer::new(Arc::new(TrackRegistry::new()))
}

fn sample_candidates() -> Vec<Candidate> {
    let mut federal = Candidate::new("fed", "Department of Agriculture");
    federal.agency_scope = Some(AgencyScope::Federal);
    federal.funding_capacity = Some(2_000_000_000.0);
    federal.focus_tags = vec!["nutrition".to_string()];

    let mut county = Candidate::new("county", "King County Community Services");
    county.agency_scope = Some(AgencyScope::Local);
    county.geographic_tags = vec!["WA".to_string()];

    let mut corporate = Candidate::new("corp", "Northwest Grocers Foundation");
    corporate.funding_capacity = Some(300_000.0);
    corporate.description = "Corporate giving for hunger relief and nutrition".to_string();

    vec![
        strong_candidate("strong"),
        unverified_candidate("unverified"),
        remote_candidate("remote"),
        mismatched_candidate("mismatched"),
        Candidate::new("bare", "Anonymous Giving Circle"),
        federal,
        county,
        corporate,
    ]
}

#[test]
fn test_scores_stay_in_unit_range() {
    let scorer = scorer();
    let profile = food_bank_profile();

    for candidate in sample_candidates() {
        for track in TrackId::ALL {
            let result = scorer.score_opportunity_by_track(&candidate, &profile, track);
            for value in [result.overall_score, result.confidence_level, result.revenue_compatibility] {
                assert!(
                    (0.0..=1.0).contains(&value),
                    "{} on {}: {} out of range",
                    candidate.id,
                    track,
                    value
                );
            }
            for d in &result.dimension_scores {
                assert!((0.0..=1.0).contains(&d.score));
            }
        }
    }
}

#[test]
fn test_track_selection_per_candidate() {
    let scorer = scorer();
    let profile = food_bank_profile();
    let tracks: Vec<(String, TrackId)> = sample_candidates()
        .iter()
        .map(|c| (c.id.clone(), scorer.score_opportunity(c, &profile).track))
        .collect();

    let track_of = |id: &str| tracks.iter().find(|(c, _)| c == id).map(|(_, t)| *t);
    assert_eq!(track_of("strong"), Some(TrackId::CategoryBased));
    assert_eq!(track_of("fed"), Some(TrackId::PublicAgency));
    assert_eq!(track_of("county"), Some(TrackId::RegionalAgency));
    assert_eq!(track_of("corp"), Some(TrackId::CommercialPartner));
    assert_eq!(track_of("bare"), Some(TrackId::CommercialPartner));
}

#[test]
fn test_scoring_order_does_not_matter() {
    let scorer = scorer();
    let profile = food_bank_profile();
    let candidates = sample_candidates();

    let forward: Vec<_> = candidates
        .iter()
        .map(|c| scorer.score_opportunity(c, &profile))
        .collect();
    let mut backward: Vec<_> = candidates
        .iter()
        .rev()
        .map(|c| scorer.score_opportunity(c, &profile))
        .collect();
    backward.reverse();

    for (a, b) in forward.iter().zip(&backward) {
        assert!(a.same_outcome(b), "{} scored differently", a.candidate_id);
    }
}

#[test]
fn test_evidence_raises_confidence_not_score() {
    let scorer = scorer();
    let profile = food_bank_profile();

    let with = scorer.score_opportunity(&strong_candidate("c"), &profile);
    let without = scorer.score_opportunity(&unverified_candidate("c"), &profile);

    assert_eq!(with.overall_score, without.overall_score);
    assert!(with.confidence_level > without.confidence_level);
    assert_eq!(with.promotion_category, PromotionCategory::AutoPromote);
    assert_eq!(without.promotion_category, PromotionCategory::HighPriority);
}

#[test]
fn test_mismatch_is_excluded() {
    let result = scorer().score_opportunity(&mismatched_candidate("m"), &food_bank_profile());
    assert_eq!(result.track, TrackId::CategoryBased);
    assert!(result.overall_score < 0.35);
    assert_eq!(result.promotion_category, PromotionCategory::Exclude);
    assert!(result.error.is_none());
}

#[test]
fn test_revenue_compatibility_is_reported_separately() {
    let scorer = scorer();
    let profile = food_bank_profile();

    // 10k sits under the category band; the weighted dimensions do not see it
    let result = scorer.score_opportunity(&mismatched_candidate("m"), &profile);
    assert!(result.revenue_compatibility < 0.9);
    assert!(result.dimension(Dimension::ScaleFit).is_some());

    let in_band = scorer.score_opportunity(&strong_candidate("s"), &profile);
    assert_eq!(in_band.revenue_compatibility, 0.9);
}

#[test]
fn test_registry_overrides_change_classification() {
    // Given: a category track that weighs geography alone
    let override_section = TrackSection {
        id: "category_based".to_string(),
        weights: Some(BTreeMap::from([("geographic_alignment".to_string(), 1.0)])),
        ..Default::default()
    };
    let registry = TrackRegistry::with_overrides(&[override_section]).unwrap();
    let scorer = TrackScorer::new(Arc::new(registry));

    // When: a candidate in the right category but the wrong region is scored
    let result = scorer.score_opportunity(&remote_candidate("r"), &food_bank_profile());

    // Then: only geographic alignment counts
    assert_eq!(result.dimension_scores.len(), 1);
    assert_eq!(result.overall_score, 0.3);
    assert_eq!(result.promotion_category, PromotionCategory::Exclude);
}

#[test]
fn test_invalid_override_rejected() {
    let bad_weights = TrackSection {
        id: "public_agency".to_string(),
        weights: Some(BTreeMap::from([
            ("category_match".to_string(), 0.7),
            ("scale_fit".to_string(), 0.7),
        ])),
        ..Default::default()
    };
    assert!(TrackRegistry::with_overrides(&[bad_weights]).is_err());

    let unknown = TrackSection {
        id: "lottery".to_string(),
        ..Default::default()
    };
    assert!(TrackRegistry::with_overrides(&[unknown]).is_err());
}

#[test]
fn test_default_registry_is_valid() {
    let registry = TrackRegistry::new();
    for track in TrackId::ALL {
        let config = registry.get_track(track);
        assert!(config.validate().is_ok(), "{} invalid", track);
        assert!((config.weight_sum() - 1.0).abs() < 1e-6);
    }
}
