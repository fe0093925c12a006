//! Scoring tracks
//!
//! A track bundles the revenue band, dimension weights, and promotion
//! thresholds used to score one kind of funding candidate. The set of tracks
//! is closed; `TrackRegistry` holds one configuration per `TrackId`.

pub mod registry;

pub use registry::TrackRegistry;

use crate::error::ScoringError;
use crate::types::PromotionCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tolerance for the weights-sum-to-one check
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Minimum confidence required for `auto_promote` unless overridden
pub const DEFAULT_AUTO_PROMOTE_CONFIDENCE: f64 = 0.8;

/// Scoring track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackId {
    /// Candidates carrying a nonprofit category (NTEE-style) code
    CategoryBased,
    /// Federal / public agency programs
    PublicAgency,
    /// State, local, and regional programs
    RegionalAgency,
    /// Corporate giving and commercial partnerships (default)
    CommercialPartner,
}

impl TrackId {
    /// All tracks in classification priority order
    pub const ALL: [TrackId; 4] = [
        TrackId::CategoryBased,
        TrackId::PublicAgency,
        TrackId::RegionalAgency,
        TrackId::CommercialPartner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackId::CategoryBased => "category_based",
            TrackId::PublicAgency => "public_agency",
            TrackId::RegionalAgency => "regional_agency",
            TrackId::CommercialPartner => "commercial_partner",
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackId {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| ScoringError::UnknownTrack(s.to_string()))
    }
}

/// One axis of compatibility, scored independently before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Candidate category code vs. requester category codes
    CategoryMatch,
    /// Requester focus areas found in the candidate's tags / description
    FocusAlignment,
    /// Candidate geographic tags vs. requester geography
    GeographicAlignment,
    /// Candidate funding capacity relative to requester revenue
    ScaleFit,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::CategoryMatch,
        Dimension::FocusAlignment,
        Dimension::GeographicAlignment,
        Dimension::ScaleFit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::CategoryMatch => "category_match",
            Dimension::FocusAlignment => "focus_alignment",
            Dimension::GeographicAlignment => "geographic_alignment",
            Dimension::ScaleFit => "scale_fit",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| {
                ScoringError::InvalidTrackConfiguration(format!("unknown dimension '{}'", s))
            })
    }
}

/// Revenue compatibility band (USD, inclusive on both ends)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueBand {
    pub min: f64,
    pub max: f64,
}

impl RevenueBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Overall-score cutoffs per promotion tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionThresholds {
    pub auto_promote: f64,
    pub high_priority: f64,
    pub medium_priority: f64,
    pub low_priority: f64,
    /// Confidence gate applied to the top tier only
    pub auto_promote_confidence: f64,
}

impl PromotionThresholds {
    pub const fn new(auto_promote: f64, high_priority: f64, medium_priority: f64, low_priority: f64) -> Self {
        Self {
            auto_promote,
            high_priority,
            medium_priority,
            low_priority,
            auto_promote_confidence: DEFAULT_AUTO_PROMOTE_CONFIDENCE,
        }
    }

    /// Classify a score / confidence pair
    ///
    /// Monotonic in `overall_score` at fixed confidence: failing the
    /// confidence gate drops to `HighPriority`, never below, because
    /// `auto_promote >= high_priority`.
    pub fn classify(&self, overall_score: f64, confidence_level: f64) -> PromotionCategory {
        if overall_score >= self.auto_promote && confidence_level >= self.auto_promote_confidence {
            PromotionCategory::AutoPromote
        } else if overall_score >= self.high_priority {
            PromotionCategory::HighPriority
        } else if overall_score >= self.medium_priority {
            PromotionCategory::MediumPriority
        } else if overall_score >= self.low_priority {
            PromotionCategory::LowPriority
        } else {
            PromotionCategory::Exclude
        }
    }
}

/// Immutable configuration of one scoring track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfiguration {
    pub id: TrackId,
    pub revenue_band: RevenueBand,
    pub weights: BTreeMap<Dimension, f64>,
    pub thresholds: PromotionThresholds,
}

impl TrackConfiguration {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Check every invariant of the configuration
    pub fn validate(&self) -> Result<(), ScoringError> {
        let invalid = |msg: String| -> Result<(), ScoringError> {
            Err(ScoringError::InvalidTrackConfiguration(format!("{}: {}", self.id, msg)))
        };

        if self.weights.is_empty() {
            return invalid("weight map is empty".to_string());
        }
        if let Some((dim, w)) = self
            .weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return invalid(format!("weight for {} must be a non-negative number, got {}", dim, w));
        }
        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return invalid(format!("weights sum to {}, expected 1.0", sum));
        }

        let band = self.revenue_band;
        if !band.min.is_finite() || !band.max.is_finite() || band.min <= 0.0 || band.min > band.max {
            return invalid(format!("revenue band ({}, {}) is not a positive range", band.min, band.max));
        }

        let t = self.thresholds;
        let ordered = t.auto_promote <= 1.0
            && t.auto_promote >= t.high_priority
            && t.high_priority >= t.medium_priority
            && t.medium_priority >= t.low_priority
            && t.low_priority >= 0.0;
        if !ordered {
            return invalid(format!(
                "thresholds must satisfy 1 >= auto >= high >= medium >= low >= 0, got {:?}",
                t
            ));
        }
        if !(0.0..=1.0).contains(&t.auto_promote_confidence) {
            return invalid(format!(
                "auto_promote_confidence must be within 0.0-1.0, got {}",
                t.auto_promote_confidence
            ));
        }

        Ok(())
    }
}
