//! Core Types for grantscope-core
//!
//! Candidate and requester records consumed by the scorer, and the results
//! it produces.
//!
//! # Flow
//! - `Candidate` (produced by discovery connectors, read-only here)
//! - `RequesterProfile` (the seeking organization, read-only here)
//! - `ScoringResult` (one per scoring invocation, never mutated)

use crate::tracks::{Dimension, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Inputs
// ============================================================================

/// Government level of an agency-sourced candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyScope {
    Federal,
    State,
    Local,
}

/// Past award made by a candidate funder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub recipient: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// Auxiliary evidence gathered about a candidate from secondary sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryData {
    /// Names of the sources that contributed data
    #[serde(default)]
    pub sources: Vec<String>,
    /// Declared web presence (URL)
    #[serde(default)]
    pub web_presence: Option<String>,
    /// Known affiliations (networks, parent organizations)
    #[serde(default)]
    pub affiliations: Vec<String>,
    /// Historical grant records
    #[serde(default)]
    pub grant_history: Vec<GrantRecord>,
}

/// Funding opportunity candidate
///
/// Produced by discovery connectors. Fields the core does not understand are
/// kept in `extra` so records survive a round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub organization_name: String,
    /// Nonprofit category code (NTEE style, e.g. "P20")
    #[serde(default)]
    pub category_code: Option<String>,
    /// Declared revenue / funding capacity (USD)
    #[serde(default)]
    pub funding_capacity: Option<f64>,
    #[serde(default)]
    pub geographic_tags: Vec<String>,
    #[serde(default)]
    pub focus_tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agency_scope: Option<AgencyScope>,
    #[serde(default)]
    pub auxiliary: Option<AuxiliaryData>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Candidate {
    /// Minimal candidate with only the required fields set
    pub fn new(id: impl Into<String>, organization_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            organization_name: organization_name.into(),
            category_code: None,
            funding_capacity: None,
            geographic_tags: Vec::new(),
            focus_tags: Vec::new(),
            description: String::new(),
            agency_scope: None,
            auxiliary: None,
            extra: HashMap::new(),
        }
    }

    /// Category code with surrounding whitespace removed, if non-empty
    pub fn category_code(&self) -> Option<&str> {
        self.category_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

/// The organization seeking funding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequesterProfile {
    pub profile_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category_codes: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub geography: Vec<String>,
    #[serde(default)]
    pub annual_revenue: Option<f64>,
}

// ============================================================================
// Outputs
// ============================================================================

/// Promotion tier, ordered from least to most aggressive advancement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionCategory {
    Exclude,
    LowPriority,
    MediumPriority,
    HighPriority,
    AutoPromote,
}

impl PromotionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionCategory::Exclude => "exclude",
            PromotionCategory::LowPriority => "low_priority",
            PromotionCategory::MediumPriority => "medium_priority",
            PromotionCategory::HighPriority => "high_priority",
            PromotionCategory::AutoPromote => "auto_promote",
        }
    }
}

impl fmt::Display for PromotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PromotionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "exclude" => Ok(PromotionCategory::Exclude),
            "low_priority" => Ok(PromotionCategory::LowPriority),
            "medium_priority" => Ok(PromotionCategory::MediumPriority),
            "high_priority" => Ok(PromotionCategory::HighPriority),
            "auto_promote" => Ok(PromotionCategory::AutoPromote),
            other => Err(format!("unknown promotion category '{}'", other)),
        }
    }
}

/// Score for one dimension (0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: f64,
}

/// Result of scoring one candidate against one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub candidate_id: String,
    pub track: TrackId,
    /// Ordered by dimension
    pub dimension_scores: Vec<DimensionScore>,
    /// Weighted sum of dimension scores, clamped to 0.0-1.0
    pub overall_score: f64,
    /// Evidence strength (0.0-1.0)
    pub confidence_level: f64,
    /// Revenue band fit, informational only (not part of `overall_score`)
    pub revenue_compatibility: f64,
    pub promotion_category: PromotionCategory,
    /// Set when the result is degraded
    #[serde(default)]
    pub error: Option<String>,
    pub scored_at: DateTime<Utc>,
}

impl ScoringResult {
    /// Score for one dimension, if the track scored it
    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        self.dimension_scores
            .iter()
            .find(|d| d.dimension == dimension)
            .map(|d| d.score)
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Equality ignoring `scored_at`
    pub fn same_outcome(&self, other: &ScoringResult) -> bool {
        self.candidate_id == other.candidate_id
            && self.track == other.track
            && self.dimension_scores == other.dimension_scores
            && self.overall_score == other.overall_score
            && self.confidence_level == other.confidence_level
            && self.revenue_compatibility == other.revenue_compatibility
            && self.promotion_category == other.promotion_category
            && self.error == other.error
    }
}
