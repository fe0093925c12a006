//! Shared fixtures for grantscope-core integration tests
//!
//! Requester profile, candidates with known scoring behaviour, and a
//! scripted enrichment service.

#![allow(dead_code)]

use async_trait::async_trait;
use grantscope_common::config::TomlConfig;
use grantscope_core::enrichment::{
    EnrichmentContext, EnrichmentResponse, EnrichmentService, IntelligenceOutcome,
    IntelligenceRecord, Recommendation,
};
use grantscope_core::error::EnrichmentError;
use grantscope_core::types::{AuxiliaryData, Candidate, GrantRecord, RequesterProfile};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const MOCK_COST_PER_CANDIDATE: f64 = 0.25;

// ============================================================================
// Profile and candidates
// ============================================================================

pub fn food_bank_profile() -> RequesterProfile {
    RequesterProfile {
        profile_id: "eastside-food-bank".to_string(),
        name: "Eastside Food Bank".to_string(),
        category_codes: vec!["K31".to_string()],
        focus_areas: vec!["food security".to_string(), "nutrition".to_string()],
        geography: vec!["WA".to_string()],
        annual_revenue: Some(750_000.0),
    }
}

/// Category-based candidate matching the food bank on every dimension,
/// with full auxiliary evidence: auto-promoted, local fit 1.0
pub fn strong_candidate(id: &str) -> Candidate {
    let mut c = well_matched(id, "Puget Sound Community Fund");
    c.auxiliary = Some(AuxiliaryData {
        sources: vec!["irs-990".to_string()],
        web_presence: Some("https://psfund.example.org".to_string()),
        affiliations: vec!["Philanthropy Northwest".to_string()],
        grant_history: vec![GrantRecord {
            recipient: "Tacoma Pantry".to_string(),
            amount: Some(40_000.0),
            year: Some(2024),
        }],
    });
    c
}

/// Same match as `strong_candidate` without auxiliary evidence: confidence
/// stays below the auto-promote gate, so it lands in high priority
pub fn unverified_candidate(id: &str) -> Candidate {
    well_matched(id, "Cascade Giving Circle")
}

/// Right category, wrong focus and region: passes strategic scoring
/// (high priority) but its local fit is 0.3
pub fn remote_candidate(id: &str) -> Candidate {
    let mut c = Candidate::new(id, "Gulf Coast Arts Trust");
    c.category_code = Some("K31".to_string());
    c.funding_capacity = Some(5_000_000.0);
    c.geographic_tags = vec!["TX".to_string()];
    c.focus_tags = vec!["arts".to_string()];
    c.description = "Grants for arts and culture".to_string();
    c
}

/// Mismatched on every dimension: excluded by strategic scoring
pub fn mismatched_candidate(id: &str) -> Candidate {
    let mut c = Candidate::new(id, "Lone Star Literacy Fund");
    c.category_code = Some("B20".to_string());
    c.funding_capacity = Some(10_000.0);
    c.geographic_tags = vec!["TX".to_string()];
    c.focus_tags = vec!["literacy".to_string()];
    c.description = "Reading programs for elementary schools".to_string();
    c
}

fn well_matched(id: &str, name: &str) -> Candidate {
    let mut c = Candidate::new(id, name);
    c.category_code = Some("K31".to_string());
    c.funding_capacity = Some(5_000_000.0);
    c.geographic_tags = vec!["WA".to_string()];
    c.focus_tags = vec!["food security".to_string(), "nutrition".to_string()];
    c.description = "Grants for food security and nutrition programs".to_string();
    c
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration with local scoring on and enrichment enabled
pub fn pipeline_config(failure_policy: &str, batch_size: usize, max_candidates: usize) -> TomlConfig {
    TomlConfig::from_toml_str(&format!(
        r#"
        [pipeline]
        enable_local_scoring = true

        [enrichment]
        endpoint = "https://intel.example.org/enrich"
        timeout_secs = 5
        batch_size = {}
        max_candidates = {}
        failure_policy = "{}"
        "#,
        batch_size, max_candidates, failure_policy
    ))
    .expect("test configuration parses")
}

// ============================================================================
// Scripted enrichment service
// ============================================================================

/// How `ScriptedEnrichment` answers a batch
#[derive(Debug, Clone)]
pub enum Reply {
    /// `Pursue` record for every candidate
    Pursue,
    /// `Decline` for the listed ids, `Pursue` for the rest
    Decline(Vec<String>),
    /// Whole call fails
    Broken,
    /// Whole call times out at the client
    TimedOut,
    /// Never answers
    Hang,
}

pub struct ScriptedEnrichment {
    reply: Reply,
    calls: AtomicUsize,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedEnrichment {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ids of every candidate submitted so far
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

fn record(candidate_id: &str, recommendation: Recommendation) -> IntelligenceOutcome {
    IntelligenceOutcome::Record(IntelligenceRecord {
        candidate_id: candidate_id.to_string(),
        recommendation,
        summary: format!("Intelligence for {}", candidate_id),
        fit_estimate: Some(0.8),
        estimated_award: Some(25_000.0),
        application_deadline: None,
        notes: Vec::new(),
    })
}

#[async_trait]
impl EnrichmentService for ScriptedEnrichment {
    fn name(&self) -> &str {
        "scripted"
    }

    fn cost_per_candidate(&self) -> f64 {
        MOCK_COST_PER_CANDIDATE
    }

    async fn submit(
        &self,
        batch: &[Candidate],
        _context: &EnrichmentContext,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap()
            .extend(batch.iter().map(|c| c.id.clone()));

        let records = match &self.reply {
            Reply::Pursue => batch
                .iter()
                .map(|c| record(&c.id, Recommendation::Pursue))
                .collect(),
            Reply::Decline(ids) => batch
                .iter()
                .map(|c| {
                    let recommendation = if ids.contains(&c.id) {
                        Recommendation::Decline
                    } else {
                        Recommendation::Pursue
                    };
                    record(&c.id, recommendation)
                })
                .collect(),
            Reply::Broken => return Err(EnrichmentError::Api("503 Service Unavailable".to_string())),
            Reply::TimedOut => {
                return Err(EnrichmentError::Timeout("operation timed out".to_string()))
            }
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Vec::new()
            }
        };

        Ok(EnrichmentResponse { records })
    }
}
