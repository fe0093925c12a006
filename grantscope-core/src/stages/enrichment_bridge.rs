//! Enrichment bridge stage
//!
//! Forwards the highest-priority survivors to the external intelligence
//! service and keeps the candidates the service vouches for.
//!
//! # Flow
//! 1. Order candidates by priority; keep at most `max_candidates`
//! 2. Split into batches of `batch_size`
//! 3. Submit batches, at most `max_concurrent_requests` in flight
//! 4. Attach intelligence records; drop failure / parse-error markers and
//!    `Decline` recommendations
//!
//! Any failed batch call fails the stage with `StageError::Service`; the
//! executor then applies the configured failure policy to the whole input.
//! A batch call that timed out fails it with `StageError::Timeout` instead,
//! which leaves no survivors under either policy.
//!
//! Only the candidates kept after the `max_candidates` cut are billed.

use super::{priority_order, PipelineCandidate, Stage, StageName, StageOutput};
use crate::enrichment::{
    EnrichmentContext, EnrichmentService, IntelligenceOutcome, Recommendation,
};
use crate::error::StageError;
use crate::types::{Candidate, RequesterProfile};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_CANDIDATES: usize = 25;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 2;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct EnrichmentBridgeStage {
    service: Arc<dyn EnrichmentService>,
    batch_size: usize,
    max_candidates: usize,
    max_concurrent_requests: usize,
    /// Reported as the stage timeout when a service call times out
    request_timeout: Duration,
}

impl EnrichmentBridgeStage {
    pub fn new(service: Arc<dyn EnrichmentService>) -> Self {
        Self {
            service,
            batch_size: DEFAULT_BATCH_SIZE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests.max(1);
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[async_trait]
impl Stage for EnrichmentBridgeStage {
    fn name(&self) -> StageName {
        StageName::EnrichmentBridge
    }

    fn cost_per_candidate(&self) -> f64 {
        self.service.cost_per_candidate()
    }

    fn billable_candidates(&self, candidates_in: usize) -> usize {
        candidates_in.min(self.max_candidates)
    }

    async fn execute(
        &self,
        mut candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
    ) -> Result<StageOutput, StageError> {
        candidates.sort_by(priority_order);
        if candidates.len() > self.max_candidates {
            debug!(
                dropped = candidates.len() - self.max_candidates,
                max_candidates = self.max_candidates,
                "Truncating enrichment input"
            );
            candidates.truncate(self.max_candidates);
        }
        if candidates.is_empty() {
            return Ok(StageOutput::default());
        }

        let context = EnrichmentContext::new(Uuid::new_v4(), profile);
        let batches: Vec<Vec<Candidate>> = candidates
            .chunks(self.batch_size)
            .map(|chunk| chunk.iter().map(|pc| pc.candidate.clone()).collect())
            .collect();

        info!(
            service = self.service.name(),
            candidates = candidates.len(),
            batches = batches.len(),
            "Submitting candidates for enrichment"
        );

        let service = &self.service;
        let context = &context;
        let responses: Vec<_> = stream::iter(batches)
            .map(|batch| async move { service.submit(&batch, context).await })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await;

        let timeout_ms = self.request_timeout.as_millis() as u64;
        let mut outcomes: HashMap<String, IntelligenceOutcome> = HashMap::new();
        for response in responses {
            let response = response.map_err(|e| {
                warn!(service = self.service.name(), error = %e, "Enrichment batch failed");
                StageError::from_enrichment(e, timeout_ms)
            })?;
            for outcome in response.records {
                outcomes
                    .entry(outcome.candidate_id().to_string())
                    .or_insert(outcome);
            }
        }

        let mut processed_ok = 0;
        let mut survivors = Vec::with_capacity(candidates.len());
        for mut pc in candidates {
            match outcomes.remove(pc.id()) {
                Some(IntelligenceOutcome::Record(record)) => {
                    processed_ok += 1;
                    if record.recommendation == Recommendation::Decline {
                        debug!(candidate_id = %pc.id(), "Declined by enrichment service");
                        continue;
                    }
                    pc.intelligence = Some(record);
                    survivors.push(pc);
                }
                Some(IntelligenceOutcome::Failed { reason, .. }) => {
                    debug!(candidate_id = %pc.id(), reason = %reason, "Enrichment failed for candidate");
                }
                Some(IntelligenceOutcome::ParseError { .. }) => {
                    debug!(candidate_id = %pc.id(), "Unparseable enrichment record");
                }
                None => {
                    debug!(candidate_id = %pc.id(), "No enrichment record returned");
                }
            }
        }

        Ok(StageOutput {
            survivors,
            processed_ok,
        })
    }
}
