//! Pipeline Orchestrator
//!
//! Sequences the stages for one batch of candidates and assembles the report.
//!
//! # Architecture
//! - **Validation**: structural checks on everything the source yields
//! - **Scoring**: strategic and (optional) local scoring run concurrently on
//!   the validation survivors; a candidate survives only if it passes both
//! - **Enrichment**: optional remote stage on the scoring survivors
//!
//! # Error Handling
//! - Stage timeouts and service failures are absorbed by the stage executors
//! - Once a stage leaves no survivors, later stages are recorded as skipped
//!   and never invoked
//! - A fatal stage error aborts the run with the metrics gathered so far
//! - Store failures are logged and never fail the run
//!
//! # Example
//! ```rust,ignore
//! let orchestrator = PipelineOrchestrator::new(validation, strategic, Some(local), None)
//!     .with_store(store);
//! let run = orchestrator.run(futures::stream::iter(candidates), &profile).await?;
//! ```

use super::{PipelineEvent, PipelineRun, PipelineStatus, PrioritizedCandidate};
use crate::db::{ResultStore, StoredRecord};
use crate::error::{PipelineError, PipelineFatalError};
use crate::stages::{priority_order, PipelineCandidate, StageExecutor, StageMetrics, StageName};
use crate::types::{Candidate, RequesterProfile};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates the stages of a pipeline run
pub struct PipelineOrchestrator {
    validation: StageExecutor,
    strategic: StageExecutor,
    local: Option<StageExecutor>,
    enrichment: Option<StageExecutor>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
    store: Option<Arc<dyn ResultStore>>,
}

impl PipelineOrchestrator {
    pub fn new(
        validation: StageExecutor,
        strategic: StageExecutor,
        local: Option<StageExecutor>,
        enrichment: Option<StageExecutor>,
    ) -> Self {
        Self {
            validation,
            strategic,
            local,
            enrichment,
            event_tx: None,
            store: None,
        }
    }

    /// Report progress on an event channel
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Persist results of completed runs
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run one batch of candidates through the pipeline
    ///
    /// # Returns
    /// A `Completed` run, even when every stage degraded to no survivors
    ///
    /// # Errors
    /// `PipelineFatalError` when a stage fails fatally, carrying the metrics
    /// of the stages completed before the failure
    pub async fn run<S>(
        &self,
        candidates: S,
        profile: &RequesterProfile,
    ) -> Result<PipelineRun, PipelineFatalError>
    where
        S: Stream<Item = Candidate> + Send,
    {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(batch_id = %batch_id, profile_id = %profile.profile_id, "Pipeline run started");
        self.emit_event(PipelineEvent::RunStarted {
            batch_id,
            profile_id: profile.profile_id.clone(),
            timestamp: started_at.timestamp(),
        })
        .await;

        let input: Vec<PipelineCandidate> = candidates.map(PipelineCandidate::from).collect().await;

        let mut stage_metrics = Vec::new();
        let survivors = match self
            .run_stages(batch_id, input, profile, &mut stage_metrics)
            .await
        {
            Ok(survivors) => survivors,
            Err(source) => {
                let PipelineError::Fatal { stage, message } = &source;
                error!(batch_id = %batch_id, stage = %stage, error = %message, "Pipeline run aborted");
                self.emit_event(PipelineEvent::RunFailed {
                    batch_id,
                    stage: *stage,
                    message: message.clone(),
                })
                .await;

                let failed = PipelineRun {
                    batch_id,
                    profile_id: profile.profile_id.clone(),
                    status: PipelineStatus::Failed,
                    total_cost: total_cost(&stage_metrics),
                    stage_metrics: stage_metrics.clone(),
                    prioritized: Vec::new(),
                    started_at,
                    completed_at: Utc::now(),
                };
                self.persist(&profile.profile_id, StoredRecord::Run(failed))
                    .await;

                return Err(PipelineFatalError {
                    batch_id,
                    completed_stages: stage_metrics,
                    source,
                });
            }
        };

        let scoring_records: Vec<StoredRecord> = survivors
            .iter()
            .filter_map(|pc| pc.scoring.clone())
            .map(StoredRecord::Scoring)
            .collect();
        let prioritized = prioritize(survivors);

        let run = PipelineRun {
            batch_id,
            profile_id: profile.profile_id.clone(),
            status: PipelineStatus::Completed,
            total_cost: total_cost(&stage_metrics),
            stage_metrics,
            prioritized,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            batch_id = %batch_id,
            survivors = run.prioritized.len(),
            total_cost = run.total_cost,
            "Pipeline run completed"
        );
        self.emit_event(PipelineEvent::RunCompleted {
            batch_id,
            survivors: run.prioritized.len(),
            total_cost: run.total_cost,
            timestamp: run.completed_at.timestamp(),
        })
        .await;

        for record in scoring_records {
            self.persist(&profile.profile_id, record).await;
        }
        self.persist(&profile.profile_id, StoredRecord::Run(run.clone()))
            .await;

        Ok(run)
    }

    async fn run_stages(
        &self,
        batch_id: Uuid,
        input: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
        metrics: &mut Vec<StageMetrics>,
    ) -> Result<Vec<PipelineCandidate>, PipelineError> {
        let survivors = self
            .run_stage(&self.validation, batch_id, input, profile, metrics)
            .await?;

        let survivors = if survivors.is_empty() {
            self.skip(StageName::StrategicScoring, batch_id, metrics).await;
            self.skip(StageName::LocalScoring, batch_id, metrics).await;
            survivors
        } else {
            self.run_scoring(batch_id, survivors, profile, metrics)
                .await?
        };

        match &self.enrichment {
            Some(enrichment) if !survivors.is_empty() => {
                self.run_stage(enrichment, batch_id, survivors, profile, metrics)
                    .await
            }
            _ => {
                self.skip(StageName::EnrichmentBridge, batch_id, metrics)
                    .await;
                Ok(survivors)
            }
        }
    }

    /// Strategic and local scoring, concurrently when local scoring is enabled
    async fn run_scoring(
        &self,
        batch_id: Uuid,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
        metrics: &mut Vec<StageMetrics>,
    ) -> Result<Vec<PipelineCandidate>, PipelineError> {
        let Some(local) = &self.local else {
            let survivors = self
                .run_stage(&self.strategic, batch_id, candidates, profile, metrics)
                .await?;
            self.skip(StageName::LocalScoring, batch_id, metrics).await;
            return Ok(survivors);
        };

        let candidates_in = candidates.len();
        for stage in [StageName::StrategicScoring, StageName::LocalScoring] {
            self.emit_event(PipelineEvent::StageStarted {
                batch_id,
                stage,
                candidates_in,
            })
            .await;
        }

        let (strategic, local) = tokio::join!(
            self.strategic.run(candidates.clone(), profile),
            local.run(candidates, profile)
        );

        // Record whichever stage finished before surfacing a fatal error
        let strategic = match strategic {
            Ok((survivors, m)) => {
                self.record(batch_id, m, metrics).await;
                Ok(survivors)
            }
            Err(e) => Err(e),
        };
        let local = match local {
            Ok((survivors, m)) => {
                self.record(batch_id, m, metrics).await;
                Ok(survivors)
            }
            Err(e) => Err(e),
        };
        let (strategic, local) = (strategic?, local?);

        let mut local_fit: HashMap<String, Option<f64>> = local
            .into_iter()
            .map(|pc| (pc.candidate.id, pc.local_fit))
            .collect();

        Ok(strategic
            .into_iter()
            .filter_map(|mut pc| {
                let fit = local_fit.remove(pc.id())?;
                pc.local_fit = fit;
                Some(pc)
            })
            .collect())
    }

    async fn run_stage(
        &self,
        executor: &StageExecutor,
        batch_id: Uuid,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
        metrics: &mut Vec<StageMetrics>,
    ) -> Result<Vec<PipelineCandidate>, PipelineError> {
        self.emit_event(PipelineEvent::StageStarted {
            batch_id,
            stage: executor.name(),
            candidates_in: candidates.len(),
        })
        .await;

        let (survivors, stage_metrics) = executor.run(candidates, profile).await?;
        self.record(batch_id, stage_metrics, metrics).await;
        Ok(survivors)
    }

    async fn record(&self, batch_id: Uuid, stage_metrics: StageMetrics, metrics: &mut Vec<StageMetrics>) {
        self.emit_event(PipelineEvent::StageCompleted {
            batch_id,
            metrics: stage_metrics.clone(),
        })
        .await;
        metrics.push(stage_metrics);
    }

    async fn skip(&self, stage: StageName, batch_id: Uuid, metrics: &mut Vec<StageMetrics>) {
        info!(batch_id = %batch_id, stage = %stage, "Stage skipped");
        self.emit_event(PipelineEvent::StageSkipped { batch_id, stage })
            .await;
        metrics.push(StageExecutor::skipped(stage));
    }

    async fn persist(&self, profile_id: &str, record: StoredRecord) {
        if let Some(store) = &self.store {
            let kind = record.kind();
            if let Err(e) = store.save(profile_id, record).await {
                warn!(profile_id, kind, error = %e, "Failed to persist pipeline record");
            }
        }
    }

    /// Emit pipeline event if channel configured
    async fn emit_event(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn total_cost(metrics: &[StageMetrics]) -> f64 {
    metrics.iter().map(|m| m.cost).sum()
}

/// Sort survivors by priority and assign ranks
fn prioritize(mut survivors: Vec<PipelineCandidate>) -> Vec<PrioritizedCandidate> {
    survivors.sort_by(priority_order);
    let mut prioritized = Vec::with_capacity(survivors.len());
    for pc in survivors {
        let id = pc.candidate.id.clone();
        match PrioritizedCandidate::from_survivor(prioritized.len() + 1, pc) {
            Some(p) => prioritized.push(p),
            None => warn!(candidate_id = %id, "Unscored survivor left out of the ranking"),
        }
    }
    prioritized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::TrackScorer;
    use crate::stages::{StageOutcome, StagePolicy, StrategicScoringStage, ValidationStage};
    use crate::tracks::TrackRegistry;
    use grantscope_common::FailurePolicy;

    fn orchestrator() -> PipelineOrchestrator {
        let scorer = Arc::new(TrackScorer::new(Arc::new(TrackRegistry::new())));
        PipelineOrchestrator::new(
            StageExecutor::new(ValidationStage::new(), StagePolicy::new(FailurePolicy::FailClosed)),
            StageExecutor::new(
                StrategicScoringStage::new(scorer),
                StagePolicy::new(FailurePolicy::FailClosed),
            ),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_empty_source_records_all_stages() {
        let run = orchestrator()
            .run(futures::stream::empty::<Candidate>(), &RequesterProfile::default())
            .await
            .unwrap();

        assert_eq!(run.status, PipelineStatus::Completed);
        assert!(run.prioritized.is_empty());
        let stages: Vec<(StageName, StageOutcome)> =
            run.stage_metrics.iter().map(|m| (m.stage, m.outcome)).collect();
        assert_eq!(
            stages,
            vec![
                (StageName::Validation, StageOutcome::Passed),
                (StageName::StrategicScoring, StageOutcome::Skipped),
                (StageName::LocalScoring, StageOutcome::Skipped),
                (StageName::EnrichmentBridge, StageOutcome::Skipped),
            ]
        );
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let (tx, mut rx) = mpsc::channel(32);
        let orchestrator = orchestrator().with_events(tx);
        let candidates = vec![Candidate::new("c-1", "Lakeshore Fund")];
        orchestrator
            .run(futures::stream::iter(candidates), &RequesterProfile::default())
            .await
            .unwrap();
        drop(orchestrator);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            let value = serde_json::to_value(&event).unwrap();
            kinds.push(value["type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds.first().map(String::as_str), Some("RunStarted"));
        assert_eq!(kinds.last().map(String::as_str), Some("RunCompleted"));
        assert!(kinds.iter().any(|k| k == "StageCompleted"));
    }
}
