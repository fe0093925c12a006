//! Stage Executor
//!
//! Runs one stage with timing, cost accounting, timeout and failure policy.
//!
//! # Outcomes
//! - stage returns ⇒ `Passed`, survivors restricted to input ids
//! - timeout ⇒ `Timeout`, zero survivors
//! - `StageError::Service` ⇒ `FailedOpen` (input passed through) or
//!   `FailedClosed` (zero survivors) per `FailurePolicy`
//! - `StageError::Fatal` ⇒ `PipelineError::Fatal`
//!
//! Cost is charged for every invoked stage, whatever its outcome:
//! `cost_per_candidate * billable_candidates(candidates_in)`.

use super::{PipelineCandidate, Stage, StageMetrics, StageName, StageOutcome};
use crate::error::{PipelineError, StageError};
use crate::types::RequesterProfile;
use grantscope_common::FailurePolicy;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timeout and failure handling for one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePolicy {
    /// Upper bound on one `execute` call; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

impl StagePolicy {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self {
            timeout: None,
            failure_policy,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A stage bound to its policy
#[derive(Clone)]
pub struct StageExecutor {
    stage: Arc<dyn Stage>,
    policy: StagePolicy,
}

impl StageExecutor {
    pub fn new<S: Stage + 'static>(stage: S, policy: StagePolicy) -> Self {
        Self {
            stage: Arc::new(stage),
            policy,
        }
    }

    pub fn from_arc(stage: Arc<dyn Stage>, policy: StagePolicy) -> Self {
        Self { stage, policy }
    }

    pub fn name(&self) -> StageName {
        self.stage.name()
    }

    pub fn policy(&self) -> StagePolicy {
        self.policy
    }

    /// Execute the stage on a batch
    ///
    /// # Returns
    /// Survivors (a subset of `candidates`) and the stage metrics
    ///
    /// # Errors
    /// `PipelineError::Fatal` when the stage reports an unrecoverable error
    pub async fn run(
        &self,
        candidates: Vec<PipelineCandidate>,
        profile: &RequesterProfile,
    ) -> Result<(Vec<PipelineCandidate>, StageMetrics), PipelineError> {
        let name = self.stage.name();
        let candidates_in = candidates.len();
        let cost = self.stage.cost_per_candidate()
            * self.stage.billable_candidates(candidates_in) as f64;
        let input_ids: HashSet<String> = candidates.iter().map(|c| c.id().to_string()).collect();
        let passthrough = match self.policy.failure_policy {
            FailurePolicy::FailOpen => Some(candidates.clone()),
            FailurePolicy::FailClosed => None,
        };

        debug!(stage = %name, candidates_in, "Stage starting");
        let started = Instant::now();

        let result = match self.policy.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.stage.execute(candidates, profile)).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::Timeout(limit.as_millis() as u64)),
                }
            }
            None => self.stage.execute(candidates, profile).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (survivors, outcome, success_rate, error) = match result {
            Ok(output) => {
                let survivors = restrict_to_input(output.survivors, &input_ids);
                let success_rate = if candidates_in == 0 {
                    1.0
                } else {
                    output.processed_ok.min(candidates_in) as f64 / candidates_in as f64
                };
                (survivors, StageOutcome::Passed, success_rate, None)
            }
            Err(StageError::Timeout(ms)) => {
                warn!(stage = %name, timeout_ms = ms, "Stage timed out, no survivors");
                (
                    Vec::new(),
                    StageOutcome::Timeout,
                    0.0,
                    Some(StageError::Timeout(ms).to_string()),
                )
            }
            Err(StageError::Service(message)) => match passthrough {
                Some(input) => {
                    warn!(stage = %name, error = %message, "Stage failed open, passing candidates through");
                    (input, StageOutcome::FailedOpen, 0.0, Some(message))
                }
                None => {
                    warn!(stage = %name, error = %message, "Stage failed closed, dropping candidates");
                    (Vec::new(), StageOutcome::FailedClosed, 0.0, Some(message))
                }
            },
            Err(StageError::Fatal(message)) => {
                return Err(PipelineError::Fatal {
                    stage: name,
                    message,
                });
            }
        };

        let metrics = StageMetrics {
            stage: name,
            candidates_in,
            candidates_out: survivors.len(),
            elapsed_ms,
            cost,
            success_rate,
            outcome,
            error,
        };

        info!(
            stage = %name,
            candidates_in,
            candidates_out = metrics.candidates_out,
            elapsed_ms,
            cost,
            outcome = ?outcome,
            "Stage completed"
        );

        Ok((survivors, metrics))
    }

    /// Metrics for a stage that was not invoked
    pub fn skipped(stage: StageName) -> StageMetrics {
        StageMetrics {
            stage,
            candidates_in: 0,
            candidates_out: 0,
            elapsed_ms: 0,
            cost: 0.0,
            success_rate: 1.0,
            outcome: StageOutcome::Skipped,
            error: None,
        }
    }
}

/// Drop survivors whose id was not in the input, and repeated ids
fn restrict_to_input(
    survivors: Vec<PipelineCandidate>,
    input_ids: &HashSet<String>,
) -> Vec<PipelineCandidate> {
    let mut seen = HashSet::new();
    survivors
        .into_iter()
        .filter(|c| input_ids.contains(c.id()) && seen.insert(c.id().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageOutput;
    use crate::types::Candidate;
    use async_trait::async_trait;

    enum Behaviour {
        KeepFirst,
        Invent,
        Service,
        Fatal,
        Hang,
        CallTimedOut,
    }

    struct ScriptedStage(Behaviour);

    #[async_trait]
    impl Stage for ScriptedStage {
        fn name(&self) -> StageName {
            StageName::EnrichmentBridge
        }

        fn cost_per_candidate(&self) -> f64 {
            0.5
        }

        async fn execute(
            &self,
            mut candidates: Vec<PipelineCandidate>,
            _profile: &RequesterProfile,
        ) -> Result<StageOutput, StageError> {
            match self.0 {
                Behaviour::KeepFirst => {
                    let processed_ok = candidates.len();
                    candidates.truncate(1);
                    Ok(StageOutput {
                        survivors: candidates,
                        processed_ok,
                    })
                }
                Behaviour::Invent => {
                    let mut survivors = candidates.clone();
                    survivors.extend(candidates);
                    survivors.push(PipelineCandidate::new(Candidate::new("intruder", "Intruder")));
                    Ok(StageOutput {
                        survivors,
                        processed_ok: 0,
                    })
                }
                Behaviour::Service => Err(StageError::Service("upstream 503".to_string())),
                Behaviour::Fatal => Err(StageError::Fatal("corrupt state".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(StageOutput::default())
                }
                Behaviour::CallTimedOut => Err(StageError::Timeout(2000)),
            }
        }
    }

    fn batch() -> Vec<PipelineCandidate> {
        vec![
            Candidate::new("a", "Alpha Fund").into(),
            Candidate::new("b", "Beta Trust").into(),
        ]
    }

    fn executor(behaviour: Behaviour, policy: FailurePolicy) -> StageExecutor {
        StageExecutor::new(ScriptedStage(behaviour), StagePolicy::new(policy))
    }

    #[tokio::test]
    async fn test_passed_stage_metrics() {
        let exec = executor(Behaviour::KeepFirst, FailurePolicy::FailClosed);
        let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(metrics.outcome, StageOutcome::Passed);
        assert_eq!(metrics.candidates_in, 2);
        assert_eq!(metrics.candidates_out, 1);
        assert_eq!(metrics.cost, 1.0);
        assert_eq!(metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_stage_cannot_grow_the_set() {
        let exec = executor(Behaviour::Invent, FailurePolicy::FailClosed);
        let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
        let ids: Vec<&str> = survivors.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(metrics.candidates_out, 2);
    }

    #[tokio::test]
    async fn test_service_error_fail_open_passes_through() {
        let exec = executor(Behaviour::Service, FailurePolicy::FailOpen);
        let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
        assert_eq!(survivors.len(), 2);
        assert_eq!(metrics.outcome, StageOutcome::FailedOpen);
        assert!(metrics.error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_service_error_fail_closed_drops_all() {
        let exec = executor(Behaviour::Service, FailurePolicy::FailClosed);
        let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
        assert!(survivors.is_empty());
        assert_eq!(metrics.outcome, StageOutcome::FailedClosed);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let exec = executor(Behaviour::Fatal, FailurePolicy::FailOpen);
        let err = exec.run(batch(), &RequesterProfile::default()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Fatal { stage: StageName::EnrichmentBridge, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_no_survivors() {
        let exec = StageExecutor::new(
            ScriptedStage(Behaviour::Hang),
            StagePolicy::new(FailurePolicy::FailOpen).with_timeout(Duration::from_secs(5)),
        );
        let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
        assert!(survivors.is_empty());
        assert_eq!(metrics.outcome, StageOutcome::Timeout);
        assert!(metrics.elapsed_ms >= 5000);
    }

    #[tokio::test]
    async fn test_timed_out_call_ignores_failure_policy() {
        for policy in [FailurePolicy::FailOpen, FailurePolicy::FailClosed] {
            let exec = executor(Behaviour::CallTimedOut, policy);
            let (survivors, metrics) = exec.run(batch(), &RequesterProfile::default()).await.unwrap();
            assert!(survivors.is_empty());
            assert_eq!(metrics.outcome, StageOutcome::Timeout);
            assert_eq!(metrics.candidates_out, 0);
            assert_eq!(metrics.success_rate, 0.0);
            assert_eq!(metrics.cost, 1.0);
            assert!(metrics.error.as_deref().unwrap().contains("2000 ms"));
        }
    }

    #[tokio::test]
    async fn test_empty_input_success_rate() {
        let exec = executor(Behaviour::KeepFirst, FailurePolicy::FailClosed);
        let (_, metrics) = exec.run(Vec::new(), &RequesterProfile::default()).await.unwrap();
        assert_eq!(metrics.success_rate, 1.0);
        assert_eq!(metrics.cost, 0.0);
    }

    #[test]
    fn test_skipped_metrics() {
        let metrics = StageExecutor::skipped(StageName::LocalScoring);
        assert_eq!(metrics.outcome, StageOutcome::Skipped);
        assert_eq!(metrics.candidates_in, 0);
        assert_eq!(metrics.cost, 0.0);
    }
}
