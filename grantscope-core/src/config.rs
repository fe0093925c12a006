//! Pipeline assembly from the bootstrap configuration
//!
//! Turns a `TomlConfig` into the track registry, the stage executors and the
//! orchestrator. Local stages never call out, so they use fail-closed with no
//! timeout; the enrichment stage takes its policy and timeout from the
//! `[enrichment]` section.

use crate::enrichment::{EnrichmentClientConfig, EnrichmentService, HttpEnrichmentClient};
use crate::scoring::TrackScorer;
use crate::stages::{
    EnrichmentBridgeStage, LocalScoringStage, StageExecutor, StagePolicy, StrategicScoringStage,
    ValidationStage,
};
use crate::tracks::TrackRegistry;
use crate::types::PromotionCategory;
use crate::workflow::PipelineOrchestrator;
use grantscope_common::config::{PipelineSection, TomlConfig};
use grantscope_common::{Error, FailurePolicy, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Track registry with the configured overrides applied
pub fn build_registry(config: &TomlConfig) -> Result<TrackRegistry> {
    TrackRegistry::with_overrides(&config.tracks).map_err(|e| Error::Config(e.to_string()))
}

/// Lowest promotion category kept by strategic scoring (default `low_priority`)
pub fn min_promotion(section: &PipelineSection) -> Result<PromotionCategory> {
    match &section.min_promotion {
        Some(name) => name
            .parse()
            .map_err(|e| Error::Config(format!("pipeline.min_promotion: {}", e))),
        None => Ok(PromotionCategory::LowPriority),
    }
}

/// HTTP enrichment client, if enrichment is configured and enabled
///
/// # Errors
/// `Error::Config` when enrichment is enabled but no API key is available or
/// the client cannot be built
pub fn build_enrichment_client(config: &TomlConfig) -> Result<Option<Arc<dyn EnrichmentService>>> {
    let Some(section) = config.enrichment.as_ref().filter(|e| e.enabled) else {
        return Ok(None);
    };

    let api_key = config.enrichment_api_key().ok_or_else(|| {
        Error::Config(format!(
            "enrichment is enabled but no API key is set ({} or enrichment.api_key)",
            grantscope_common::config::ENRICHMENT_API_KEY_ENV_VAR
        ))
    })?;

    let client = HttpEnrichmentClient::new(EnrichmentClientConfig::from_section(section, api_key))
        .map_err(|e| Error::Config(e.to_string()))?;

    info!(endpoint = %section.endpoint, "Enrichment client configured");
    let client: Arc<dyn EnrichmentService> = Arc::new(client);
    Ok(Some(client))
}

/// Assemble the orchestrator
///
/// `enrichment` is the service used by the enrichment stage; the stage is
/// left out when the service is `None` or `[enrichment]` is absent / disabled.
pub fn build_orchestrator(
    config: &TomlConfig,
    enrichment: Option<Arc<dyn EnrichmentService>>,
) -> Result<PipelineOrchestrator> {
    let registry = build_registry(config)?;
    let scorer = Arc::new(TrackScorer::new(Arc::new(registry)));
    let local_policy = StagePolicy::new(FailurePolicy::FailClosed);

    let validation = StageExecutor::new(ValidationStage::new(), local_policy);
    let strategic = StageExecutor::new(
        StrategicScoringStage::new(scorer.clone()).with_min_promotion(min_promotion(&config.pipeline)?),
        local_policy,
    );

    let local = config.pipeline.enable_local_scoring.then(|| {
        StageExecutor::new(
            LocalScoringStage::new(scorer.clone()).with_min_local_fit(config.pipeline.min_local_fit),
            local_policy,
        )
    });

    let section = config.enrichment.as_ref().filter(|e| e.enabled);
    let enrichment = match (section, enrichment) {
        (Some(section), Some(service)) => {
            let stage = EnrichmentBridgeStage::new(service)
                .with_batch_size(section.batch_size)
                .with_max_candidates(section.max_candidates)
                .with_max_concurrent_requests(section.max_concurrent_requests)
                .with_request_timeout(Duration::from_secs(section.timeout_secs));
            let policy = StagePolicy::new(section.failure_policy)
                .with_timeout(Duration::from_secs(section.timeout_secs));
            Some(StageExecutor::new(stage, policy))
        }
        (Some(_), None) => {
            warn!("Enrichment enabled but no service available, stage will be skipped");
            None
        }
        (None, _) => None,
    };

    Ok(PipelineOrchestrator::new(validation, strategic, local, enrichment))
}
