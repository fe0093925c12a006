//! grantscope-core
//!
//! Progressive multi-stage filtering and track-specific scoring of funding
//! candidates for a requesting organization.
//!
//! - `tracks`: closed set of scoring tracks and their registry
//! - `scoring`: dimension scorers, confidence model, track scorer
//! - `stages`: stage trait, executor, concrete stages
//! - `enrichment`: external intelligence service contract and HTTP client
//! - `workflow`: orchestrator, run report, progress events
//! - `db`: result stores

pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod scoring;
pub mod stages;
pub mod tracks;
pub mod types;
pub mod workflow;

pub use crate::config::{build_enrichment_client, build_orchestrator, build_registry};
pub use crate::error::{PipelineError, PipelineFatalError, ScoringError, StageError};
pub use crate::scoring::TrackScorer;
pub use crate::workflow::{PipelineOrchestrator, PipelineRun};
