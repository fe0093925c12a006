//! Bootstrap configuration and root folder resolution
//!
//! The TOML file carries everything the pipeline needs at startup. It is read
//! once; changes require a restart.
//!
//! # Lookup Priority
//!
//! Config file:
//! 1. Command-line argument
//! 2. `GRANTSCOPE_CONFIG` environment variable
//! 3. `~/.config/grantscope/config.toml` (if present)
//! 4. Built-in defaults (no file)
//!
//! Root folder:
//! 1. Command-line argument
//! 2. `GRANTSCOPE_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML file
//! 4. OS-dependent default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GRANTSCOPE_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "GRANTSCOPE_ROOT_FOLDER";

/// Environment variable carrying the enrichment API key
pub const ENRICHMENT_API_KEY_ENV_VAR: &str = "GRANTSCOPE_ENRICHMENT_API_KEY";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the results database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local pipeline stage settings
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Remote enrichment settings (absent = enrichment disabled)
    #[serde(default)]
    pub enrichment: Option<EnrichmentSection>,

    /// Per-track overrides applied on top of the built-in registry
    #[serde(default)]
    pub tracks: Vec<TrackSection>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// `[pipeline]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// Run the local scoring stage alongside strategic scoring
    #[serde(default = "default_true")]
    pub enable_local_scoring: bool,

    /// Lowest promotion category that survives strategic scoring
    /// (snake_case name, e.g. "low_priority")
    #[serde(default)]
    pub min_promotion: Option<String>,

    /// Minimum local-fit score that survives local scoring
    #[serde(default = "default_min_local_fit")]
    pub min_local_fit: f64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            enable_local_scoring: true,
            min_promotion: None,
            min_local_fit: default_min_local_fit(),
        }
    }
}

/// Behaviour of a remote stage when its service fails
///
/// Has no `Default`; every configuration names one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Pass the stage input through unfiltered
    FailOpen,
    /// Drop every candidate of the stage
    FailClosed,
}

/// `[enrichment]` section
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSection {
    /// Run the enrichment bridge stage
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Service endpoint (full URL)
    pub endpoint: String,

    /// API key (the environment variable takes priority)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whole-stage timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Declared cost per submitted candidate
    #[serde(default = "default_cost_per_candidate")]
    pub cost_per_candidate: f64,

    /// Candidates per service call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum candidates forwarded to the service per run
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Maximum service calls in flight
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Client-side rate limit
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Required: fail_open or fail_closed
    pub failure_policy: FailurePolicy,
}

/// `[[tracks]]` entry: partial override of one built-in track
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackSection {
    /// Track identifier (snake_case)
    pub id: String,
    #[serde(default)]
    pub revenue_min: Option<f64>,
    #[serde(default)]
    pub revenue_max: Option<f64>,
    /// Full replacement weight map keyed by dimension name
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub auto_promote: Option<f64>,
    #[serde(default)]
    pub high_priority: Option<f64>,
    #[serde(default)]
    pub medium_priority: Option<f64>,
    #[serde(default)]
    pub low_priority: Option<f64>,
    #[serde(default)]
    pub auto_promote_confidence: Option<f64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_local_fit() -> f64 {
    0.4
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_cost_per_candidate() -> f64 {
    0.05
}

fn default_batch_size() -> usize {
    10
}

fn default_max_candidates() -> usize {
    25
}

fn default_max_concurrent_requests() -> usize {
    2
}

fn default_requests_per_minute() -> u32 {
    30
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load the config file, falling back to defaults when none exists
    ///
    /// A file that exists but cannot be parsed is an error; a missing file is not.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Enrichment API key: environment variable first, then TOML
    pub fn enrichment_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(ENRICHMENT_API_KEY_ENV_VAR) {
            if is_valid_key(&key) {
                return Some(key);
            }
        }
        self.enrichment
            .as_ref()
            .and_then(|e| e.api_key.clone())
            .filter(|k| is_valid_key(k))
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pipeline.min_local_fit) {
            return Err(Error::Config(format!(
                "pipeline.min_local_fit must be within 0.0-1.0, got {}",
                self.pipeline.min_local_fit
            )));
        }
        if let Some(enrichment) = &self.enrichment {
            if enrichment.endpoint.trim().is_empty() {
                return Err(Error::Config("enrichment.endpoint must not be empty".to_string()));
            }
            if enrichment.batch_size == 0 || enrichment.max_concurrent_requests == 0 {
                return Err(Error::Config(
                    "enrichment.batch_size and enrichment.max_concurrent_requests must be positive"
                        .to_string(),
                ));
            }
            if enrichment.timeout_secs == 0 {
                return Err(Error::Config(
                    "enrichment.timeout_secs must be positive".to_string(),
                ));
            }
            if enrichment.requests_per_minute == 0 {
                return Err(Error::Config(
                    "enrichment.requests_per_minute must be positive".to_string(),
                ));
            }
            if !enrichment.cost_per_candidate.is_finite() || enrichment.cost_per_candidate < 0.0 {
                return Err(Error::Config(format!(
                    "enrichment.cost_per_candidate must be a non-negative number, got {}",
                    enrichment.cost_per_candidate
                )));
            }
        }
        Ok(())
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Locate the config file following the documented priority order
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("grantscope").join("config.toml"))
        .filter(|p| p.exists())
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("grantscope"))
        .unwrap_or_else(|| PathBuf::from("./grantscope_data"))
}

/// Creates the root folder and names the files kept inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
            std::fs::create_dir_all(&self.root_folder)?;
        }
        Ok(())
    }

    /// Path of the SQLite results database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("grantscope.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.pipeline.enable_local_scoring);
        assert_eq!(config.pipeline.min_local_fit, 0.4);
        assert!(config.enrichment.is_none());
        assert!(config.tracks.is_empty());
    }

    #[test]
    fn test_enrichment_requires_failure_policy() {
        let toml = r#"
            [enrichment]
            endpoint = "https://enrich.example.org/v1/batch"
        "#;
        let result = TomlConfig::from_toml_str(toml);
        assert!(result.is_err(), "failure_policy must be explicit");
    }

    #[test]
    fn test_enrichment_section_defaults() {
        let toml = r#"
            [enrichment]
            endpoint = "https://enrich.example.org/v1/batch"
            failure_policy = "fail_closed"
        "#;
        let config = TomlConfig::from_toml_str(toml).unwrap();
        let enrichment = config.enrichment.unwrap();
        assert!(enrichment.enabled);
        assert_eq!(enrichment.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(enrichment.timeout_secs, 60);
        assert_eq!(enrichment.batch_size, 10);
        assert_eq!(enrichment.max_candidates, 25);
    }

    #[test]
    fn test_out_of_range_local_fit_rejected() {
        let toml = r#"
            [pipeline]
            min_local_fit = 1.5
        "#;
        assert!(TomlConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let toml = r#"
            [enrichment]
            endpoint = "https://enrich.example.org/v1/batch"
            failure_policy = "fail_open"
            batch_size = 0
        "#;
        assert!(TomlConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r#"
            [enrichment]
            endpoint = "https://enrich.example.org/v1/batch"
            failure_policy = "fail_closed"
            timeout_secs = 0
        "#;
        assert!(matches!(TomlConfig::from_toml_str(toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
