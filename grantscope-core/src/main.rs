//! grantscope - funding candidate discovery pipeline
//!
//! Runs a batch of discovered candidates through validation, track scoring,
//! local scoring and enrichment, and prints the prioritized report as JSON.
//!
//! # Commands
//! - `run`: full pipeline, results persisted under the profile id
//! - `score`: score candidates only (no filtering, no persistence)
//! - `history`: print stored records for a profile

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grantscope_common::config::{resolve_root_folder, RootFolderInitializer, TomlConfig};
use grantscope_core::db::{self, InMemoryStore, ResultStore, SqliteStore};
use grantscope_core::scoring::TrackScorer;
use grantscope_core::tracks::TrackId;
use grantscope_core::types::{Candidate, RequesterProfile};
use grantscope_core::{build_enrichment_client, build_orchestrator, build_registry};
use serde::de::DeserializeOwned;
use tracing::info;

/// Command-line arguments for grantscope
#[derive(Parser, Debug)]
#[command(name = "grantscope")]
#[command(about = "Progressive filtering and track scoring of funding candidates")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "GRANTSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the results database
    #[arg(long, global = true, env = "GRANTSCOPE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline
    Run {
        /// Requester profile (JSON object)
        #[arg(short, long)]
        profile: PathBuf,

        /// Candidates (JSON array)
        #[arg(long)]
        candidates: PathBuf,

        /// Results database (defaults to grantscope.db in the root folder)
        #[arg(long)]
        database: Option<PathBuf>,

        /// Keep results in memory only
        #[arg(long, conflicts_with = "database")]
        ephemeral: bool,
    },

    /// Score candidates without filtering
    Score {
        #[arg(short, long)]
        profile: PathBuf,

        #[arg(long)]
        candidates: PathBuf,

        /// Force a track instead of choosing one per candidate
        #[arg(long)]
        track: Option<String>,
    },

    /// Print stored records for a profile
    History {
        /// Requester profile id
        profile_id: String,

        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    grantscope_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting grantscope v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Run {
            profile,
            candidates,
            database,
            ephemeral,
        } => {
            let profile: RequesterProfile = read_json(&profile)?;
            let candidates: Vec<Candidate> = read_json(&candidates)?;

            let store: Arc<dyn ResultStore> = if ephemeral {
                Arc::new(InMemoryStore::new())
            } else {
                let path = database_path(database, args.root_folder.as_deref(), &config)?;
                open_store(&path).await?
            };

            let enrichment = build_enrichment_client(&config)?;
            let orchestrator = build_orchestrator(&config, enrichment)?.with_store(store);

            let source = async_stream::stream! {
                for candidate in candidates {
                    yield candidate;
                }
            };

            let run = orchestrator
                .run(source, &profile)
                .await
                .context("Pipeline run failed")?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }

        Command::Score {
            profile,
            candidates,
            track,
        } => {
            let profile: RequesterProfile = read_json(&profile)?;
            let candidates: Vec<Candidate> = read_json(&candidates)?;
            let track: Option<TrackId> = track
                .map(|t| t.parse::<TrackId>())
                .transpose()
                .context("Invalid --track")?;

            let scorer = TrackScorer::new(Arc::new(build_registry(&config)?));
            let results: Vec<_> = candidates
                .iter()
                .map(|c| match track {
                    Some(t) => scorer.score_opportunity_by_track(c, &profile, t),
                    None => scorer.score_opportunity(c, &profile),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Command::History {
            profile_id,
            database,
        } => {
            let path = database_path(database, args.root_folder.as_deref(), &config)?;
            let store = open_store(&path).await?;
            let records = store
                .load(&profile_id)
                .await
                .context("Failed to load records")?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Explicit path, or grantscope.db in the resolved root folder
fn database_path(
    explicit: Option<PathBuf>,
    root_folder: Option<&Path>,
    config: &TomlConfig,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let initializer = RootFolderInitializer::new(resolve_root_folder(root_folder, config));
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    Ok(initializer.database_path())
}

async fn open_store(path: &Path) -> Result<Arc<dyn ResultStore>> {
    info!("Database: {}", path.display());
    let pool = db::init_database_pool(path)
        .await
        .context("Failed to open results database")?;
    Ok(Arc::new(SqliteStore::new(pool)))
}
