//! Result persistence
//!
//! Scoring results and pipeline runs are stored as opaque JSON records keyed
//! by requester profile id. Two adapters share the `ResultStore` contract:
//! - `InMemoryStore` for tests and one-shot runs
//! - `SqliteStore` backed by `grantscope.db` in the root folder

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::types::ScoringResult;
use crate::workflow::PipelineRun;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// A persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StoredRecord {
    Scoring(ScoringResult),
    Run(PipelineRun),
}

impl StoredRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredRecord::Scoring(_) => "scoring",
            StoredRecord::Run(_) => "run",
        }
    }
}

/// Persistence boundary
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a record under a profile id
    async fn save(&self, profile_id: &str, record: StoredRecord) -> Result<(), StoreError>;

    /// All records of a profile, oldest first
    async fn load(&self, profile_id: &str) -> Result<Vec<StoredRecord>, StoreError>;
}

/// Initialize database connection pool
///
/// Creates the parent directory and the database file if needed, then the
/// `pipeline_records` table.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database (every connection to `:memory:`
/// would otherwise see its own empty database)
pub async fn init_memory_pool() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

async fn init_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_records (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_records_profile ON pipeline_records(profile_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (pipeline_records)");

    Ok(())
}
