//! SQLite result store
//!
//! One row per record in `pipeline_records`; the payload is the JSON form of
//! `StoredRecord`.

use super::{ResultStore, StoredRecord};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool prepared by `init_database_pool` or `init_memory_pool`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn save(&self, profile_id: &str, record: StoredRecord) -> Result<(), StoreError> {
        // Serialize before touching the database
        let payload = serde_json::to_string(&record)?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO pipeline_records (id, profile_id, kind, payload, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(profile_id)
        .bind(record.kind())
        .bind(&payload)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(profile_id, kind = record.kind(), record_id = %id, "Record saved");
        Ok(())
    }

    async fn load(&self, profile_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT payload FROM pipeline_records WHERE profile_id = ? ORDER BY rowid ASC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<StoredRecord, StoreError> {
                let payload: String = row.try_get("payload")?;
                Ok(serde_json::from_str(&payload)?)
            })
            .collect()
    }
}
