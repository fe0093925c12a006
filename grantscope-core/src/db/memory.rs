//! In-memory result store

use super::{ResultStore, StoredRecord};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn save(&self, profile_id: &str, record: StoredRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .entry(profile_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn load(&self, profile_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(profile_id)
            .cloned()
            .unwrap_or_default())
    }
}
