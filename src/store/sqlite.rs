use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::store::KeyValueStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, AppError> {
        let mut record = Map::with_capacity(keys.len());
        for key in keys {
            let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
                .bind(*key)
                .fetch_optional(&self.pool)
                .await?;
            if let Some((raw,)) = row {
                record.insert((*key).to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(record)
    }

    async fn set(&self, record: Map<String, Value>) -> Result<(), AppError> {
        // One partial record lands together even though callers get no
        // cross-call transaction.
        let mut tx = self.pool.begin().await?;
        for (key, value) in record {
            sqlx::query(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(&key)
            .bind(serde_json::to_string(&value)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
