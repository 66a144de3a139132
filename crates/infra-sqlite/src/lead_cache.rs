// SQLite LeadCache Implementation - local lead snapshots
//
// Stores the last known record per lead as JSON so the optimistic state
// survives a restart while offline.

use async_trait::async_trait;
use reachflow_core::domain::LeadReachRecord;
use reachflow_core::error::{AppError, Result};
use reachflow_core::port::LeadCache;
use sqlx::SqlitePool;

pub struct SqliteLeadCache {
    pool: SqlitePool,
}

impl SqliteLeadCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadCache for SqliteLeadCache {
    async fn get(&self, lead_id: &str) -> Result<Option<LeadReachRecord>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT record FROM lead_snapshots WHERE lead_id = ?")
                .bind(lead_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: &LeadReachRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO lead_snapshots (lead_id, record, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(lead_id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(json)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
