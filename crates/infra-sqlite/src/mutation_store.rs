// SQLite MutationStore Implementation - the durable offline queue
//
// AUTOINCREMENT seq is the replay order; two mutations for one lead can
// never come back reordered, across process restarts included.

use async_trait::async_trait;
use reachflow_core::domain::{LeadId, MutationPayload, PendingMutation};
use reachflow_core::error::{AppError, Result};
use reachflow_core::port::MutationStore;
use sqlx::SqlitePool;
use tracing::warn;

// Helper to convert sqlx::Error to AppError
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                AppError::Database(format!("Database error [{}]: {}", code, db_err.message()))
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteMutationStore {
    pool: SqlitePool,
}

impl SqliteMutationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MutationRow {
    id: String,
    lead_id: String,
    payload: String,
    created_at: i64,
}

impl MutationRow {
    /// Decode the stored payload. A corrupt row yields `None`; the caller
    /// discards it rather than wedging the whole drain.
    fn into_mutation(self) -> Option<PendingMutation> {
        match serde_json::from_str::<MutationPayload>(&self.payload) {
            Ok(payload) => Some(PendingMutation {
                id: self.id,
                lead_id: self.lead_id,
                payload,
                created_at: self.created_at,
            }),
            Err(e) => {
                warn!(
                    mutation_id = %self.id,
                    lead_id = %self.lead_id,
                    error = %e,
                    "Discarding corrupt queued mutation"
                );
                None
            }
        }
    }
}

#[async_trait]
impl MutationStore for SqliteMutationStore {
    async fn append(&self, mutation: &PendingMutation) -> Result<()> {
        let payload = serde_json::to_string(&mutation.payload)?;

        sqlx::query(
            r#"
            INSERT INTO pending_mutations (id, lead_id, kind, payload, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mutation.id)
        .bind(&mutation.lead_id)
        .bind(mutation.kind())
        .bind(payload)
        .bind(mutation.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn pending_for_lead(&self, lead_id: &str) -> Result<Vec<PendingMutation>> {
        let rows: Vec<MutationRow> = sqlx::query_as(
            r#"
            SELECT id, lead_id, payload, created_at
            FROM pending_mutations
            WHERE lead_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut mutations = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_mutation() {
                Some(mutation) => mutations.push(mutation),
                None => {
                    // Remove the corrupt row so it never blocks the queue
                    self.remove(&id).await?;
                }
            }
        }
        Ok(mutations)
    }

    async fn lead_ids_with_pending(&self) -> Result<Vec<LeadId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT lead_id
            FROM pending_mutations
            GROUP BY lead_id
            ORDER BY MIN(seq) ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids)
    }

    async fn remove(&self, mutation_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM pending_mutations WHERE id = ?")
            .bind(mutation_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_mutations")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use reachflow_core::domain::ReachAction;

    async fn setup() -> SqliteMutationStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteMutationStore::new(pool)
    }

    #[tokio::test]
    async fn test_append_preserves_order_per_lead() {
        let store = setup().await;

        for (i, action) in [
            ReachAction::RequestEnrichment,
            ReachAction::RequestSkipTrace,
            ReachAction::BeginOutreach,
        ]
        .into_iter()
        .enumerate()
        {
            store
                .append(&PendingMutation::transition(
                    format!("m-{}", i),
                    "lead-1",
                    action,
                    1000 + i as i64,
                ))
                .await
                .unwrap();
        }

        let pending = store.pending_for_lead("lead-1").await.unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].id, "m-0");
        assert_eq!(pending[1].id, "m-1");
        assert_eq!(pending[2].id, "m-2");
    }

    #[tokio::test]
    async fn test_leads_are_listed_in_first_append_order() {
        let store = setup().await;

        store
            .append(&PendingMutation::transition(
                "m-1",
                "lead-b",
                ReachAction::RequestEnrichment,
                1000,
            ))
            .await
            .unwrap();
        store
            .append(&PendingMutation::transition(
                "m-2",
                "lead-a",
                ReachAction::RequestEnrichment,
                2000,
            ))
            .await
            .unwrap();

        let leads = store.lead_ids_with_pending().await.unwrap();
        assert_eq!(leads, vec!["lead-b".to_string(), "lead-a".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_discards_one_mutation() {
        let store = setup().await;

        store
            .append(&PendingMutation::transition(
                "m-1",
                "lead-1",
                ReachAction::RequestEnrichment,
                1000,
            ))
            .await
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);

        store.remove("m-1").await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_mutation_id_is_rejected() {
        let store = setup().await;

        let mutation =
            PendingMutation::transition("m-1", "lead-1", ReachAction::RequestEnrichment, 1000);
        store.append(&mutation).await.unwrap();
        assert!(store.append(&mutation).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_skipped_and_removed() {
        let store = setup().await;

        store
            .append(&PendingMutation::transition(
                "m-1",
                "lead-1",
                ReachAction::RequestEnrichment,
                1000,
            ))
            .await
            .unwrap();

        // Sneak in a row the decoder cannot understand
        sqlx::query(
            "INSERT INTO pending_mutations (id, lead_id, kind, payload, created_at)
             VALUES ('m-bad', 'lead-1', 'status_transition', '{not json', 1500)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        store
            .append(&PendingMutation::transition(
                "m-2",
                "lead-1",
                ReachAction::RequestSkipTrace,
                2000,
            ))
            .await
            .unwrap();

        let pending = store.pending_for_lead("lead-1").await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m-1", "m-2"]);

        // The corrupt row is gone for good
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }
}
