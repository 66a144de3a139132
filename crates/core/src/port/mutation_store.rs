// Mutation Store Port - the durable offline queue
//
// Append order per lead is the replay order; an adapter must never reorder
// two mutations for the same lead.

use crate::domain::{LeadId, PendingMutation};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Append a mutation to the tail of the queue
    async fn append(&self, mutation: &PendingMutation) -> Result<()>;

    /// All pending mutations for one lead, in append order
    async fn pending_for_lead(&self, lead_id: &str) -> Result<Vec<PendingMutation>>;

    /// Leads that currently have queued mutations
    async fn lead_ids_with_pending(&self) -> Result<Vec<LeadId>>;

    /// Discard a mutation (after successful replay or conflict)
    async fn remove(&self, mutation_id: &str) -> Result<()>;

    /// Total queued mutations across all leads
    async fn pending_count(&self) -> Result<i64>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory FIFO queue (unit tests; the SQLite adapter is the durable
    /// production implementation)
    pub struct InMemoryMutationStore {
        queue: Mutex<Vec<PendingMutation>>,
    }

    impl InMemoryMutationStore {
        pub fn new() -> Self {
            Self {
                queue: Mutex::new(Vec::new()),
            }
        }
    }

    impl Default for InMemoryMutationStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl MutationStore for InMemoryMutationStore {
        async fn append(&self, mutation: &PendingMutation) -> Result<()> {
            self.queue.lock().unwrap().push(mutation.clone());
            Ok(())
        }

        async fn pending_for_lead(&self, lead_id: &str) -> Result<Vec<PendingMutation>> {
            Ok(self
                .queue
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.lead_id == lead_id)
                .cloned()
                .collect())
        }

        async fn lead_ids_with_pending(&self) -> Result<Vec<LeadId>> {
            let queue = self.queue.lock().unwrap();
            let mut seen = Vec::new();
            for m in queue.iter() {
                if !seen.contains(&m.lead_id) {
                    seen.push(m.lead_id.clone());
                }
            }
            Ok(seen)
        }

        async fn remove(&self, mutation_id: &str) -> Result<()> {
            self.queue.lock().unwrap().retain(|m| m.id != mutation_id);
            Ok(())
        }

        async fn pending_count(&self) -> Result<i64> {
            Ok(self.queue.lock().unwrap().len() as i64)
        }
    }
}
