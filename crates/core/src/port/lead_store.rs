// Persistent Lead Store Port
//
// The hosted database holding the authoritative LeadReachRecord. Writes are
// last-write-wins at the field level from the server's perspective, which
// is why reconciliation is server-wins: the server's answer to a replay is
// final.

use crate::domain::{InteractionOutcome, LeadReachRecord, PendingMutation};
use crate::error::Result;
use async_trait::async_trait;

/// Server verdict on a replayed offline mutation
#[derive(Debug, Clone)]
pub enum ReplayOutcome {
    /// Mutation applied; the returned record is the server's updated copy
    Applied(LeadReachRecord),
    /// Mutation rejected (server state diverged); the returned record is
    /// the server's authoritative copy, which the client adopts
    Conflict(LeadReachRecord),
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Fetch the authoritative record
    async fn fetch(&self, lead_id: &str) -> Result<Option<LeadReachRecord>>;

    /// Write the record (last-write-wins)
    async fn save(&self, record: &LeadReachRecord) -> Result<()>;

    /// Replay a queued mutation. The mutation id is the idempotency token:
    /// a mutation the server has already applied returns `Applied` with the
    /// current record and no second application.
    async fn replay(&self, mutation: &PendingMutation) -> Result<ReplayOutcome>;

    /// Store an interaction outcome, keyed by interaction id. Re-submitting
    /// the same interaction's outcome overwrites rather than duplicates.
    async fn upsert_interaction(&self, outcome: &InteractionOutcome) -> Result<()>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::MutationPayload;
    use crate::error::AppError;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StoreInner {
        leads: HashMap<String, LeadReachRecord>,
        interactions: HashMap<String, InteractionOutcome>,
        applied_tokens: HashSet<String>,
        failing_replays: usize,
    }

    /// In-memory lead store with server-side replay semantics.
    ///
    /// Replays apply the mutation to the server copy of the record through
    /// the same transition table the client uses; a transition the server
    /// copy no longer permits is a conflict. Timestamps come from the
    /// mutation itself so tests stay deterministic.
    pub struct InMemoryLeadStore {
        inner: Mutex<StoreInner>,
    }

    impl InMemoryLeadStore {
        pub fn new() -> Self {
            Self {
                inner: Mutex::new(StoreInner::default()),
            }
        }

        /// Seed the server-side record (lead creation is outside the engine)
        pub fn seed(&self, record: LeadReachRecord) {
            let mut inner = self.inner.lock().unwrap();
            inner.leads.insert(record.id.clone(), record);
        }

        /// Overwrite the server copy, simulating a change from another
        /// device or a server-side job finishing behind the client's back
        pub fn stage_server_record(&self, record: LeadReachRecord) {
            self.seed(record);
        }

        pub fn record(&self, lead_id: &str) -> Option<LeadReachRecord> {
            self.inner.lock().unwrap().leads.get(lead_id).cloned()
        }

        pub fn interaction(&self, interaction_id: &str) -> Option<InteractionOutcome> {
            self.inner
                .lock()
                .unwrap()
                .interactions
                .get(interaction_id)
                .cloned()
        }

        pub fn interaction_count(&self) -> usize {
            self.inner.lock().unwrap().interactions.len()
        }

        /// Fail the next `n` replay calls with a transport error
        pub fn fail_next_replays(&self, n: usize) {
            self.inner.lock().unwrap().failing_replays = n;
        }
    }

    impl Default for InMemoryLeadStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LeadStore for InMemoryLeadStore {
        async fn fetch(&self, lead_id: &str) -> Result<Option<LeadReachRecord>> {
            Ok(self.inner.lock().unwrap().leads.get(lead_id).cloned())
        }

        async fn save(&self, record: &LeadReachRecord) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.leads.insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn replay(&self, mutation: &PendingMutation) -> Result<ReplayOutcome> {
            let mut inner = self.inner.lock().unwrap();

            if inner.failing_replays > 0 {
                inner.failing_replays -= 1;
                return Err(AppError::Gateway("connection reset".to_string()));
            }

            let mut record = inner
                .leads
                .get(&mutation.lead_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(mutation.lead_id.clone()))?;

            // Idempotency: an already-honored token is a no-op success
            if inner.applied_tokens.contains(&mutation.id) {
                return Ok(ReplayOutcome::Applied(record));
            }

            let applied = match &mutation.payload {
                MutationPayload::StatusTransition { action } => {
                    record.apply_action(*action, mutation.created_at).is_ok()
                }
                MutationPayload::InteractionLog { outcome } => {
                    let ok = record.apply_outcome(outcome, mutation.created_at).is_ok();
                    if ok {
                        inner
                            .interactions
                            .insert(outcome.interaction_id.clone(), outcome.clone());
                    }
                    ok
                }
            };

            if applied {
                inner.applied_tokens.insert(mutation.id.clone());
                inner.leads.insert(record.id.clone(), record.clone());
                Ok(ReplayOutcome::Applied(record))
            } else {
                // Server state diverged; hand back the authoritative copy
                Ok(ReplayOutcome::Conflict(record))
            }
        }

        async fn upsert_interaction(&self, outcome: &InteractionOutcome) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner
                .interactions
                .insert(outcome.interaction_id.clone(), outcome.clone());
            Ok(())
        }
    }
}
