// Queue Drainer - replays offline mutations after reconnect
//
// Strict FIFO per lead; distinct leads drain concurrently. A conflict
// discards the local mutation and adopts the server's record (server wins,
// silently); a transport failure leaves the remainder of that lead's queue
// intact for the next reconnect.

use crate::domain::LeadReachRecord;
use crate::error::Result;
use crate::port::{LeadStore, MutationStore, ReplayOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of one drain pass
#[derive(Debug, Default)]
pub struct DrainReport {
    pub applied: usize,
    pub conflicts: usize,
    /// Authoritative record per drained lead, for registry reconciliation
    pub reconciled: Vec<LeadReachRecord>,
}

pub struct QueueDrainer {
    lead_store: Arc<dyn LeadStore>,
    mutation_store: Arc<dyn MutationStore>,
}

struct LeadDrain {
    applied: usize,
    conflicts: usize,
    latest: Option<LeadReachRecord>,
}

impl QueueDrainer {
    pub fn new(lead_store: Arc<dyn LeadStore>, mutation_store: Arc<dyn MutationStore>) -> Self {
        Self {
            lead_store,
            mutation_store,
        }
    }

    /// Replay every queued mutation. Returns the per-lead authoritative
    /// records observed during the drain.
    pub async fn drain(&self) -> Result<DrainReport> {
        let lead_ids = self.mutation_store.lead_ids_with_pending().await?;
        if lead_ids.is_empty() {
            return Ok(DrainReport::default());
        }

        info!(leads = %lead_ids.len(), "Draining offline mutation queue");

        // Leads are independent; their drains run concurrently. Ordering
        // only matters within one lead's queue.
        let drains = lead_ids.iter().map(|lead_id| self.drain_lead(lead_id));
        let results = futures::future::join_all(drains).await;

        let mut report = DrainReport::default();
        for result in results {
            match result {
                Ok(drain) => {
                    report.applied += drain.applied;
                    report.conflicts += drain.conflicts;
                    if let Some(record) = drain.latest {
                        report.reconciled.push(record);
                    }
                }
                Err(e) => {
                    // This lead's remaining mutations stay queued
                    warn!(error = %e, "Lead drain aborted; mutations remain queued");
                }
            }
        }

        info!(
            applied = %report.applied,
            conflicts = %report.conflicts,
            "Offline queue drain complete"
        );
        Ok(report)
    }

    async fn drain_lead(&self, lead_id: &str) -> Result<LeadDrain> {
        let pending = self.mutation_store.pending_for_lead(lead_id).await?;
        let mut drain = LeadDrain {
            applied: 0,
            conflicts: 0,
            latest: None,
        };

        for mutation in pending {
            match self.lead_store.replay(&mutation).await {
                Ok(ReplayOutcome::Applied(record)) => {
                    self.mutation_store.remove(&mutation.id).await?;
                    drain.applied += 1;
                    drain.latest = Some(record);
                }
                Ok(ReplayOutcome::Conflict(record)) => {
                    // Server state diverged while we were offline. The
                    // optimistic local value was a convenience; correct it.
                    warn!(
                        lead_id = %lead_id,
                        mutation_id = %mutation.id,
                        kind = %mutation.kind(),
                        server_status = %record.status,
                        "Offline mutation superseded by server state"
                    );
                    self.mutation_store.remove(&mutation.id).await?;
                    drain.conflicts += 1;
                    drain.latest = Some(record);
                }
                Err(e) => {
                    // Transport failure: stop here, keep the rest queued
                    warn!(
                        lead_id = %lead_id,
                        mutation_id = %mutation.id,
                        error = %e,
                        "Replay failed; keeping mutation queued"
                    );
                    break;
                }
            }
        }
        Ok(drain)
    }
}
