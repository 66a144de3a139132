// Idempotent Submission Guard
//
// A billable lookup must run at most once per lead no matter how many taps,
// retries, or restarts happen around it. The at-most-once property is split
// in two: the gateway collapses duplicates via its one-active-job-per-
// (kind, subject) constraint, and this guard never even constructs a second
// submission while one is in flight from this process. A request that times
// out is UNKNOWN, not failed - the next attempt re-checks server state
// before it is allowed to submit afresh.

use crate::domain::{JobKind, JobSnapshot, JobState};
use crate::error::{AppError, Result};
use crate::port::JobGateway;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

type SlotKey = (JobKind, String);

pub struct SubmissionGuard {
    gateway: Arc<dyn JobGateway>,
    request_timeout: Duration,
    in_flight: Mutex<HashSet<SlotKey>>,
    unknown_outcome: Mutex<HashSet<SlotKey>>,
}

impl SubmissionGuard {
    pub fn new(gateway: Arc<dyn JobGateway>, request_timeout: Duration) -> Self {
        Self {
            gateway,
            request_timeout,
            in_flight: Mutex::new(HashSet::new()),
            unknown_outcome: Mutex::new(HashSet::new()),
        }
    }

    /// Submit a job at most once per (kind, lead).
    ///
    /// Concurrent duplicates get `SubmissionInFlight`; exactly one caller
    /// reaches the gateway. A duplicate against a job the gateway already
    /// tracks comes back as that job, which is success.
    pub async fn submit_once(
        &self,
        kind: JobKind,
        lead_id: &str,
        input: serde_json::Value,
        idempotency_token: &str,
    ) -> Result<JobSnapshot> {
        let key = (kind, lead_id.to_string());
        let _slot = self.reserve(key.clone()).ok_or(AppError::SubmissionInFlight {
            kind,
            lead_id: lead_id.to_string(),
        })?;

        // A previous attempt timed out with an unknown outcome: consult the
        // gateway before risking a duplicate billable submission.
        if self.take_unknown(&key) {
            if let Some(existing) = self.gateway.active_job(kind, lead_id).await? {
                if existing.state != JobState::Failed {
                    info!(
                        lead_id = %lead_id,
                        kind = %kind,
                        job_id = %existing.id,
                        "Adopting job found after unconfirmed submission"
                    );
                    return Ok(existing);
                }
            }
        }

        let submit = self
            .gateway
            .submit(kind, lead_id, input, idempotency_token);

        match tokio::time::timeout(self.request_timeout, submit).await {
            Ok(result) => result,
            Err(_) => {
                // The request may or may not have landed server-side
                warn!(
                    lead_id = %lead_id,
                    kind = %kind,
                    "Submission request timed out; outcome unknown"
                );
                self.mark_unknown(key);
                Err(AppError::SubmissionTimeout {
                    kind,
                    lead_id: lead_id.to_string(),
                })
            }
        }
    }

    fn reserve(&self, key: SlotKey) -> Option<SlotReservation<'_>> {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.contains(&key) {
            return None;
        }
        in_flight.insert(key.clone());
        Some(SlotReservation { guard: self, key })
    }

    fn mark_unknown(&self, key: SlotKey) {
        lock(&self.unknown_outcome).insert(key);
    }

    fn take_unknown(&self, key: &SlotKey) -> bool {
        lock(&self.unknown_outcome).remove(key)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases the in-flight slot on every exit path
struct SlotReservation<'a> {
    guard: &'a SubmissionGuard,
    key: SlotKey,
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        lock(&self.guard.in_flight).remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobSnapshot;
    use crate::port::job_gateway::mocks::MockJobGateway;
    use serde_json::json;

    fn guard_with(gateway: Arc<MockJobGateway>, timeout_ms: u64) -> Arc<SubmissionGuard> {
        Arc::new(SubmissionGuard::new(
            gateway,
            Duration::from_millis(timeout_ms),
        ))
    }

    #[tokio::test]
    async fn test_concurrent_submissions_create_one_job() {
        let gateway = Arc::new(MockJobGateway::new());
        let guard = guard_with(gateway.clone(), 1000);

        let mut handles = Vec::new();
        for i in 0..8 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                guard
                    .submit_once(
                        JobKind::SkipTrace,
                        "lead-1",
                        json!({}),
                        &format!("tok-{}", i),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::SubmissionInFlight { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        // Exactly one underlying billable job, no matter how callers fared
        assert_eq!(gateway.submissions(), 1);
        assert_eq!(successes + rejected, 8);
        assert!(successes >= 1);
    }

    #[tokio::test]
    async fn test_sequential_resubmission_returns_existing_job() {
        let gateway = Arc::new(MockJobGateway::new());
        let guard = guard_with(gateway.clone(), 1000);

        let first = guard
            .submit_once(JobKind::SkipTrace, "lead-1", json!({}), "tok-1")
            .await
            .unwrap();
        // Second tap after the first call returned: gateway collapses it
        let second = guard
            .submit_once(JobKind::SkipTrace, "lead-1", json!({}), "tok-2")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(gateway.submissions(), 1);
    }

    #[tokio::test]
    async fn test_timeout_marks_unknown_and_next_attempt_adopts_existing() {
        let gateway = Arc::new(MockJobGateway::new());
        let guard = guard_with(gateway.clone(), 20);

        gateway.hang_submissions(true);
        let err = guard
            .submit_once(JobKind::SkipTrace, "lead-1", json!({}), "tok-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SubmissionTimeout { .. }));

        // The hung request actually landed server-side
        gateway.hang_submissions(false);
        gateway.seed_job(JobSnapshot::queued("job-77", "lead-1", JobKind::SkipTrace));

        let adopted = guard
            .submit_once(JobKind::SkipTrace, "lead-1", json!({}), "tok-2")
            .await
            .unwrap();
        assert_eq!(adopted.id, "job-77");
        // No fresh submission was constructed
        assert_eq!(gateway.submissions(), 0);
    }

    #[tokio::test]
    async fn test_timeout_with_no_server_job_allows_fresh_submission() {
        let gateway = Arc::new(MockJobGateway::new());
        let guard = guard_with(gateway.clone(), 20);

        gateway.hang_submissions(true);
        let _ = guard
            .submit_once(JobKind::Enrichment, "lead-2", json!({}), "tok-1")
            .await
            .unwrap_err();

        gateway.hang_submissions(false);
        let snapshot = guard
            .submit_once(JobKind::Enrichment, "lead-2", json!({}), "tok-2")
            .await
            .unwrap();
        assert_eq!(snapshot.kind, JobKind::Enrichment);
        assert_eq!(gateway.submissions(), 1);
    }

    #[tokio::test]
    async fn test_slot_released_after_error() {
        let gateway = Arc::new(MockJobGateway::new());
        let guard = guard_with(gateway.clone(), 20);

        gateway.hang_submissions(true);
        let _ = guard
            .submit_once(JobKind::SkipTrace, "lead-3", json!({}), "tok-1")
            .await
            .unwrap_err();

        // The slot must not stay stuck after the timeout
        gateway.hang_submissions(false);
        let result = guard
            .submit_once(JobKind::SkipTrace, "lead-3", json!({}), "tok-2")
            .await;
        assert!(result.is_ok());
    }
}
