// Remote Job Gateway Port
//
// Abstracts "submit a named job against a subject" and "fetch current job
// status". The gateway owns job lifecycle and enforces the at-most-one-
// active-job-per-(kind, subject) constraint; the client never assumes it
// can provide that atomicity itself.

use crate::domain::{JobKind, JobSnapshot};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait JobGateway: Send + Sync {
    /// Submit a job, or return the already-active job for (kind, subject).
    ///
    /// `idempotency_token` is caller-chosen; retrying a network call with
    /// the same token must not create a second job. "Job already exists"
    /// is a success, never an error.
    async fn submit(
        &self,
        kind: JobKind,
        subject_id: &str,
        input: serde_json::Value,
        idempotency_token: &str,
    ) -> Result<JobSnapshot>;

    /// Fetch the current snapshot of a job by id
    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot>;

    /// The most recent job for (kind, subject), if any. Used to re-check
    /// server state after a submission whose outcome is unknown.
    async fn active_job(&self, kind: JobKind, subject_id: &str) -> Result<Option<JobSnapshot>>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{JobId, JobState};
    use crate::error::AppError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// One scripted observation in a job's lifecycle
    #[derive(Debug, Clone)]
    pub struct ScriptedStep {
        pub state: JobState,
        pub result: Option<serde_json::Value>,
        pub error: Option<String>,
    }

    impl ScriptedStep {
        pub fn running() -> Self {
            Self {
                state: JobState::Running,
                result: None,
                error: None,
            }
        }

        pub fn completed(result: serde_json::Value) -> Self {
            Self {
                state: JobState::Completed,
                result: Some(result),
                error: None,
            }
        }

        pub fn failed(error: impl Into<String>) -> Self {
            Self {
                state: JobState::Failed,
                result: None,
                error: Some(error.into()),
            }
        }
    }

    struct MockJob {
        snapshot: JobSnapshot,
        timeline: VecDeque<ScriptedStep>,
    }

    #[derive(Default)]
    struct GatewayInner {
        scripts: HashMap<(JobKind, String), VecDeque<ScriptedStep>>,
        jobs: HashMap<JobId, MockJob>,
        latest: HashMap<(JobKind, String), JobId>,
        tokens: HashMap<String, JobId>,
        created: usize,
        status_queries: usize,
        hang_submissions: bool,
    }

    /// Scriptable gateway double.
    ///
    /// Submissions create a job whose status advances one scripted step per
    /// `job_status` call; an unscripted job stays `queued` (useful for poll
    /// timeout tests). Duplicate submissions for an active or completed
    /// (kind, subject) return the existing job, mirroring the backend's
    /// uniqueness constraint.
    pub struct MockJobGateway {
        inner: Mutex<GatewayInner>,
    }

    impl MockJobGateway {
        pub fn new() -> Self {
            Self {
                inner: Mutex::new(GatewayInner::default()),
            }
        }

        /// Script the lifecycle of the next job created for (kind, subject)
        pub fn script(&self, kind: JobKind, subject_id: &str, steps: Vec<ScriptedStep>) {
            let mut inner = self.inner.lock().unwrap();
            inner
                .scripts
                .insert((kind, subject_id.to_string()), steps.into());
        }

        /// Register a pre-existing job (e.g. one created by another device)
        pub fn seed_job(&self, snapshot: JobSnapshot) {
            let mut inner = self.inner.lock().unwrap();
            let key = (snapshot.kind, snapshot.subject_id.clone());
            inner.latest.insert(key, snapshot.id.clone());
            inner.jobs.insert(
                snapshot.id.clone(),
                MockJob {
                    snapshot,
                    timeline: VecDeque::new(),
                },
            );
        }

        /// Flip an existing job to completed (a late server-side finish)
        pub fn complete_job(&self, job_id: &str, result: serde_json::Value) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(job) = inner.jobs.get_mut(job_id) {
                job.snapshot.state = JobState::Completed;
                job.snapshot.result = Some(result);
                job.timeline.clear();
            }
        }

        /// Flip an existing job to failed
        pub fn fail_job(&self, job_id: &str, error: &str) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(job) = inner.jobs.get_mut(job_id) {
                job.snapshot.state = JobState::Failed;
                job.snapshot.error = Some(error.to_string());
                job.timeline.clear();
            }
        }

        /// Make subsequent submissions hang (request-timeout tests)
        pub fn hang_submissions(&self, hang: bool) {
            self.inner.lock().unwrap().hang_submissions = hang;
        }

        /// Number of jobs actually created (the billable count)
        pub fn submissions(&self) -> usize {
            self.inner.lock().unwrap().created
        }

        pub fn status_queries(&self) -> usize {
            self.inner.lock().unwrap().status_queries
        }
    }

    impl Default for MockJobGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl JobGateway for MockJobGateway {
        async fn submit(
            &self,
            kind: JobKind,
            subject_id: &str,
            _input: serde_json::Value,
            idempotency_token: &str,
        ) -> Result<JobSnapshot> {
            let hang = self.inner.lock().unwrap().hang_submissions;
            if hang {
                // Never resolves; the caller's request timeout fires first
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }

            let mut inner = self.inner.lock().unwrap();

            // Retried call with a token the gateway already honored
            if let Some(job_id) = inner.tokens.get(idempotency_token).cloned() {
                if let Some(job) = inner.jobs.get(&job_id) {
                    return Ok(job.snapshot.clone());
                }
            }

            // One active (or already-successful) job per (kind, subject)
            let key = (kind, subject_id.to_string());
            if let Some(job_id) = inner.latest.get(&key).cloned() {
                if let Some(job) = inner.jobs.get(&job_id) {
                    if job.snapshot.state != JobState::Failed {
                        return Ok(job.snapshot.clone());
                    }
                }
            }

            inner.created += 1;
            let job_id = format!("job-{}", inner.created);
            let snapshot = JobSnapshot::queued(job_id.clone(), subject_id, kind);
            let timeline = inner.scripts.remove(&key).unwrap_or_default();

            inner.tokens.insert(idempotency_token.to_string(), job_id.clone());
            inner.latest.insert(key, job_id.clone());
            inner.jobs.insert(
                job_id,
                MockJob {
                    snapshot: snapshot.clone(),
                    timeline,
                },
            );
            Ok(snapshot)
        }

        async fn job_status(&self, job_id: &str) -> Result<JobSnapshot> {
            let mut inner = self.inner.lock().unwrap();
            inner.status_queries += 1;
            let job = inner
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| AppError::Gateway(format!("unknown job: {}", job_id)))?;

            if let Some(step) = job.timeline.pop_front() {
                job.snapshot.state = step.state;
                job.snapshot.result = step.result;
                job.snapshot.error = step.error;
            }
            Ok(job.snapshot.clone())
        }

        async fn active_job(
            &self,
            kind: JobKind,
            subject_id: &str,
        ) -> Result<Option<JobSnapshot>> {
            let inner = self.inner.lock().unwrap();
            let key = (kind, subject_id.to_string());
            Ok(inner
                .latest
                .get(&key)
                .and_then(|id| inner.jobs.get(id))
                .map(|job| job.snapshot.clone()))
        }
    }
}
