// Job Poller - bounded, cancellable wait on a remote job
//
// One generic primitive for every job kind. The budget is hard: at most
// ceil(max_wait / interval) gateway queries, then the last observed
// snapshot comes back as TimedOut and the caller decides what to do with
// its pending state. Timeout is an answer, not an error.

use crate::application::cancel::CancelToken;
use crate::domain::JobSnapshot;
use crate::error::Result;
use crate::port::JobGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Poll timing parameters
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        use crate::application::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_MAX_WAIT_MS};
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_wait: Duration::from_millis(DEFAULT_POLL_MAX_WAIT_MS),
        }
    }
}

impl PollConfig {
    /// Upper bound on status queries for one poll
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let max_wait = self.max_wait.as_millis();
        (max_wait.div_ceil(interval)).max(1) as u32
    }
}

/// How a poll ended
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The terminal predicate matched
    Terminal(JobSnapshot),
    /// Budget exhausted; the job is still in the last observed state
    TimedOut(JobSnapshot),
    /// The caller cancelled; no further queries were made
    Cancelled,
}

pub struct JobPoller {
    gateway: Arc<dyn JobGateway>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn JobGateway>, config: PollConfig) -> Self {
        Self { gateway, config }
    }

    /// Wait for the job to reach a terminal state (completed or failed)
    pub async fn wait(&self, job_id: &str, cancel: CancelToken) -> Result<PollOutcome> {
        self.wait_until(job_id, cancel, |snapshot| snapshot.state.is_terminal())
            .await
    }

    /// Wait until `is_terminal` matches the observed snapshot, the budget
    /// runs out, or the token fires. A cancelled poll performs no further
    /// queries and has no side effects.
    pub async fn wait_until<F>(
        &self,
        job_id: &str,
        mut cancel: CancelToken,
        is_terminal: F,
    ) -> Result<PollOutcome>
    where
        F: Fn(&JobSnapshot) -> bool + Send,
    {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }

        let attempts = self.config.max_attempts();
        let mut last = self.gateway.job_status(job_id).await?;
        if is_terminal(&last) {
            return Ok(PollOutcome::Terminal(last));
        }

        for attempt in 1..attempts {
            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = cancel.cancelled() => {
                    debug!(job_id = %job_id, attempt = %attempt, "Poll cancelled");
                    return Ok(PollOutcome::Cancelled);
                }
            }
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            last = self.gateway.job_status(job_id).await?;
            if is_terminal(&last) {
                return Ok(PollOutcome::Terminal(last));
            }
        }

        debug!(
            job_id = %job_id,
            attempts = %attempts,
            state = %last.state,
            "Poll budget exhausted"
        );
        Ok(PollOutcome::TimedOut(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cancel::cancel_channel;
    use crate::domain::{JobKind, JobSnapshot};
    use crate::port::job_gateway::mocks::{MockJobGateway, ScriptedStep};
    use tokio_test::assert_ok;

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(25),
        }
    }

    async fn submitted_job(gateway: &MockJobGateway, steps: Vec<ScriptedStep>) -> JobSnapshot {
        gateway.script(JobKind::Enrichment, "lead-1", steps);
        gateway
            .submit(JobKind::Enrichment, "lead-1", serde_json::json!({}), "tok-1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_reaches_terminal_state() {
        let gateway = Arc::new(MockJobGateway::new());
        let job = submitted_job(
            &gateway,
            vec![
                ScriptedStep::running(),
                ScriptedStep::completed(serde_json::json!({"owner_name": "Jane"})),
            ],
        )
        .await;

        let poller = JobPoller::new(gateway.clone(), fast_config());
        let (_handle, token) = cancel_channel();
        let outcome = assert_ok!(poller.wait(&job.id, token).await);

        match outcome {
            PollOutcome::Terminal(snapshot) => {
                assert!(snapshot.state.is_terminal());
            }
            other => panic!("expected terminal outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_is_bounded_and_returns_last_snapshot() {
        let gateway = Arc::new(MockJobGateway::new());
        // No scripted steps: the job never leaves `queued`
        let job = submitted_job(&gateway, Vec::new()).await;

        let config = fast_config();
        let poller = JobPoller::new(gateway.clone(), config);
        let (_handle, token) = cancel_channel();
        let outcome = assert_ok!(poller.wait(&job.id, token).await);

        match outcome {
            PollOutcome::TimedOut(snapshot) => {
                assert!(!snapshot.state.is_terminal());
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // Never more than ceil(max_wait / interval) queries
        assert!(gateway.status_queries() <= config.max_attempts() as usize);
        assert!(gateway.status_queries() > 0);
    }

    #[tokio::test]
    async fn test_cancelled_poll_stops_querying() {
        let gateway = Arc::new(MockJobGateway::new());
        let job = submitted_job(&gateway, Vec::new()).await;

        let poller = JobPoller::new(
            gateway.clone(),
            PollConfig {
                interval: Duration::from_millis(20),
                max_wait: Duration::from_secs(10),
            },
        );
        let (handle, token) = cancel_channel();

        let gateway_for_task = gateway.clone();
        let poll = tokio::spawn(async move { poller.wait(&job.id, token).await });

        // Let the first query land, then cancel
        tokio::time::sleep(Duration::from_millis(5)).await;
        let queries_at_cancel = gateway_for_task.status_queries();
        handle.cancel();

        let outcome = poll.await.unwrap().unwrap();
        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(gateway.status_queries(), queries_at_cancel);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_queries_nothing() {
        let gateway = Arc::new(MockJobGateway::new());
        let job = submitted_job(&gateway, Vec::new()).await;
        let queries_before = gateway.status_queries();

        let poller = JobPoller::new(gateway.clone(), fast_config());
        let (handle, token) = cancel_channel();
        handle.cancel();

        let outcome = assert_ok!(poller.wait(&job.id, token).await);
        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(gateway.status_queries(), queries_before);
    }

    #[test]
    fn test_max_attempts_rounds_up() {
        let config = PollConfig {
            interval: Duration::from_millis(1500),
            max_wait: Duration::from_millis(45_000),
        };
        assert_eq!(config.max_attempts(), 30);

        let uneven = PollConfig {
            interval: Duration::from_millis(400),
            max_wait: Duration::from_millis(1000),
        };
        assert_eq!(uneven.max_attempts(), 3);
    }
}
