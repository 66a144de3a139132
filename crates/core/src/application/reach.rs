// Reach Engine - the workflow facade consumed by the presentation layer
//
// One logical thread of control per lead: a per-lead async mutex serializes
// transitions, so a second request either waits and then fails its
// precondition check or (offline) lands in the mutation queue. The
// LeadReachRecord is mutated only here, through the domain's checked
// transition methods; poller, guard, queue, and recorder never touch it
// directly.

use crate::application::cancel::{cancel_channel, CancelToken};
use crate::application::drain::{DrainReport, QueueDrainer};
use crate::application::guard::SubmissionGuard;
use crate::application::outcome::OutcomeRecorder;
use crate::application::poller::{JobPoller, PollOutcome};
use crate::config::EngineConfig;
use crate::domain::{
    Channel, EnrichmentResult, JobKind, JobSnapshot, JobState, LeadId, LeadReachRecord,
    OutcomeKind, PendingMutation, ReachAction, ReachStatus, SkipTraceResult,
};
use crate::error::{AppError, Result};
use crate::port::{
    ConnectivityProbe, IdProvider, JobGateway, LeadCache, LeadStore, MutationStore, TimeProvider,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, warn};

/// How a transition request resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The workflow advanced to this status
    Completed(ReachStatus),
    /// Still in a pending status (poll budget ran out or poll cancelled);
    /// `check_pending` is the manual re-check affordance
    Pending(ReachStatus),
    /// Recorded locally while offline; status is the optimistic value
    QueuedOffline(ReachStatus),
    /// The request was valid but mapped to no status change
    Unchanged(ReachStatus),
}

struct LeadSlot {
    tx: watch::Sender<LeadReachRecord>,
    transition_lock: Arc<tokio::sync::Mutex<()>>,
    poll_cancel: Option<crate::application::cancel::CancelHandle>,
}

pub struct ReachEngine {
    gateway: Arc<dyn JobGateway>,
    lead_store: Arc<dyn LeadStore>,
    mutation_store: Arc<dyn MutationStore>,
    lead_cache: Arc<dyn LeadCache>,
    connectivity: Arc<dyn ConnectivityProbe>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    poller: JobPoller,
    guard: SubmissionGuard,
    recorder: OutcomeRecorder,
    drainer: QueueDrainer,
    leads: Mutex<HashMap<LeadId, LeadSlot>>,
}

impl ReachEngine {
    pub fn new(
        gateway: Arc<dyn JobGateway>,
        lead_store: Arc<dyn LeadStore>,
        mutation_store: Arc<dyn MutationStore>,
        lead_cache: Arc<dyn LeadCache>,
        connectivity: Arc<dyn ConnectivityProbe>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: EngineConfig,
    ) -> Self {
        let poller = JobPoller::new(gateway.clone(), config.poll_config());
        let guard = SubmissionGuard::new(gateway.clone(), config.submit_timeout());
        let recorder = OutcomeRecorder::new(lead_store.clone());
        let drainer = QueueDrainer::new(lead_store.clone(), mutation_store.clone());

        Self {
            gateway,
            lead_store,
            mutation_store,
            lead_cache,
            connectivity,
            time_provider,
            id_provider,
            poller,
            guard,
            recorder,
            drainer,
            leads: Mutex::new(HashMap::new()),
        }
    }

    /// Load a lead into the engine. Online, the server copy wins and
    /// refreshes the local cache; offline, the cached optimistic copy is
    /// what the user last saw.
    pub async fn load(&self, lead_id: &str) -> Result<LeadReachRecord> {
        if self.connectivity.is_online().await {
            match self.lead_store.fetch(lead_id).await {
                Ok(Some(record)) => {
                    self.lead_cache.put(&record).await?;
                    self.publish(record.clone());
                    Ok(record)
                }
                Ok(None) => Err(AppError::NotFound(format!("lead {}", lead_id))),
                Err(e) => {
                    // Degraded fetch: fall back to the local snapshot
                    warn!(lead_id = %lead_id, error = %e, "Lead fetch failed; using cache");
                    match self.lead_cache.get(lead_id).await? {
                        Some(record) => {
                            self.publish(record.clone());
                            Ok(record)
                        }
                        None => Err(e),
                    }
                }
            }
        } else {
            match self.lead_cache.get(lead_id).await? {
                Some(record) => {
                    self.publish(record.clone());
                    Ok(record)
                }
                None => Err(AppError::NotFound(format!("lead {} (offline)", lead_id))),
            }
        }
    }

    pub async fn current_status(&self, lead_id: &str) -> Result<ReachStatus> {
        self.ensure_loaded(lead_id).await?;
        Ok(self.current(lead_id)?.status)
    }

    /// Whether `action` is legal from the lead's current status. The single
    /// transition table answers; call sites never re-derive legality.
    pub async fn can_transition(&self, lead_id: &str, action: ReachAction) -> Result<bool> {
        self.ensure_loaded(lead_id).await?;
        Ok(action.permitted_from(self.current(lead_id)?.status))
    }

    /// Subscribe to status changes for reactive re-render. The lead must be
    /// loaded first.
    pub fn subscribe(&self, lead_id: &str) -> Result<watch::Receiver<LeadReachRecord>> {
        let slots = lock(&self.leads);
        slots
            .get(lead_id)
            .map(|slot| slot.tx.subscribe())
            .ok_or_else(|| AppError::NotFound(format!("lead {} not loaded", lead_id)))
    }

    /// Drive the workflow forward. Online actions submit and poll remote
    /// jobs; offline actions queue an intent and advance optimistically.
    pub async fn request_transition(
        &self,
        lead_id: &str,
        action: ReachAction,
        input: Option<serde_json::Value>,
    ) -> Result<Transition> {
        if action == ReachAction::RecordOutcome {
            return Err(AppError::Validation(
                "outcomes are recorded through record_outcome".to_string(),
            ));
        }

        self.ensure_loaded(lead_id).await?;
        let transition_lock = self.transition_lock(lead_id)?;
        let _serialized = transition_lock.lock().await;

        let record = self.current(lead_id)?;
        record.require(action)?;

        let now = self.time_provider.now_millis();
        if !self.connectivity.is_online().await {
            return self.queue_offline_transition(record, action, now).await;
        }

        match action {
            ReachAction::RequestEnrichment => {
                self.run_stage_job(record, JobKind::Enrichment, input.unwrap_or_default())
                    .await
            }
            ReachAction::RequestSkipTrace => {
                self.run_stage_job(record, JobKind::SkipTrace, input.unwrap_or_default())
                    .await
            }
            ReachAction::BeginOutreach => {
                let mut record = record;
                record.begin_outreach(now)?;
                self.persist_online(&record).await?;
                Ok(Transition::Completed(record.status))
            }
            ReachAction::RecordOutcome => Err(AppError::Validation(
                "outcomes are recorded through record_outcome".to_string(),
            )),
        }
    }

    /// Record the human-reported result of a reach attempt and feed it
    /// through the disposition map. Idempotent per interaction id.
    pub async fn record_outcome(
        &self,
        lead_id: &str,
        interaction_id: &str,
        channel: Channel,
        result: OutcomeKind,
        note: Option<String>,
    ) -> Result<Transition> {
        self.ensure_loaded(lead_id).await?;
        let transition_lock = self.transition_lock(lead_id)?;
        let _serialized = transition_lock.lock().await;

        let mut record = self.current(lead_id)?;
        let now = self.time_provider.now_millis();
        let outcome = self
            .recorder
            .build(lead_id, interaction_id, channel, result, note, now)?;
        record.require(ReachAction::RecordOutcome)?;

        if !self.connectivity.is_online().await {
            record.apply_outcome(&outcome, now)?;
            let mutation = PendingMutation::interaction(
                self.id_provider.mint(),
                lead_id,
                outcome,
                now,
            );
            self.mutation_store.append(&mutation).await?;
            self.persist_offline(&record).await?;
            info!(
                lead_id = %lead_id,
                mutation_id = %mutation.id,
                "Interaction outcome queued offline"
            );
            return Ok(Transition::QueuedOffline(record.status));
        }

        self.recorder.persist(&outcome).await?;
        let next = record.apply_outcome(&outcome, now)?;
        self.persist_online(&record).await?;
        match next {
            Some(status) => Ok(Transition::Completed(status)),
            None => Ok(Transition::Unchanged(record.status)),
        }
    }

    /// Manual "check again" after a poll timeout, app restart, or push
    /// hint: one status query, applied if the job reached a terminal state.
    pub async fn check_pending(&self, lead_id: &str) -> Result<Transition> {
        self.ensure_loaded(lead_id).await?;
        let transition_lock = self.transition_lock(lead_id)?;
        let _serialized = transition_lock.lock().await;

        let record = self.current(lead_id)?;
        let kind = match record.status {
            ReachStatus::IntelPending => JobKind::Enrichment,
            ReachStatus::SkiptracePending => JobKind::SkipTrace,
            other => return Ok(Transition::Unchanged(other)),
        };

        if !self.connectivity.is_online().await {
            return Ok(Transition::Pending(record.status));
        }

        match self.gateway.active_job(kind, lead_id).await? {
            Some(snapshot) if snapshot.state.is_terminal() => {
                self.apply_terminal(record, snapshot).await
            }
            Some(_) => Ok(Transition::Pending(record.status)),
            None => {
                // Pending locally, but the gateway never saw a job: the
                // unconfirmed submission was lost. Fail the stage so the
                // user gets the retry affordance.
                let mut record = record;
                let now = self.time_provider.now_millis();
                let reason = "submission was never received by the gateway".to_string();
                match kind {
                    JobKind::Enrichment => record.fail_enrichment(reason.clone(), now)?,
                    JobKind::SkipTrace => record.fail_skiptrace(reason.clone(), now)?,
                    JobKind::AiTask => return Ok(Transition::Unchanged(record.status)),
                }
                self.persist_online(&record).await?;
                Err(AppError::RemoteJobFailed {
                    stage: kind,
                    reason,
                })
            }
        }
    }

    /// Stop the lead's active poll, if any. The workflow stays in its
    /// pending status; no timers are leaked.
    pub fn cancel_polling(&self, lead_id: &str) {
        let mut slots = lock(&self.leads);
        if let Some(slot) = slots.get_mut(lead_id) {
            if let Some(handle) = slot.poll_cancel.take() {
                handle.cancel();
            }
        }
    }

    /// Connectivity returned: drain the offline queue and reconcile every
    /// touched lead to the server's authoritative record.
    pub async fn reconnect(&self) -> Result<DrainReport> {
        let report = self.drainer.drain().await?;
        for record in &report.reconciled {
            self.lead_cache.put(record).await?;
            self.publish(record.clone());
        }
        Ok(report)
    }

    /// Fire an AI task (scoring, outreach generation) for a lead and wait
    /// for its result. AI tasks never drive reach-status transitions.
    pub async fn run_ai_task(
        &self,
        lead_id: &str,
        input: serde_json::Value,
    ) -> Result<PollOutcome> {
        self.ensure_loaded(lead_id).await?;
        let transition_lock = self.transition_lock(lead_id)?;
        let _serialized = transition_lock.lock().await;

        let token = self.id_provider.mint();
        let snapshot = self
            .guard
            .submit_once(JobKind::AiTask, lead_id, input, &token)
            .await?;
        if snapshot.state.is_terminal() {
            return Ok(PollOutcome::Terminal(snapshot));
        }

        let cancel = self.install_poll(lead_id)?;
        let outcome = self.poller.wait(&snapshot.id, cancel).await;
        self.clear_poll(lead_id);
        outcome
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn run_stage_job(
        &self,
        mut record: LeadReachRecord,
        kind: JobKind,
        input: serde_json::Value,
    ) -> Result<Transition> {
        let now = self.time_provider.now_millis();
        let before = record.clone();
        match kind {
            JobKind::Enrichment => record.begin_enrichment(now)?,
            JobKind::SkipTrace => record.begin_skiptrace(now)?,
            JobKind::AiTask => {
                return Err(AppError::Internal(
                    "ai tasks do not drive reach transitions".to_string(),
                ))
            }
        }
        // Persist the pending status first: it is what disables the
        // triggering control for the duration of the call.
        self.persist_online(&record).await?;

        let token = self.id_provider.mint();
        let snapshot = match self
            .guard
            .submit_once(kind, &record.id, input, &token)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e @ AppError::SubmissionTimeout { .. }) => {
                // Outcome unknown: the job may exist server-side. Stay
                // pending; check_pending resolves it either way.
                return Err(e);
            }
            Err(e) => {
                // The submission was never constructed. Undo the pending
                // status so the action stays available.
                self.persist_online(&before).await?;
                return Err(e);
            }
        };

        info!(
            lead_id = %record.id,
            kind = %kind,
            job_id = %snapshot.id,
            "Stage job submitted"
        );

        if snapshot.state.is_terminal() {
            return self.apply_terminal(record, snapshot).await;
        }

        let cancel = self.install_poll(&record.id)?;
        let outcome = self.poller.wait(&snapshot.id, cancel).await;
        self.clear_poll(&record.id);

        match outcome? {
            PollOutcome::Terminal(snapshot) => self.apply_terminal(record, snapshot).await,
            PollOutcome::TimedOut(_) => {
                info!(
                    lead_id = %record.id,
                    kind = %kind,
                    "Job still processing; staying pending"
                );
                Ok(Transition::Pending(record.status))
            }
            PollOutcome::Cancelled => Ok(Transition::Pending(record.status)),
        }
    }

    async fn apply_terminal(
        &self,
        mut record: LeadReachRecord,
        snapshot: JobSnapshot,
    ) -> Result<Transition> {
        let now = self.time_provider.now_millis();
        match snapshot.state {
            JobState::Completed => {
                match snapshot.kind {
                    JobKind::Enrichment => {
                        let result = EnrichmentResult::decode(snapshot.result.as_ref())?;
                        record.complete_enrichment(result.owner(), now)?;
                    }
                    JobKind::SkipTrace => {
                        let result = SkipTraceResult::decode(snapshot.result.as_ref())?;
                        record.complete_skiptrace(result.contact_points(), now)?;
                    }
                    JobKind::AiTask => {}
                }
                self.persist_online(&record).await?;
                Ok(Transition::Completed(record.status))
            }
            JobState::Failed => {
                let reason = snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| "remote job failed".to_string());
                match snapshot.kind {
                    JobKind::Enrichment => record.fail_enrichment(reason.clone(), now)?,
                    JobKind::SkipTrace => record.fail_skiptrace(reason.clone(), now)?,
                    JobKind::AiTask => {}
                }
                self.persist_online(&record).await?;
                Err(AppError::RemoteJobFailed {
                    stage: snapshot.kind,
                    reason,
                })
            }
            JobState::Queued | JobState::Running => Ok(Transition::Pending(record.status)),
        }
    }

    async fn queue_offline_transition(
        &self,
        mut record: LeadReachRecord,
        action: ReachAction,
        now: i64,
    ) -> Result<Transition> {
        record.apply_action(action, now)?;
        let mutation =
            PendingMutation::transition(self.id_provider.mint(), &record.id, action, now);
        self.mutation_store.append(&mutation).await?;
        self.persist_offline(&record).await?;
        info!(
            lead_id = %record.id,
            action = %action,
            mutation_id = %mutation.id,
            "Transition queued offline"
        );
        Ok(Transition::QueuedOffline(record.status))
    }

    async fn persist_online(&self, record: &LeadReachRecord) -> Result<()> {
        self.lead_store.save(record).await?;
        self.lead_cache.put(record).await?;
        self.publish(record.clone());
        Ok(())
    }

    async fn persist_offline(&self, record: &LeadReachRecord) -> Result<()> {
        self.lead_cache.put(record).await?;
        self.publish(record.clone());
        Ok(())
    }

    async fn ensure_loaded(&self, lead_id: &str) -> Result<()> {
        if lock(&self.leads).contains_key(lead_id) {
            return Ok(());
        }
        self.load(lead_id).await.map(|_| ())
    }

    fn current(&self, lead_id: &str) -> Result<LeadReachRecord> {
        let slots = lock(&self.leads);
        slots
            .get(lead_id)
            .map(|slot| slot.tx.borrow().clone())
            .ok_or_else(|| AppError::Internal(format!("lead {} not in registry", lead_id)))
    }

    fn transition_lock(&self, lead_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let slots = lock(&self.leads);
        slots
            .get(lead_id)
            .map(|slot| slot.transition_lock.clone())
            .ok_or_else(|| AppError::Internal(format!("lead {} not in registry", lead_id)))
    }

    fn install_poll(&self, lead_id: &str) -> Result<CancelToken> {
        let (handle, token) = cancel_channel();
        let mut slots = lock(&self.leads);
        let slot = slots
            .get_mut(lead_id)
            .ok_or_else(|| AppError::Internal(format!("lead {} not in registry", lead_id)))?;
        slot.poll_cancel = Some(handle);
        Ok(token)
    }

    fn clear_poll(&self, lead_id: &str) {
        let mut slots = lock(&self.leads);
        if let Some(slot) = slots.get_mut(lead_id) {
            slot.poll_cancel = None;
        }
    }

    fn publish(&self, record: LeadReachRecord) {
        let mut slots = lock(&self.leads);
        if let Some(slot) = slots.get(&record.id) {
            slot.tx.send_replace(record);
            return;
        }
        let (tx, _rx) = watch::channel(record.clone());
        slots.insert(
            record.id,
            LeadSlot {
                tx,
                transition_lock: Arc::new(tokio::sync::Mutex::new(())),
                poll_cancel: None,
            },
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
