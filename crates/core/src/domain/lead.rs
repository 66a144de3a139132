// Lead Reach Record - the workflow's single source of truth per lead
//
// The reach status used to live as a flat string checked ad hoc at every
// call site; here it is a tagged enum with one centralized transition table
// (ReachAction::preconditions). Every mutation goes through a checked
// transition method; an illegal attempt returns PreconditionFailed and
// leaves the record untouched.

use crate::domain::error::{DomainError, Result};
use crate::domain::outcome::InteractionOutcome;
use serde::{Deserialize, Serialize};

/// Lead ID (stable identifier assigned by the backend)
pub type LeadId = String;

/// Reach Status - the lead's stage in the enrichment -> skip-trace ->
/// outreach pipeline. `Dead` and `Converted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachStatus {
    New,
    IntelPending,
    IntelReady,
    IntelFailed,
    SkiptracePending,
    SkiptraceReady,
    SkiptraceFailed,
    OutreachReady,
    Contacted,
    Nurturing,
    Dead,
    Converted,
}

impl ReachStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReachStatus::Dead | ReachStatus::Converted)
    }

    /// True once contact points may legally be present on the record.
    pub fn past_outreach_ready(&self) -> bool {
        matches!(
            self,
            ReachStatus::OutreachReady
                | ReachStatus::Contacted
                | ReachStatus::Nurturing
                | ReachStatus::Dead
                | ReachStatus::Converted
        )
    }
}

impl std::fmt::Display for ReachStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReachStatus::New => "new",
            ReachStatus::IntelPending => "intel_pending",
            ReachStatus::IntelReady => "intel_ready",
            ReachStatus::IntelFailed => "intel_failed",
            ReachStatus::SkiptracePending => "skiptrace_pending",
            ReachStatus::SkiptraceReady => "skiptrace_ready",
            ReachStatus::SkiptraceFailed => "skiptrace_failed",
            ReachStatus::OutreachReady => "outreach_ready",
            ReachStatus::Contacted => "contacted",
            ReachStatus::Nurturing => "nurturing",
            ReachStatus::Dead => "dead",
            ReachStatus::Converted => "converted",
        };
        write!(f, "{}", s)
    }
}

/// User-initiated workflow actions. The transition table below is the only
/// place action legality is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachAction {
    RequestEnrichment,
    RequestSkipTrace,
    BeginOutreach,
    RecordOutcome,
}

impl ReachAction {
    /// The exact set of statuses this action is permitted from.
    ///
    /// A failed stage is re-entered only here, by explicit user action;
    /// there are no automatic retries of billable jobs.
    pub fn preconditions(self) -> &'static [ReachStatus] {
        match self {
            ReachAction::RequestEnrichment => &[ReachStatus::New, ReachStatus::IntelFailed],
            ReachAction::RequestSkipTrace => {
                &[ReachStatus::IntelReady, ReachStatus::SkiptraceFailed]
            }
            ReachAction::BeginOutreach => &[ReachStatus::OutreachReady],
            ReachAction::RecordOutcome => &[ReachStatus::Contacted, ReachStatus::Nurturing],
        }
    }

    pub fn permitted_from(self, status: ReachStatus) -> bool {
        self.preconditions().contains(&status)
    }
}

impl std::fmt::Display for ReachAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReachAction::RequestEnrichment => "request_enrichment",
            ReachAction::RequestSkipTrace => "request_skip_trace",
            ReachAction::BeginOutreach => "begin_outreach",
            ReachAction::RecordOutcome => "record_outcome",
        };
        write!(f, "{}", s)
    }
}

/// Property owner identity, populated by enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    pub name: Option<String>,
    #[serde(default)]
    pub absentee: bool,
}

/// A phone number or email address, populated by skip-trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContactPoint {
    Phone(String),
    Email(String),
}

impl ContactPoint {
    pub fn is_phone(&self) -> bool {
        matches!(self, ContactPoint::Phone(_))
    }
}

/// Lead Reach Record - one per lead
///
/// Invariants:
/// - `contact_points` is non-empty only at or past `outreach_ready`
/// - stage error fields are set only on the matching `*_failed` status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadReachRecord {
    pub id: LeadId,
    pub status: ReachStatus,

    pub enrichment_error: Option<String>,
    pub skiptrace_error: Option<String>,

    pub owner: Option<OwnerIdentity>,
    pub contact_points: Vec<ContactPoint>,

    pub last_contacted_at: Option<i64>, // epoch ms
    pub updated_at: i64,                // epoch ms
}

impl LeadReachRecord {
    /// Create a fresh record. Leads enter the system at `new`.
    pub fn new(id: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: id.into(),
            status: ReachStatus::New,
            enrichment_error: None,
            skiptrace_error: None,
            owner: None,
            contact_points: Vec::new(),
            last_contacted_at: None,
            updated_at: now_millis,
        }
    }

    /// Check a user action against the transition table without side effects.
    pub fn require(&self, action: ReachAction) -> Result<()> {
        self.ensure(&action.to_string(), action.preconditions())
    }

    fn ensure(&self, action: &str, allowed: &[ReachStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(DomainError::PreconditionFailed {
                action: action.to_string(),
                status: self.status.to_string(),
            })
        }
    }

    fn touch(&mut self, now_millis: i64) {
        self.updated_at = now_millis;
    }

    /// Apply a user action optimistically (used for the offline queue and
    /// for server-side replay in tests). Outcome-driven transitions carry an
    /// interaction payload and go through `apply_outcome` instead.
    pub fn apply_action(&mut self, action: ReachAction, now_millis: i64) -> Result<()> {
        match action {
            ReachAction::RequestEnrichment => self.begin_enrichment(now_millis),
            ReachAction::RequestSkipTrace => self.begin_skiptrace(now_millis),
            ReachAction::BeginOutreach => self.begin_outreach(now_millis),
            ReachAction::RecordOutcome => Err(DomainError::ValidationError(
                "outcome transitions carry an interaction payload".to_string(),
            )),
        }
    }

    /// `new` | `intel_failed` -> `intel_pending`
    pub fn begin_enrichment(&mut self, now_millis: i64) -> Result<()> {
        self.require(ReachAction::RequestEnrichment)?;
        self.status = ReachStatus::IntelPending;
        self.enrichment_error = None;
        self.touch(now_millis);
        Ok(())
    }

    /// `intel_pending` -> `intel_ready`
    pub fn complete_enrichment(&mut self, owner: OwnerIdentity, now_millis: i64) -> Result<()> {
        self.ensure("complete_enrichment", &[ReachStatus::IntelPending])?;
        self.status = ReachStatus::IntelReady;
        self.owner = Some(owner);
        self.enrichment_error = None;
        self.touch(now_millis);
        Ok(())
    }

    /// `intel_pending` -> `intel_failed`, failure reason recorded
    pub fn fail_enrichment(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        self.ensure("fail_enrichment", &[ReachStatus::IntelPending])?;
        self.status = ReachStatus::IntelFailed;
        self.enrichment_error = Some(reason.into());
        self.touch(now_millis);
        Ok(())
    }

    /// `intel_ready` | `skiptrace_failed` -> `skiptrace_pending`
    pub fn begin_skiptrace(&mut self, now_millis: i64) -> Result<()> {
        self.require(ReachAction::RequestSkipTrace)?;
        self.status = ReachStatus::SkiptracePending;
        self.skiptrace_error = None;
        self.touch(now_millis);
        Ok(())
    }

    /// `skiptrace_pending` -> `outreach_ready` (any contact point found)
    /// or `skiptrace_ready` (lookup succeeded but found nothing)
    pub fn complete_skiptrace(
        &mut self,
        contacts: Vec<ContactPoint>,
        now_millis: i64,
    ) -> Result<()> {
        self.ensure("complete_skiptrace", &[ReachStatus::SkiptracePending])?;
        if contacts.is_empty() {
            self.status = ReachStatus::SkiptraceReady;
        } else {
            self.status = ReachStatus::OutreachReady;
            self.contact_points = contacts;
        }
        self.skiptrace_error = None;
        self.touch(now_millis);
        Ok(())
    }

    /// `skiptrace_pending` -> `skiptrace_failed`, failure reason recorded
    pub fn fail_skiptrace(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        self.ensure("fail_skiptrace", &[ReachStatus::SkiptracePending])?;
        self.status = ReachStatus::SkiptraceFailed;
        self.skiptrace_error = Some(reason.into());
        self.touch(now_millis);
        Ok(())
    }

    /// `outreach_ready` -> `contacted` on the first outbound reach action
    pub fn begin_outreach(&mut self, now_millis: i64) -> Result<()> {
        self.require(ReachAction::BeginOutreach)?;
        self.status = ReachStatus::Contacted;
        self.last_contacted_at = Some(now_millis);
        self.touch(now_millis);
        Ok(())
    }

    /// Feed a recorded outcome through the disposition map.
    ///
    /// Returns the new status if the outcome maps to one, `None` when the
    /// outcome leaves the status unchanged (e.g. a live conversation with
    /// no resolution yet).
    pub fn apply_outcome(
        &mut self,
        outcome: &InteractionOutcome,
        now_millis: i64,
    ) -> Result<Option<ReachStatus>> {
        self.require(ReachAction::RecordOutcome)?;
        self.last_contacted_at = Some(now_millis);
        self.touch(now_millis);
        if let Some(next) = outcome.result.next_status() {
            self.status = next;
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{Channel, OutcomeKind};

    fn outcome(result: OutcomeKind) -> InteractionOutcome {
        InteractionOutcome::new("int-1", "lead-1", Channel::Call, result, None, 5000)
    }

    #[test]
    fn test_happy_path_to_converted() {
        let mut lead = LeadReachRecord::new("lead-1", 1000);
        assert_eq!(lead.status, ReachStatus::New);

        lead.begin_enrichment(1001).unwrap();
        lead.complete_enrichment(
            OwnerIdentity {
                name: Some("Jane Roe".to_string()),
                absentee: true,
            },
            1002,
        )
        .unwrap();
        assert_eq!(lead.status, ReachStatus::IntelReady);

        lead.begin_skiptrace(1003).unwrap();
        lead.complete_skiptrace(vec![ContactPoint::Phone("+15550100".to_string())], 1004)
            .unwrap();
        assert_eq!(lead.status, ReachStatus::OutreachReady);
        assert_eq!(lead.contact_points.len(), 1);

        lead.begin_outreach(1005).unwrap();
        assert_eq!(lead.status, ReachStatus::Contacted);
        assert_eq!(lead.last_contacted_at, Some(1005));

        let next = lead.apply_outcome(&outcome(OutcomeKind::DealSecured), 1006).unwrap();
        assert_eq!(next, Some(ReachStatus::Converted));
        assert!(lead.status.is_terminal());
    }

    #[test]
    fn test_skiptrace_without_contacts_parks_at_ready() {
        let mut lead = LeadReachRecord::new("lead-2", 1000);
        lead.begin_enrichment(1001).unwrap();
        lead.complete_enrichment(OwnerIdentity { name: None, absentee: false }, 1002)
            .unwrap();
        lead.begin_skiptrace(1003).unwrap();
        lead.complete_skiptrace(Vec::new(), 1004).unwrap();

        assert_eq!(lead.status, ReachStatus::SkiptraceReady);
        assert!(lead.contact_points.is_empty());
    }

    #[test]
    fn test_illegal_action_is_rejected_without_side_effects() {
        let mut lead = LeadReachRecord::new("lead-3", 1000);

        // Skip-trace straight from `new` must be refused
        let err = lead.begin_skiptrace(1001).unwrap_err();
        assert!(matches!(err, DomainError::PreconditionFailed { .. }));
        assert_eq!(lead.status, ReachStatus::New);
        assert_eq!(lead.updated_at, 1000);
    }

    #[test]
    fn test_failed_stage_is_reentrant_only_by_explicit_action() {
        let mut lead = LeadReachRecord::new("lead-4", 1000);
        lead.begin_enrichment(1001).unwrap();
        lead.fail_enrichment("provider 502", 1002).unwrap();

        assert_eq!(lead.status, ReachStatus::IntelFailed);
        assert_eq!(lead.enrichment_error.as_deref(), Some("provider 502"));

        // Retry clears the stage error on re-entry
        lead.begin_enrichment(1003).unwrap();
        assert_eq!(lead.status, ReachStatus::IntelPending);
        assert!(lead.enrichment_error.is_none());
    }

    #[test]
    fn test_error_fields_only_on_matching_failed_status() {
        let mut lead = LeadReachRecord::new("lead-5", 1000);
        lead.begin_enrichment(1001).unwrap();
        lead.complete_enrichment(OwnerIdentity { name: None, absentee: false }, 1002)
            .unwrap();
        lead.begin_skiptrace(1003).unwrap();
        lead.fail_skiptrace("vendor timeout", 1004).unwrap();

        assert_eq!(lead.status, ReachStatus::SkiptraceFailed);
        assert!(lead.enrichment_error.is_none());
        assert_eq!(lead.skiptrace_error.as_deref(), Some("vendor timeout"));

        lead.begin_skiptrace(1005).unwrap();
        assert!(lead.skiptrace_error.is_none());
    }

    #[test]
    fn test_unmapped_outcome_leaves_status_unchanged() {
        let mut lead = LeadReachRecord::new("lead-6", 1000);
        lead.status = ReachStatus::Contacted;

        let next = lead.apply_outcome(&outcome(OutcomeKind::Connected), 2000).unwrap();
        assert_eq!(next, None);
        assert_eq!(lead.status, ReachStatus::Contacted);
        assert_eq!(lead.last_contacted_at, Some(2000));
    }

    #[test]
    fn test_transition_table_covers_every_action() {
        // Every non-precondition status must reject the action
        for action in [
            ReachAction::RequestEnrichment,
            ReachAction::RequestSkipTrace,
            ReachAction::BeginOutreach,
            ReachAction::RecordOutcome,
        ] {
            for status in [
                ReachStatus::New,
                ReachStatus::IntelPending,
                ReachStatus::IntelReady,
                ReachStatus::IntelFailed,
                ReachStatus::SkiptracePending,
                ReachStatus::SkiptraceReady,
                ReachStatus::SkiptraceFailed,
                ReachStatus::OutreachReady,
                ReachStatus::Contacted,
                ReachStatus::Nurturing,
                ReachStatus::Dead,
                ReachStatus::Converted,
            ] {
                let mut lead = LeadReachRecord::new("lead-t", 1000);
                lead.status = status;
                let expected = action.permitted_from(status);
                assert_eq!(
                    lead.require(action).is_ok(),
                    expected,
                    "action {} from {}",
                    action,
                    status
                );
            }
        }
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let mut lead = LeadReachRecord::new("lead-7", 1000);
        lead.status = ReachStatus::OutreachReady;
        lead.contact_points = vec![ContactPoint::Email("owner@example.com".to_string())];

        let json = serde_json::to_string(&lead).expect("serialize");
        assert!(json.contains("outreach_ready"));
        let back: LeadReachRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(lead, back);
    }
}
