// Remote Job Model - the gateway-owned view of asynchronous work
//
// Jobs are created, executed, and retained by the Remote Job Gateway. The
// client only observes them; nothing here mutates a job.

use crate::domain::lead::{ContactPoint, OwnerIdentity};
use serde::{Deserialize, Serialize};

/// Job ID (assigned by the gateway)
pub type JobId = String;

/// Kind of remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Enrichment,
    SkipTrace,
    AiTask,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Enrichment => write!(f, "enrichment"),
            JobKind::SkipTrace => write!(f, "skip_trace"),
            JobKind::AiTask => write!(f, "ai_task"),
        }
    }
}

/// Remote job state as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time observation of a remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub subject_id: String,
    pub kind: JobKind,
    pub state: JobState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn queued(id: impl Into<String>, subject_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            subject_id: subject_id.into(),
            kind,
            state: JobState::Queued,
            result: None,
            error: None,
        }
    }

    pub fn completed(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        kind: JobKind,
        result: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            subject_id: subject_id.into(),
            kind,
            state: JobState::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        kind: JobKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject_id: subject_id.into(),
            kind,
            state: JobState::Failed,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Decoded enrichment result payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentResult {
    pub owner_name: Option<String>,
    #[serde(default)]
    pub absentee: bool,
}

impl EnrichmentResult {
    /// Decode from the opaque job result. A missing payload decodes to an
    /// empty result (enrichment found nothing), not an error.
    pub fn decode(result: Option<&serde_json::Value>) -> serde_json::Result<Self> {
        match result {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(Self::default()),
        }
    }

    pub fn owner(&self) -> OwnerIdentity {
        OwnerIdentity {
            name: self.owner_name.clone(),
            absentee: self.absentee,
        }
    }
}

/// Decoded skip-trace result payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkipTraceResult {
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl SkipTraceResult {
    pub fn decode(result: Option<&serde_json::Value>) -> serde_json::Result<Self> {
        match result {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(Self::default()),
        }
    }

    pub fn contact_points(&self) -> Vec<ContactPoint> {
        self.phones
            .iter()
            .cloned()
            .map(ContactPoint::Phone)
            .chain(self.emails.iter().cloned().map(ContactPoint::Email))
            .collect()
    }
}
