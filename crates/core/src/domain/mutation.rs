// Pending Mutation - a locally queued intent awaiting replay
//
// Owned by the offline mutation queue until applied remotely, then
// discarded. The locally minted id doubles as the replay idempotency token
// so a mutation half-applied before a connectivity drop is never applied
// twice.

use crate::domain::lead::ReachAction;
use crate::domain::outcome::InteractionOutcome;
use serde::{Deserialize, Serialize};

/// Mutation ID (locally generated, unique)
pub type MutationId = String;

/// What the queued intent does when replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationPayload {
    StatusTransition { action: ReachAction },
    InteractionLog { outcome: InteractionOutcome },
}

/// A queued local intent, ordered per lead by append order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub lead_id: String,
    pub payload: MutationPayload,
    pub created_at: i64, // epoch ms
}

impl PendingMutation {
    pub fn transition(
        id: impl Into<String>,
        lead_id: impl Into<String>,
        action: ReachAction,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            lead_id: lead_id.into(),
            payload: MutationPayload::StatusTransition { action },
            created_at,
        }
    }

    pub fn interaction(
        id: impl Into<String>,
        lead_id: impl Into<String>,
        outcome: InteractionOutcome,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            lead_id: lead_id.into(),
            payload: MutationPayload::InteractionLog { outcome },
            created_at,
        }
    }

    /// Stable kind tag, used as a storage column for inspection queries
    pub fn kind(&self) -> &'static str {
        match self.payload {
            MutationPayload::StatusTransition { .. } => "status_transition",
            MutationPayload::InteractionLog { .. } => "interaction_log",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{Channel, OutcomeKind};

    #[test]
    fn test_payload_round_trip() {
        let m = PendingMutation::transition("m-1", "lead-1", ReachAction::RequestSkipTrace, 1000);
        let json = serde_json::to_string(&m.payload).unwrap();
        assert!(json.contains("status_transition"));
        assert!(json.contains("request_skip_trace"));

        let back: MutationPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(m.payload, back);
    }

    #[test]
    fn test_kind_tags() {
        let t = PendingMutation::transition("m-1", "lead-1", ReachAction::BeginOutreach, 1000);
        assert_eq!(t.kind(), "status_transition");

        let outcome = InteractionOutcome::new(
            "int-1",
            "lead-1",
            Channel::Text,
            OutcomeKind::Replied,
            None,
            2000,
        );
        let i = PendingMutation::interaction("m-2", "lead-1", outcome, 2000);
        assert_eq!(i.kind(), "interaction_log");
    }
}
