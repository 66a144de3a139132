// Interaction Outcome - the human-reported result of a reach attempt
//
// Each channel has its own outcome vocabulary; the disposition map below is
// the only place an outcome is translated into a status transition.

use crate::domain::lead::ReachStatus;
use serde::{Deserialize, Serialize};

/// Interaction ID (one per outbound call/text/email attempt)
pub type InteractionId = String;

/// Outbound communication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Call,
    Text,
    Email,
}

impl Channel {
    /// The outcome choices valid for this channel. The recorder presents
    /// exactly this set and rejects anything else.
    pub fn outcomes(self) -> &'static [OutcomeKind] {
        match self {
            Channel::Call => &[
                OutcomeKind::Connected,
                OutcomeKind::Voicemail,
                OutcomeKind::NoAnswer,
                OutcomeKind::WrongNumber,
                OutcomeKind::CallbackLater,
                OutcomeKind::NotInterested,
                OutcomeKind::DealSecured,
            ],
            Channel::Text => &[
                OutcomeKind::Replied,
                OutcomeKind::NoReply,
                OutcomeKind::WrongNumber,
                OutcomeKind::OptOut,
                OutcomeKind::NotInterested,
                OutcomeKind::DealSecured,
            ],
            Channel::Email => &[
                OutcomeKind::Replied,
                OutcomeKind::Bounced,
                OutcomeKind::NoReply,
                OutcomeKind::NotInterested,
                OutcomeKind::DealSecured,
            ],
        }
    }

    pub fn permits(self, outcome: OutcomeKind) -> bool {
        self.outcomes().contains(&outcome)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Call => write!(f, "call"),
            Channel::Text => write!(f, "text"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// Result classification of a contact attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Connected,
    Voicemail,
    NoAnswer,
    WrongNumber,
    CallbackLater,
    Replied,
    NoReply,
    OptOut,
    Bounced,
    NotInterested,
    DealSecured,
}

impl OutcomeKind {
    /// Disposition map: which status this outcome drives the lead to.
    /// `None` leaves the status unchanged (conversation still open).
    pub fn next_status(self) -> Option<ReachStatus> {
        match self {
            OutcomeKind::DealSecured => Some(ReachStatus::Converted),
            OutcomeKind::WrongNumber
            | OutcomeKind::OptOut
            | OutcomeKind::Bounced
            | OutcomeKind::NotInterested => Some(ReachStatus::Dead),
            OutcomeKind::Voicemail
            | OutcomeKind::NoAnswer
            | OutcomeKind::NoReply
            | OutcomeKind::CallbackLater => Some(ReachStatus::Nurturing),
            OutcomeKind::Connected | OutcomeKind::Replied => None,
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeKind::Connected => "connected",
            OutcomeKind::Voicemail => "voicemail",
            OutcomeKind::NoAnswer => "no_answer",
            OutcomeKind::WrongNumber => "wrong_number",
            OutcomeKind::CallbackLater => "callback_later",
            OutcomeKind::Replied => "replied",
            OutcomeKind::NoReply => "no_reply",
            OutcomeKind::OptOut => "opt_out",
            OutcomeKind::Bounced => "bounced",
            OutcomeKind::NotInterested => "not_interested",
            OutcomeKind::DealSecured => "deal_secured",
        };
        write!(f, "{}", s)
    }
}

/// Record of one contact attempt. Immutable once created; re-recording the
/// same interaction id overwrites the stored copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOutcome {
    pub interaction_id: InteractionId,
    pub lead_id: String,
    pub channel: Channel,
    pub result: OutcomeKind,
    pub note: Option<String>,
    pub recorded_at: i64, // epoch ms
}

impl InteractionOutcome {
    pub fn new(
        interaction_id: impl Into<String>,
        lead_id: impl Into<String>,
        channel: Channel,
        result: OutcomeKind,
        note: Option<String>,
        recorded_at: i64,
    ) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            lead_id: lead_id.into(),
            channel,
            result,
            note,
            recorded_at,
        }
    }
}
