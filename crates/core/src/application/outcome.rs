// Outcome Recorder - validates and persists human-reported reach results
//
// The recorder owns the per-channel vocabulary check and the idempotent
// persistence of an InteractionOutcome; the engine feeds the result through
// the state machine's disposition map.

use crate::domain::{Channel, InteractionOutcome, OutcomeKind};
use crate::error::{AppError, Result};
use crate::port::LeadStore;
use std::sync::Arc;
use tracing::info;

const MAX_ID_LEN: usize = 128;
const MAX_NOTE_LEN: usize = 2000;

pub struct OutcomeRecorder {
    lead_store: Arc<dyn LeadStore>,
}

impl OutcomeRecorder {
    pub fn new(lead_store: Arc<dyn LeadStore>) -> Self {
        Self { lead_store }
    }

    /// Validate and assemble an outcome record.
    ///
    /// Rejects outcomes outside the channel's vocabulary; presenting the
    /// valid set is `Channel::outcomes()`.
    pub fn build(
        &self,
        lead_id: &str,
        interaction_id: &str,
        channel: Channel,
        result: OutcomeKind,
        note: Option<String>,
        now_millis: i64,
    ) -> Result<InteractionOutcome> {
        validate_id("lead id", lead_id)?;
        validate_id("interaction id", interaction_id)?;

        if !channel.permits(result) {
            return Err(AppError::Validation(format!(
                "outcome {} is not valid for channel {}",
                result, channel
            )));
        }
        if let Some(note) = &note {
            if note.len() > MAX_NOTE_LEN {
                return Err(AppError::Validation(format!(
                    "note too long ({} > {} bytes)",
                    note.len(),
                    MAX_NOTE_LEN
                )));
            }
        }

        Ok(InteractionOutcome::new(
            interaction_id,
            lead_id,
            channel,
            result,
            note,
            now_millis,
        ))
    }

    /// Store the outcome, keyed by interaction id. Recording twice for the
    /// same interaction overwrites the first copy.
    pub async fn persist(&self, outcome: &InteractionOutcome) -> Result<()> {
        self.lead_store.upsert_interaction(outcome).await?;
        info!(
            lead_id = %outcome.lead_id,
            interaction_id = %outcome.interaction_id,
            channel = %outcome.channel,
            result = %outcome.result,
            "Interaction outcome recorded"
        );
        Ok(())
    }
}

fn validate_id(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", what)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(AppError::Validation(format!(
            "{} too long ({} > {} bytes)",
            what,
            value.len(),
            MAX_ID_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::lead_store::mocks::InMemoryLeadStore;

    fn recorder() -> (OutcomeRecorder, Arc<InMemoryLeadStore>) {
        let store = Arc::new(InMemoryLeadStore::new());
        (OutcomeRecorder::new(store.clone()), store)
    }

    #[test]
    fn test_rejects_outcome_outside_channel_vocabulary() {
        let (recorder, _) = recorder();
        // Voicemail is not an email outcome
        let err = recorder
            .build("lead-1", "int-1", Channel::Email, OutcomeKind::Voicemail, None, 1000)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_rejects_empty_ids() {
        let (recorder, _) = recorder();
        assert!(recorder
            .build("", "int-1", Channel::Call, OutcomeKind::NoAnswer, None, 1000)
            .is_err());
        assert!(recorder
            .build("lead-1", "", Channel::Call, OutcomeKind::NoAnswer, None, 1000)
            .is_err());
    }

    #[tokio::test]
    async fn test_rerecording_same_interaction_overwrites() {
        let (recorder, store) = recorder();

        let first = recorder
            .build("lead-1", "int-1", Channel::Call, OutcomeKind::NoAnswer, None, 1000)
            .unwrap();
        recorder.persist(&first).await.unwrap();

        let second = recorder
            .build("lead-1", "int-1", Channel::Call, OutcomeKind::Voicemail, None, 2000)
            .unwrap();
        recorder.persist(&second).await.unwrap();

        assert_eq!(store.interaction_count(), 1);
        let stored = store.interaction("int-1").unwrap();
        assert_eq!(stored.result, OutcomeKind::Voicemail);
    }
}
