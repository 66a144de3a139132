// Central Error Type for the Engine

use crate::domain::JobKind;
use thiserror::Error;

/// Application-level error type
///
/// Every public entry point of the engine returns `Result<_, AppError>`;
/// nothing panics past the engine boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// The remote job itself ran and failed. The failure reason has already
    /// been written to the lead's stage error field; the user retries by
    /// re-entering the originating precondition state.
    #[error("Remote {stage} job failed: {reason}")]
    RemoteJobFailed { stage: JobKind, reason: String },

    /// A submission request timed out before the gateway confirmed it.
    /// The outcome is unknown, not failed: the job may exist server-side.
    #[error("Submission of {kind} for lead {lead_id} timed out")]
    SubmissionTimeout { kind: JobKind, lead_id: String },

    /// Another submission for the same (kind, lead) is currently in flight.
    #[error("Submission of {kind} for lead {lead_id} already in flight")]
    SubmissionInFlight { kind: JobKind, lead_id: String },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// From implementation for infra crates (to avoid circular dependency):
// sqlx errors are stringified at the adapter boundary.
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Database(err)
    }
}
