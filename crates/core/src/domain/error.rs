// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// The attempted action is not legal from the lead's current status.
    /// The record is left untouched.
    #[error("Precondition failed: {action} not permitted while lead is {status}")]
    PreconditionFailed { action: String, status: String },

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
