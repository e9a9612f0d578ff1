//! Error types for the goal engine.
//!
//! Errors are classified by recoverability:
//! - Advisory: the operation proceeded, the caller should inform the user
//! - Rejected: the request was refused, no mutation was applied
//! - Recoverable: a store failure; pending UI state should be cleared

use thiserror::Error;

/// Errors produced by the goal engines and the service layer around them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Goal not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Transfer plan diverged from preview: {0}")]
    TransferConflict(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// True when the operation still went through and the error only
    /// signals that what happened may differ from what was previewed.
    pub fn is_advisory(&self) -> bool {
        matches!(self, EngineError::TransferConflict(_))
    }

    /// True when retrying the same call can succeed (store hiccups).
    /// Rejected requests (`NotFound`, `InvalidTransition`) never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Persistence(_))
    }

    /// Short suggestion for the toast shown alongside the error.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "Refresh the board; the goal may have been removed.",
            EngineError::InvalidTransition(_) => {
                "This change isn't allowed for that goal level."
            }
            EngineError::TransferConflict(_) => {
                "Goals changed since the preview; review what was moved."
            }
            EngineError::Persistence(_) => "Saving failed. Your change was not stored; try again.",
        }
    }
}

impl From<crate::db::DbError> for EngineError {
    fn from(err: crate::db::DbError) -> Self {
        EngineError::Persistence(err.to_string())
    }
}

/// Serializable error representation for the UI boundary.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    NotFound,
    InvalidTransition,
    TransferConflict,
    Persistence,
}

impl From<&EngineError> for GoalError {
    fn from(err: &EngineError) -> Self {
        let error_type = match err {
            EngineError::NotFound(_) => ErrorType::NotFound,
            EngineError::InvalidTransition(_) => ErrorType::InvalidTransition,
            EngineError::TransferConflict(_) => ErrorType::TransferConflict,
            EngineError::Persistence(_) => ErrorType::Persistence,
        };

        GoalError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
