use std::fmt;
use uuid::Uuid;
use wayfarer_core::{RequestStatus, StoreError};

/// A dependent write that runs after the status has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    AuditEntry,
    BookingMaterialization,
    Notification,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SideEffect::AuditEntry => "audit entry",
            SideEffect::BookingMaterialization => "booking materialization",
            SideEffect::Notification => "notification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The transition is not allowed from the current state, or the payload is unusable.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent writer moved the request first. Refetch before retrying.
    #[error("Request {request_id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        request_id: Uuid,
        expected: RequestStatus,
        actual: RequestStatus,
    },

    /// The store could not be reached or failed. Reads may be retried.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The status was written but a dependent write was not. Retrying the same
    /// transition fills in the missing step.
    #[error("Request {request_id} reached {reached} but {step} failed: {reason}")]
    PartialFailure {
        request_id: Uuid,
        reached: RequestStatus,
        step: SideEffect,
        reason: String,
    },
}

impl WorkflowError {
    pub fn invalid_transition(from: RequestStatus, to: RequestStatus) -> Self {
        WorkflowError::Validation(format!("invalid transition from {} to {}", from, to))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => WorkflowError::NotFound(what),
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => WorkflowError::Conflict {
                request_id: id,
                expected,
                actual,
            },
            other => WorkflowError::Persistence(other.to_string()),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
