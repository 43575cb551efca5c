pub mod mail;
pub mod memory;
pub mod models;
pub mod repository;

pub use mail::{LogMailer, Mailer};
pub use memory::{InMemoryRequestStore, StoreOp};
pub use models::*;
pub use repository::RequestStore;

use uuid::Uuid;

/// Failures reported by a `RequestStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Conditional update lost: expected status {expected}, found {actual}")]
    Conflict {
        id: Uuid,
        expected: RequestStatus,
        actual: RequestStatus,
    },
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Store call timed out after {0} ms")]
    Timeout(u64),
    #[error("Store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Backend(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
