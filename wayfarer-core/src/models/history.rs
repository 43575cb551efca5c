use crate::models::status::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One audit row per applied transition. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    /// `None` only for the creation event.
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    /// `None` for system-originated transitions.
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn new(
        request_id: Uuid,
        from_status: Option<RequestStatus>,
        to_status: RequestStatus,
        actor_id: Option<Uuid>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            from_status,
            to_status,
            actor_id,
            note,
            created_at: Utc::now(),
        }
    }

    pub fn is_creation(&self) -> bool {
        self.from_status.is_none()
    }
}
