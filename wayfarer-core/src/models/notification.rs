use crate::models::status::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = crate::models::status::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            other => Err(crate::models::status::UnknownStatus {
                kind: "notification kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A message addressed to the request owner after a transition.
///
/// Only `is_read` (by the recipient) and the email fields (by the dispatcher)
/// ever change after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerNotification {
    pub id: Uuid,
    pub request_id: Uuid,
    pub recipient_id: Uuid,
    /// The status whose transition produced this notification. At most one
    /// notification exists per request and transition.
    pub transition: RequestStatus,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub sent_via_email: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CustomerNotification {
    pub fn new(
        request_id: Uuid,
        recipient_id: Uuid,
        transition: RequestStatus,
        title: String,
        message: String,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            recipient_id,
            transition,
            title,
            message,
            kind,
            is_read: false,
            sent_via_email: false,
            email_sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Rows the mail collaborator has not picked up yet.
    pub fn is_email_pending(&self) -> bool {
        !self.sent_via_email
    }
}
