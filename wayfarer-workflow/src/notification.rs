use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use wayfarer_core::{
    CustomerNotification, ItineraryRequest, Mailer, NotificationKind, RequestStatus, StoreError,
    StoreResult,
};

use crate::gateway::StoreGateway;

/// Title, body and severity of a customer message.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTemplate {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl NotificationTemplate {
    /// Default wording for the transition that moved `request` into `to`.
    pub fn for_transition(request: &ItineraryRequest, to: RequestStatus) -> Self {
        let dates = format!("{} to {}", request.start_date, request.end_date);
        match to.canonical() {
            RequestStatus::Pending => Self {
                title: "We received your trip request".to_string(),
                message: format!("Your request for {} is waiting for review.", dates),
                kind: NotificationKind::Info,
            },
            RequestStatus::Processing => Self {
                title: "Your trip request is being prepared".to_string(),
                message: format!("Our team is working on your trip for {}.", dates),
                kind: NotificationKind::Info,
            },
            RequestStatus::Confirmed | RequestStatus::Approved => {
                let price = request
                    .total_price
                    .map(|p| format!(" Total: {} {}.", p, request.currency))
                    .unwrap_or_default();
                let due = request
                    .payment_due_date
                    .map(|d| format!(" Payment is due by {}.", d))
                    .unwrap_or_default();
                Self {
                    title: "Your trip is confirmed".to_string(),
                    message: format!("Your trip for {} is confirmed.{}{}", dates, price, due),
                    kind: NotificationKind::Success,
                }
            }
            RequestStatus::Rejected => Self {
                title: "Your trip request was declined".to_string(),
                message: format!(
                    "We are unable to arrange your trip for {}.{}",
                    dates,
                    request
                        .admin_notes
                        .as_deref()
                        .map(|n| format!(" Note: {}", n))
                        .unwrap_or_default()
                ),
                kind: NotificationKind::Warning,
            },
            RequestStatus::Cancelled => Self {
                title: "Your trip request was cancelled".to_string(),
                message: format!(
                    "Your trip for {} has been cancelled.{}",
                    dates,
                    request
                        .cancellation_reason
                        .as_deref()
                        .map(|r| format!(" Reason: {}", r))
                        .unwrap_or_default()
                ),
                kind: if request.cancelled_by == Some(request.user_id) {
                    NotificationKind::Info
                } else {
                    NotificationKind::Warning
                },
            },
            RequestStatus::Completed => Self {
                title: "Thanks for travelling with us".to_string(),
                message: format!("Your trip for {} is complete. We hope you enjoyed it.", dates),
                kind: NotificationKind::Success,
            },
        }
    }
}

/// Persists one notification per request and transition, addressed to the request owner.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: StoreGateway,
    mailer: Option<Arc<dyn Mailer>>,
    email_enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(store: StoreGateway) -> Self {
        Self {
            store,
            mailer: None,
            email_enabled: false,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>, email_enabled: bool) -> Self {
        self.mailer = Some(mailer);
        self.email_enabled = email_enabled;
        self
    }

    /// Record the notification for `request` reaching `to`.
    ///
    /// Retrying the same transition returns the existing row instead of writing a second one.
    pub async fn notify(
        &self,
        request: &ItineraryRequest,
        to: RequestStatus,
        template: Option<NotificationTemplate>,
    ) -> StoreResult<CustomerNotification> {
        if let Some(existing) = self.existing(request.id, to).await? {
            tracing::debug!(request_id = %request.id, transition = %to, "Notification already recorded");
            return Ok(existing);
        }

        let template = template.unwrap_or_else(|| NotificationTemplate::for_transition(request, to));
        let notification = CustomerNotification::new(
            request.id,
            request.user_id,
            to.canonical(),
            template.title,
            template.message,
            template.kind,
        );

        let inserted = self
            .store
            .write("insert_notification", |s| s.insert_notification(&notification))
            .await;
        let notification = match inserted {
            Ok(()) => notification,
            Err(StoreError::Duplicate(_)) => {
                return self.existing(request.id, to).await?.ok_or_else(|| {
                    StoreError::Backend(format!(
                        "notification for request {} reported as duplicate but not found",
                        request.id
                    ))
                })
            }
            Err(err) => return Err(err),
        };

        Ok(self.try_email(notification).await)
    }

    async fn existing(&self, request_id: Uuid, to: RequestStatus) -> StoreResult<Option<CustomerNotification>> {
        self.store
            .read("find_notification", |s| s.find_notification(request_id, to))
            .await
    }

    /// Best-effort: failures are logged and the notification is returned unflagged.
    async fn try_email(&self, mut notification: CustomerNotification) -> CustomerNotification {
        let Some(mailer) = self.mailer.as_ref().filter(|_| self.email_enabled) else {
            return notification;
        };

        if let Err(e) = mailer.send_if_pending(&notification).await {
            tracing::warn!(notification_id = %notification.id, error = %e, "Email delivery failed");
            return notification;
        }

        let sent_at = Utc::now();
        let id = notification.id;
        match self
            .store
            .write("mark_notification_emailed", |s| s.mark_notification_emailed(id, sent_at))
            .await
        {
            Ok(()) => {
                notification.sent_via_email = true;
                notification.email_sent_at = Some(sent_at);
            }
            Err(e) => {
                tracing::warn!(notification_id = %id, error = %e, "Could not flag notification as emailed");
            }
        }
        notification
    }
}
