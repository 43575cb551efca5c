use async_trait::async_trait;

use crate::models::CustomerNotification;

/// Outbound mail collaborator. Delivery is best-effort and lives outside the workflow.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the notification if it has not been emailed yet.
    async fn send_if_pending(
        &self,
        notification: &CustomerNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes the would-be email to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_if_pending(
        &self,
        notification: &CustomerNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if notification.is_email_pending() {
            tracing::info!(
                notification_id = %notification.id,
                recipient = %notification.recipient_id,
                "Email queued: {}",
                notification.title
            );
        }
        Ok(())
    }
}
