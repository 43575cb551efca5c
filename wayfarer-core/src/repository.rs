use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CustomerNotification, DerivedBooking, ItineraryRequest, ItinerarySummary, PaymentStatus,
    RequestFilter, RequestStatus, StatusHistoryEntry, StatusUpdate,
};
use crate::StoreResult;

/// Durable storage for the request workflow.
///
/// Every write is a single atomic statement. Status changes go through
/// `update_request_status`, which only applies when the stored status still
/// matches the caller's expectation.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: &ItineraryRequest) -> StoreResult<()>;

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ItineraryRequest>>;

    /// Newest first.
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ItineraryRequest>>;

    /// Compare-and-set on `status`. Fails with `StoreError::Conflict` when the
    /// stored status no longer equals `expected` (modulo the `approved` alias).
    async fn update_request_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        update: &StatusUpdate,
    ) -> StoreResult<ItineraryRequest>;

    /// Writes only `payment_status`, guarded by the current workflow status.
    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<ItineraryRequest>;

    async fn get_itinerary(&self, id: Uuid) -> StoreResult<Option<ItinerarySummary>>;

    /// A request reaches each status at most once, so a second entry into the
    /// same status fails with `StoreError::Duplicate`.
    async fn append_history(&self, entry: &StatusHistoryEntry) -> StoreResult<()>;

    /// Newest first.
    async fn list_history(&self, request_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>>;

    /// Fails with `StoreError::Duplicate` if the request already has a
    /// notification for the same transition.
    async fn insert_notification(&self, notification: &CustomerNotification) -> StoreResult<()>;

    async fn find_notification(
        &self,
        request_id: Uuid,
        transition: RequestStatus,
    ) -> StoreResult<Option<CustomerNotification>>;

    async fn get_notification(&self, id: Uuid) -> StoreResult<Option<CustomerNotification>>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<CustomerNotification>>;

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()>;

    async fn mark_notification_emailed(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()>;

    /// Fails with `StoreError::Duplicate` if the request already has a booking.
    async fn insert_booking(&self, booking: &DerivedBooking) -> StoreResult<Uuid>;

    async fn find_booking_by_request(&self, request_id: Uuid) -> StoreResult<Option<DerivedBooking>>;
}
