use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    CustomerNotification, DerivedBooking, ItineraryRequest, ItinerarySummary, PaymentStatus,
    RequestFilter, RequestStatus, StatusHistoryEntry, StatusUpdate,
};
use crate::repository::RequestStore;
use crate::{StoreError, StoreResult};

/// Store operations, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertRequest,
    GetRequest,
    ListRequests,
    UpdateStatus,
    UpdatePayment,
    GetItinerary,
    AppendHistory,
    ListHistory,
    InsertNotification,
    FindNotification,
    GetNotification,
    ListNotifications,
    MarkRead,
    MarkEmailed,
    InsertBooking,
    FindBooking,
}

#[derive(Default)]
struct State {
    requests: HashMap<Uuid, ItineraryRequest>,
    /// Insertion order, oldest first.
    request_order: Vec<Uuid>,
    itineraries: HashMap<Uuid, ItinerarySummary>,
    history: HashMap<Uuid, Vec<StatusHistoryEntry>>,
    notifications: Vec<CustomerNotification>,
    bookings: Vec<DerivedBooking>,
}

/// A thread-safe in-memory `RequestStore`.
///
/// Applies the same compare-and-set and uniqueness rules as the SQL store, and
/// can be told to fail or stall specific operations so tests can exercise
/// partial failures and timeouts.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    state: Arc<RwLock<State>>,
    /// Per operation: how many calls still pass before the fault fires.
    faults: Arc<Mutex<HashMap<StoreOp, usize>>>,
    /// Writes that land but report failure to the caller.
    lost_acks: Arc<Mutex<HashSet<StoreOp>>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `op` fails with a backend error.
    pub fn fail_on(&self, op: StoreOp) {
        self.fail_after(op, 0);
    }

    /// The next `passes` calls to `op` succeed, every later one fails.
    pub fn fail_after(&self, op: StoreOp, passes: usize) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, passes);
    }

    /// Calls to `op` are applied, then reported as failed, like a commit whose
    /// response never reached the caller.
    pub fn lose_ack(&self, op: StoreOp) {
        self.lost_acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op);
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.lost_acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Delay every operation, e.g. to trip caller timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub async fn add_itinerary(&self, itinerary: ItinerarySummary) {
        let mut state = self.state.write().await;
        state.itineraries.insert(itinerary.id, itinerary);
    }

    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    pub async fn notification_count(&self, request_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.request_id == request_id)
            .count()
    }

    async fn enter(&self, op: StoreOp) -> StoreResult<()> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(passes) = faults.get_mut(&op) {
            if *passes == 0 {
                return Err(StoreError::Backend(format!("injected failure on {:?}", op)));
            }
            *passes -= 1;
        }
        Ok(())
    }

    fn ack(&self, op: StoreOp) -> StoreResult<()> {
        if self
            .lost_acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&op)
        {
            return Err(StoreError::Backend(format!("acknowledgement lost on {:?}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert_request(&self, request: &ItineraryRequest) -> StoreResult<()> {
        self.enter(StoreOp::InsertRequest).await?;
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(format!("request {}", request.id)));
        }
        state.request_order.push(request.id);
        state.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ItineraryRequest>> {
        self.enter(StoreOp::GetRequest).await?;
        let state = self.state.read().await;
        Ok(state.requests.get(&id).cloned())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ItineraryRequest>> {
        self.enter(StoreOp::ListRequests).await?;
        let state = self.state.read().await;
        Ok(state
            .request_order
            .iter()
            .rev()
            .filter_map(|id| state.requests.get(id))
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        update: &StatusUpdate,
    ) -> StoreResult<ItineraryRequest> {
        self.enter(StoreOp::UpdateStatus).await?;
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("request {}", id)))?;

        if !request.status.same_as(expected) {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: request.status,
            });
        }

        request.apply(update);
        let updated = request.clone();
        self.ack(StoreOp::UpdateStatus)?;
        Ok(updated)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<ItineraryRequest> {
        self.enter(StoreOp::UpdatePayment).await?;
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("request {}", id)))?;

        if !request.status.same_as(expected) {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: request.status,
            });
        }

        request.payment_status = payment_status;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn get_itinerary(&self, id: Uuid) -> StoreResult<Option<ItinerarySummary>> {
        self.enter(StoreOp::GetItinerary).await?;
        let state = self.state.read().await;
        Ok(state.itineraries.get(&id).cloned())
    }

    async fn append_history(&self, entry: &StatusHistoryEntry) -> StoreResult<()> {
        self.enter(StoreOp::AppendHistory).await?;
        let mut state = self.state.write().await;
        let entries = state.history.entry(entry.request_id).or_default();
        if entries.iter().any(|e| e.to_status.same_as(entry.to_status)) {
            return Err(StoreError::Duplicate(format!(
                "history entry for request {} into {}",
                entry.request_id, entry.to_status
            )));
        }
        entries.push(entry.clone());
        self.ack(StoreOp::AppendHistory)
    }

    async fn list_history(&self, request_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
        self.enter(StoreOp::ListHistory).await?;
        let state = self.state.read().await;
        Ok(state
            .history
            .get(&request_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_notification(&self, notification: &CustomerNotification) -> StoreResult<()> {
        self.enter(StoreOp::InsertNotification).await?;
        let mut state = self.state.write().await;
        let exists = state.notifications.iter().any(|n| {
            n.request_id == notification.request_id
                && n.transition.same_as(notification.transition)
        });
        if exists {
            return Err(StoreError::Duplicate(format!(
                "notification for request {} transition {}",
                notification.request_id, notification.transition
            )));
        }
        state.notifications.push(notification.clone());
        self.ack(StoreOp::InsertNotification)
    }

    async fn find_notification(
        &self,
        request_id: Uuid,
        transition: RequestStatus,
    ) -> StoreResult<Option<CustomerNotification>> {
        self.enter(StoreOp::FindNotification).await?;
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .find(|n| n.request_id == request_id && n.transition.same_as(transition))
            .cloned())
    }

    async fn get_notification(&self, id: Uuid) -> StoreResult<Option<CustomerNotification>> {
        self.enter(StoreOp::GetNotification).await?;
        let state = self.state.read().await;
        Ok(state.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<CustomerNotification>> {
        self.enter(StoreOp::ListNotifications).await?;
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()> {
        self.enter(StoreOp::MarkRead).await?;
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id)))?;
        notification.is_read = true;
        Ok(())
    }

    async fn mark_notification_emailed(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()> {
        self.enter(StoreOp::MarkEmailed).await?;
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id)))?;
        notification.sent_via_email = true;
        notification.email_sent_at = Some(sent_at);
        Ok(())
    }

    async fn insert_booking(&self, booking: &DerivedBooking) -> StoreResult<Uuid> {
        self.enter(StoreOp::InsertBooking).await?;
        let mut state = self.state.write().await;
        if state.bookings.iter().any(|b| b.request_id == booking.request_id) {
            return Err(StoreError::Duplicate(format!(
                "booking for request {}",
                booking.request_id
            )));
        }
        state.bookings.push(booking.clone());
        self.ack(StoreOp::InsertBooking)?;
        Ok(booking.id)
    }

    async fn find_booking_by_request(&self, request_id: Uuid) -> StoreResult<Option<DerivedBooking>> {
        self.enter(StoreOp::FindBooking).await?;
        let state = self.state.read().await;
        Ok(state
            .bookings
            .iter()
            .find(|b| b.request_id == request_id)
            .cloned())
    }
}
