use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;
use wayfarer_catalog::{PricingBreakdown, PricingCalculator};
use wayfarer_core::{
    Actor, CustomerNotification, ItineraryRequest, Mailer, NewItineraryRequest, PaymentStatus,
    RequestFilter, RequestStatus, RequestStore, StatusHistoryEntry, StatusUpdate, StoreError,
};
use wayfarer_shared::CurrencyCode;

use crate::booking::BookingMaterializer;
use crate::error::{SideEffect, WorkflowError, WorkflowResult};
use crate::gateway::StoreGateway;
use crate::history::AuditTrail;
use crate::notification::NotificationDispatcher;
use crate::transitions::{self, TransitionRule};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on every store call.
    pub store_timeout: Duration,
    /// Extra attempts for idempotent reads.
    pub read_retries: u32,
    /// Hand new notifications to the mailer, once one is attached.
    pub email_notifications: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            read_retries: 2,
            email_notifications: false,
        }
    }
}

/// Admin input for `processing -> confirmed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmPayload {
    /// Overrides the computed estimate when present.
    pub total_price: Option<Decimal>,
    pub payment_due_date: NaiveDate,
    pub admin_notes: Option<String>,
}

/// Transition-specific input.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPayload {
    None,
    Confirm(ConfirmPayload),
    Reject { note: Option<String> },
    Cancel { reason: Option<String> },
}

/// Price estimate for a request, shown before confirming.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub request_id: Uuid,
    pub itinerary_id: Uuid,
    pub itinerary_title: String,
    pub currency: CurrencyCode,
    pub breakdown: PricingBreakdown,
}

/// A validated change, ready to be written.
struct PreparedTransition {
    update: StatusUpdate,
    note: Option<String>,
}

/// Drives itinerary requests through their lifecycle.
///
/// Every status write is a compare-and-set on the status the engine read, so
/// concurrent callers racing on the same request produce one winner. Side
/// effects run only for the winner, in this order: booking (confirm only),
/// audit entry, notification. Repeating a transition re-runs whichever of
/// those are missing, so a partial failure is repaired by retrying the call.
pub struct WorkflowEngine {
    store: StoreGateway,
    pricing: PricingCalculator,
    audit: AuditTrail,
    bookings: BookingMaterializer,
    notifications: NotificationDispatcher,
    email_notifications: bool,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn RequestStore>, pricing: PricingCalculator, config: EngineConfig) -> Self {
        let store = StoreGateway::new(store, config.store_timeout, config.read_retries);
        Self {
            audit: AuditTrail::new(store.clone()),
            bookings: BookingMaterializer::new(store.clone()),
            notifications: NotificationDispatcher::new(store.clone()),
            store,
            pricing,
            email_notifications: config.email_notifications,
        }
    }

    /// Emails go out only when `EngineConfig::email_notifications` is set.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.notifications = self.notifications.with_mailer(mailer, self.email_notifications);
        self
    }

    // ------------------------------------------------------------------
    // Customer submission and reads
    // ------------------------------------------------------------------

    /// Create a request in `pending` and record the creation event.
    pub async fn submit(&self, actor: &Actor, input: NewItineraryRequest) -> WorkflowResult<ItineraryRequest> {
        validate_submission(&input)?;

        let request = ItineraryRequest::new(actor.id, input, self.pricing.currency().clone());
        self.store
            .write("insert_request", |s| s.insert_request(&request))
            .await?;

        self.audit
            .record(request.id, None, RequestStatus::Pending, Some(actor.id), None)
            .await
            .map_err(|e| side_effect_failed(request.id, RequestStatus::Pending, SideEffect::AuditEntry, e))?;

        info!(request_id = %request.id, user_id = %actor.id, "Itinerary request submitted");
        Ok(request)
    }

    pub async fn get_request(&self, actor: &Actor, request_id: Uuid) -> WorkflowResult<ItineraryRequest> {
        let request = self.load(request_id).await?;
        ensure_visible(actor, &request)?;
        Ok(request)
    }

    /// Customers only ever see their own requests, whatever the filter says.
    pub async fn list_requests(&self, actor: &Actor, filter: RequestFilter) -> WorkflowResult<Vec<ItineraryRequest>> {
        let filter = if actor.is_admin() {
            filter
        } else {
            RequestFilter {
                user_id: Some(actor.id),
                ..filter
            }
        };
        Ok(self
            .store
            .read("list_requests", |s| s.list_requests(&filter))
            .await?)
    }

    /// Newest first.
    pub async fn list_history(&self, actor: &Actor, request_id: Uuid) -> WorkflowResult<Vec<StatusHistoryEntry>> {
        let request = self.load(request_id).await?;
        ensure_visible(actor, &request)?;
        Ok(self.audit.list(request_id).await?)
    }

    pub async fn list_notifications(
        &self,
        actor: &Actor,
        user_id: Uuid,
        unread_only: bool,
    ) -> WorkflowResult<Vec<CustomerNotification>> {
        if !actor.is_admin() && actor.id != user_id {
            return Err(WorkflowError::Authorization(
                "customers may only read their own notifications".to_string(),
            ));
        }
        Ok(self
            .store
            .read("list_notifications", |s| s.list_notifications(user_id, unread_only))
            .await?)
    }

    /// Only the recipient may mark a notification read. Repeating the call is a no-op.
    pub async fn mark_notification_read(&self, actor: &Actor, notification_id: Uuid) -> WorkflowResult<()> {
        let notification = self
            .store
            .read("get_notification", |s| s.get_notification(notification_id))
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("notification {}", notification_id)))?;

        if notification.recipient_id != actor.id {
            return Err(WorkflowError::Authorization(
                "only the recipient may mark a notification read".to_string(),
            ));
        }
        if notification.is_read {
            return Ok(());
        }

        self.store
            .write("mark_notification_read", |s| s.mark_notification_read(notification_id))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Admin console
    // ------------------------------------------------------------------

    pub async fn quote(&self, actor: &Actor, request_id: Uuid) -> WorkflowResult<Quote> {
        ensure_admin(actor, "quote")?;
        let request = self.load(request_id).await?;
        self.quote_for(&request).await
    }

    /// Writes the payment-status field only. The workflow status is untouched.
    pub async fn record_payment_status(
        &self,
        request_id: Uuid,
        actor: &Actor,
        payment_status: PaymentStatus,
    ) -> WorkflowResult<ItineraryRequest> {
        ensure_admin(actor, "record payment status")?;
        let request = self.load(request_id).await?;

        if !matches!(
            request.status.canonical(),
            RequestStatus::Confirmed | RequestStatus::Completed
        ) {
            return Err(WorkflowError::Validation(format!(
                "payment status is only tracked for confirmed or completed requests, request is {}",
                request.status
            )));
        }
        if request.payment_status == payment_status {
            return Ok(request);
        }

        let updated = self
            .store
            .write("update_payment_status", |s| {
                s.update_payment_status(request_id, request.status, payment_status)
            })
            .await?;

        info!(
            request_id = %request_id,
            from = %request.payment_status,
            to = %payment_status,
            actor = %actor.id,
            "Payment status recorded"
        );
        Ok(updated)
    }

    pub async fn start_processing(&self, request_id: Uuid, actor: &Actor) -> WorkflowResult<ItineraryRequest> {
        self.transition(request_id, RequestStatus::Processing, actor, TransitionPayload::None)
            .await
    }

    pub async fn confirm_with_price(
        &self,
        request_id: Uuid,
        actor: &Actor,
        payload: ConfirmPayload,
    ) -> WorkflowResult<ItineraryRequest> {
        self.transition(
            request_id,
            RequestStatus::Confirmed,
            actor,
            TransitionPayload::Confirm(payload),
        )
        .await
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        actor: &Actor,
        note: Option<String>,
    ) -> WorkflowResult<ItineraryRequest> {
        self.transition(
            request_id,
            RequestStatus::Rejected,
            actor,
            TransitionPayload::Reject { note },
        )
        .await
    }

    /// Admins may cancel any non-terminal request; customers only their own, with a reason.
    pub async fn cancel(
        &self,
        request_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> WorkflowResult<ItineraryRequest> {
        self.transition(
            request_id,
            RequestStatus::Cancelled,
            actor,
            TransitionPayload::Cancel { reason },
        )
        .await
    }

    pub async fn complete(&self, request_id: Uuid, actor: &Actor) -> WorkflowResult<ItineraryRequest> {
        self.transition(request_id, RequestStatus::Completed, actor, TransitionPayload::None)
            .await
    }

    // ------------------------------------------------------------------
    // Transition core
    // ------------------------------------------------------------------

    /// Validate and apply `current -> target`.
    ///
    /// Asking for the state the request is already in writes no status and
    /// only fills in side effects an earlier attempt left out. A repeated
    /// confirm must carry the same terms.
    pub async fn transition(
        &self,
        request_id: Uuid,
        target: RequestStatus,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> WorkflowResult<ItineraryRequest> {
        let request = self.load(request_id).await?;
        let rule = transitions::rule_for(target)
            .ok_or_else(|| WorkflowError::invalid_transition(request.status, target))?;
        authorize(rule, &request, actor)?;

        let repeat = request.status.same_as(target);
        if !repeat {
            transitions::check(request.status, target)?;
        }

        let prepared = self.prepare(&request, target, actor, payload).await?;

        if repeat {
            check_repeat(&request, target, &prepared.update)?;
            return self.reconcile(request, rule, actor, prepared.note).await;
        }

        let update = prepared.update;
        let written = self
            .store
            .write("update_request_status", |s| {
                s.update_request_status(request.id, request.status, &update)
            })
            .await;

        let updated = match written {
            Ok(updated) => updated,
            Err(StoreError::Conflict { actual, .. }) => {
                return self.after_lost_race(&request, target, actual, &update).await;
            }
            Err(e) => return Err(e.into()),
        };

        if rule.materializes_booking {
            let price = updated.total_price.unwrap_or_default();
            if let Err(e) = self.bookings.materialize(&updated, price).await {
                // The insert may have committed even though the call failed.
                match self.bookings.existing(request.id).await {
                    Ok(Some(booking)) => {
                        warn!(
                            request_id = %request.id,
                            booking_id = %booking.id,
                            error = %e,
                            "Booking write reported failure but the booking exists"
                        );
                    }
                    _ => return Err(self.compensate(&request, &updated, e).await),
                }
            }
        }

        self.audit
            .record(
                request.id,
                Some(request.status),
                target,
                Some(actor.id),
                prepared.note,
            )
            .await
            .map_err(|e| side_effect_failed(request.id, target, SideEffect::AuditEntry, e))?;

        if rule.notifies {
            self.notifications
                .notify(&updated, target, None)
                .await
                .map_err(|e| side_effect_failed(request.id, target, SideEffect::Notification, e))?;
        }

        info!(
            request_id = %request.id,
            from = %request.status,
            to = %target,
            actor = %actor.id,
            "Request transitioned"
        );
        Ok(updated)
    }

    /// Turn the payload into the full set of workflow fields to write.
    async fn prepare(
        &self,
        request: &ItineraryRequest,
        target: RequestStatus,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> WorkflowResult<PreparedTransition> {
        let now = Utc::now();
        let mut update = StatusUpdate::from_request(request);
        update.status = target;
        update.updated_at = now;

        let note = match (target, payload) {
            (RequestStatus::Processing | RequestStatus::Completed, TransitionPayload::None) => None,
            (RequestStatus::Confirmed, TransitionPayload::Confirm(confirm)) => {
                let price = match confirm.total_price {
                    Some(price) if price.normalize().scale() > 2 => {
                        return Err(WorkflowError::Validation(format!(
                            "confirmed price {} has more than two decimal places",
                            price
                        )));
                    }
                    Some(price) => price,
                    None => self.quote_for(request).await?.breakdown.grand_total.round_dp(2),
                };
                if price <= Decimal::ZERO {
                    return Err(WorkflowError::Validation(format!(
                        "confirmed price must be positive, got {}",
                        price
                    )));
                }
                update.total_price = Some(price);
                update.payment_due_date = Some(confirm.payment_due_date);
                update.admin_notes = confirm.admin_notes.clone().or(update.admin_notes);
                update.confirmed_by = Some(actor.id);
                update.confirmed_at = Some(now);
                confirm.admin_notes
            }
            (RequestStatus::Rejected, TransitionPayload::Reject { note }) => {
                update.admin_notes = note.clone().or(update.admin_notes);
                note
            }
            (RequestStatus::Cancelled, TransitionPayload::Cancel { reason }) => {
                let reason = reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                if !actor.is_admin() && reason.is_none() {
                    return Err(WorkflowError::Validation(
                        "a cancellation reason is required".to_string(),
                    ));
                }
                update.cancellation_reason = reason.clone();
                update.cancelled_by = Some(actor.id);
                update.cancelled_at = Some(now);
                reason
            }
            (target, payload) => {
                return Err(WorkflowError::Validation(format!(
                    "payload {:?} does not apply to a transition into {}",
                    payload, target
                )));
            }
        };

        Ok(PreparedTransition { update, note })
    }

    /// The compare-and-set lost. If the winner applied the same change, report
    /// success without repeating any side effect.
    async fn after_lost_race(
        &self,
        request: &ItineraryRequest,
        target: RequestStatus,
        actual: RequestStatus,
        update: &StatusUpdate,
    ) -> WorkflowResult<ItineraryRequest> {
        let current = self.load(request.id).await?;
        if current.status.same_as(target) && (target != RequestStatus::Confirmed || same_terms(&current, update)) {
            warn!(request_id = %request.id, to = %target, "Concurrent identical transition already applied");
            return Ok(current);
        }

        warn!(
            request_id = %request.id,
            expected = %request.status,
            found = %actual,
            "Lost status update race"
        );
        Err(WorkflowError::Conflict {
            request_id: request.id,
            expected: request.status,
            actual: current.status,
        })
    }

    /// Fill in whatever side effects of reaching `rule.to` are missing. Each
    /// one is keyed per request and transition, so racing callers and plain
    /// retries converge on a single booking, entry and notification.
    async fn reconcile(
        &self,
        request: ItineraryRequest,
        rule: &TransitionRule,
        actor: &Actor,
        note: Option<String>,
    ) -> WorkflowResult<ItineraryRequest> {
        let target = rule.to;

        if rule.materializes_booking {
            let price = request.total_price.unwrap_or_default();
            self.bookings
                .materialize(&request, price)
                .await
                .map_err(|e| side_effect_failed(request.id, target, SideEffect::BookingMaterialization, e))?;
        }

        let history = self.audit.list(request.id).await?;
        if !history.iter().any(|e| e.to_status.same_as(target)) {
            // Newest first: the last status reached before this one.
            let from = history.first().map(|e| e.to_status);
            self.audit
                .record(request.id, from, target, Some(actor.id), note)
                .await
                .map_err(|e| side_effect_failed(request.id, target, SideEffect::AuditEntry, e))?;
            warn!(request_id = %request.id, to = %target, "Restored missing audit entry");
        }

        if rule.notifies {
            self.notifications
                .notify(&request, target, None)
                .await
                .map_err(|e| side_effect_failed(request.id, target, SideEffect::Notification, e))?;
        }

        info!(request_id = %request.id, status = %request.status, "Repeated transition reconciled");
        Ok(request)
    }

    /// Booking failed after the status moved: put the request back where it was.
    async fn compensate(
        &self,
        original: &ItineraryRequest,
        updated: &ItineraryRequest,
        cause: StoreError,
    ) -> WorkflowError {
        let restore = StatusUpdate::from_request(original);
        let restored = self
            .store
            .write("update_request_status", |s| {
                s.update_request_status(original.id, updated.status, &restore)
            })
            .await;

        match restored {
            Ok(_) => {
                warn!(
                    request_id = %original.id,
                    restored = %original.status,
                    error = %cause,
                    "Booking materialization failed, status reverted"
                );
                WorkflowError::Persistence(format!(
                    "booking materialization failed, request restored to {}: {}",
                    original.status, cause
                ))
            }
            Err(compensation) => {
                error!(
                    request_id = %original.id,
                    error = %cause,
                    compensation_error = %compensation,
                    "Request confirmed without booking and could not be reverted"
                );
                WorkflowError::PartialFailure {
                    request_id: original.id,
                    reached: updated.status,
                    step: SideEffect::BookingMaterialization,
                    reason: format!("{}; revert failed: {}", cause, compensation),
                }
            }
        }
    }

    async fn quote_for(&self, request: &ItineraryRequest) -> WorkflowResult<Quote> {
        let itinerary_id = request.itinerary_id;
        let itinerary = self
            .store
            .read("get_itinerary", |s| s.get_itinerary(itinerary_id))
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("itinerary {}", itinerary_id)))?;

        let breakdown = self.pricing.estimate(&itinerary.duration, &request.group_size);
        if breakdown.used_fallback() {
            warn!(
                request_id = %request.id,
                fallbacks = breakdown.fallbacks.len(),
                "Quote priced with fallback counts"
            );
        }

        Ok(Quote {
            request_id: request.id,
            itinerary_id,
            itinerary_title: itinerary.title,
            currency: request.currency.clone(),
            breakdown,
        })
    }

    async fn load(&self, request_id: Uuid) -> WorkflowResult<ItineraryRequest> {
        self.store
            .read("get_request", |s| s.get_request(request_id))
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("request {}", request_id)))
    }
}

/// The request already sits in `target`.
fn check_repeat(request: &ItineraryRequest, target: RequestStatus, update: &StatusUpdate) -> WorkflowResult<()> {
    if target == RequestStatus::Confirmed && !same_terms(request, update) {
        return Err(WorkflowError::Validation(format!(
            "request {} is already confirmed with different terms",
            request.id
        )));
    }
    Ok(())
}

/// The status moved but `step` did not complete. Retrying the same
/// transition fills it in.
fn side_effect_failed(request_id: Uuid, reached: RequestStatus, step: SideEffect, err: StoreError) -> WorkflowError {
    error!(request_id = %request_id, reached = %reached, step = %step, error = %err, "Side effect failed after status change");
    WorkflowError::PartialFailure {
        request_id,
        reached,
        step,
        reason: err.to_string(),
    }
}

fn same_terms(request: &ItineraryRequest, update: &StatusUpdate) -> bool {
    request.total_price == update.total_price
        && request.payment_due_date == update.payment_due_date
        && request.admin_notes == update.admin_notes
}

fn authorize(rule: &TransitionRule, request: &ItineraryRequest, actor: &Actor) -> WorkflowResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    if rule.admin_only {
        return Err(WorkflowError::Authorization(format!(
            "moving a request to {} requires an administrator",
            rule.to
        )));
    }
    if !request.is_owned_by(actor.id) {
        return Err(WorkflowError::Authorization(format!(
            "request {} belongs to another customer",
            request.id
        )));
    }
    Ok(())
}

fn ensure_admin(actor: &Actor, action: &str) -> WorkflowResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Authorization(format!(
            "{} requires an administrator",
            action
        )))
    }
}

fn ensure_visible(actor: &Actor, request: &ItineraryRequest) -> WorkflowResult<()> {
    if actor.is_admin() || request.is_owned_by(actor.id) {
        Ok(())
    } else {
        Err(WorkflowError::Authorization(format!(
            "request {} belongs to another customer",
            request.id
        )))
    }
}

fn validate_submission(input: &NewItineraryRequest) -> WorkflowResult<()> {
    if input.end_date < input.start_date {
        return Err(WorkflowError::Validation(
            "end date must not be before start date".to_string(),
        ));
    }
    if input.group_size.trim().is_empty() {
        return Err(WorkflowError::Validation("group size is required".to_string()));
    }
    if input.contact.name.trim().is_empty() {
        return Err(WorkflowError::Validation("contact name is required".to_string()));
    }
    if !input.contact.email.expose().contains('@') {
        return Err(WorkflowError::Validation(
            "contact email is not valid".to_string(),
        ));
    }
    Ok(())
}
