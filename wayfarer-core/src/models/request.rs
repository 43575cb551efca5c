use crate::models::status::{PaymentStatus, RequestStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_shared::{CurrencyCode, Masked};

/// Who to reach about the trip. Copied onto the booking at confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactDetails {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
}

/// Customer input for a new trip request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItineraryRequest {
    pub itinerary_id: Uuid,
    pub guide_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Traveler count as the customer typed it.
    pub group_size: String,
    pub additional_requests: Option<String>,
    pub contact: ContactDetails,
}

/// The aggregate root of the request workflow.
///
/// `status` is only ever written through the workflow engine, via a
/// compare-and-set `StatusUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub itinerary_id: Uuid,
    pub guide_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub group_size: String,
    pub additional_requests: Option<String>,
    pub contact: ContactDetails,
    pub status: RequestStatus,
    pub payment_status: PaymentStatus,
    /// Null until the request is confirmed.
    pub total_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub payment_due_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub confirmed_by: Option<Uuid>,
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ItineraryRequest {
    pub fn new(user_id: Uuid, input: NewItineraryRequest, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            itinerary_id: input.itinerary_id,
            guide_id: input.guide_id,
            start_date: input.start_date,
            end_date: input.end_date,
            group_size: input.group_size,
            additional_requests: input.additional_requests,
            contact: input.contact,
            status: RequestStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_price: None,
            currency,
            payment_due_date: None,
            admin_notes: None,
            cancellation_reason: None,
            confirmed_by: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Overwrite the workflow fields with a committed update.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.total_price = update.total_price;
        self.currency = update.currency.clone();
        self.payment_due_date = update.payment_due_date;
        self.admin_notes = update.admin_notes.clone();
        self.cancellation_reason = update.cancellation_reason.clone();
        self.confirmed_by = update.confirmed_by;
        self.cancelled_by = update.cancelled_by;
        self.confirmed_at = update.confirmed_at;
        self.cancelled_at = update.cancelled_at;
        self.updated_at = update.updated_at;
    }
}

/// The full set of workflow fields written by one conditional update.
///
/// Trip parameters and the payment status are never part of an update; only
/// the engine builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: RequestStatus,
    pub total_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub payment_due_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub confirmed_by: Option<Uuid>,
    pub cancelled_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Snapshot of the current workflow fields, used as the base for a change.
    pub fn from_request(request: &ItineraryRequest) -> Self {
        Self {
            status: request.status,
            total_price: request.total_price,
            currency: request.currency.clone(),
            payment_due_date: request.payment_due_date,
            admin_notes: request.admin_notes.clone(),
            cancellation_reason: request.cancellation_reason.clone(),
            confirmed_by: request.confirmed_by,
            cancelled_by: request.cancelled_by,
            confirmed_at: request.confirmed_at,
            cancelled_at: request.cancelled_at,
            updated_at: Utc::now(),
        }
    }
}

/// Listing filter used by both consoles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub user_id: Option<Uuid>,
}

impl RequestFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            status: None,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, request: &ItineraryRequest) -> bool {
        self.status.map_or(true, |s| s.same_as(request.status))
            && self.user_id.map_or(true, |u| u == request.user_id)
    }
}
