use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_shared::{CurrencyCode, Masked};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

/// Snapshot of a confirmed request. One per request, never mutated by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedBooking {
    pub id: Uuid,
    /// Owning request; at most one booking exists per request.
    pub request_id: Uuid,
    pub itinerary_id: Uuid,
    pub user_id: Uuid,
    pub guide_id: Option<Uuid>,
    pub participants: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Decimal,
    pub currency: CurrencyCode,
    pub status: BookingStatus,
    pub contact_name: String,
    pub contact_email: Masked<String>,
    pub contact_phone: Option<Masked<String>>,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
}
