use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use wayfarer_catalog::parse_group_size;
use wayfarer_core::{BookingStatus, DerivedBooking, ItineraryRequest, StoreError, StoreResult};

use crate::gateway::StoreGateway;

/// Creates the booking that backs a confirmed request. At most one per request.
#[derive(Clone)]
pub struct BookingMaterializer {
    store: StoreGateway,
}

impl BookingMaterializer {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Insert the booking for `request`, or return the one that already exists.
    pub async fn materialize(
        &self,
        request: &ItineraryRequest,
        final_price: Decimal,
    ) -> StoreResult<DerivedBooking> {
        if let Some(existing) = self.existing(request.id).await? {
            if existing.total_price != final_price {
                tracing::warn!(
                    request_id = %request.id,
                    booking_id = %existing.id,
                    booked = %existing.total_price,
                    confirmed = %final_price,
                    "Reusing existing booking with a different price"
                );
            }
            return Ok(existing);
        }

        let booking = Self::snapshot(request, final_price);
        let inserted = self
            .store
            .write("insert_booking", |s| s.insert_booking(&booking))
            .await;
        match inserted {
            Ok(_) => {
                tracing::info!(request_id = %request.id, booking_id = %booking.id, "Booking materialized");
                Ok(booking)
            }
            // Another writer got there first; theirs is the booking.
            Err(StoreError::Duplicate(_)) => self.existing(request.id).await?.ok_or_else(|| {
                StoreError::Backend(format!(
                    "booking for request {} reported as duplicate but not found",
                    request.id
                ))
            }),
            Err(err) => Err(err),
        }
    }

    pub async fn existing(&self, request_id: Uuid) -> StoreResult<Option<DerivedBooking>> {
        self.store
            .read("find_booking_by_request", |s| s.find_booking_by_request(request_id))
            .await
    }

    /// Copy of the request as it stands at confirmation.
    pub fn snapshot(request: &ItineraryRequest, final_price: Decimal) -> DerivedBooking {
        let participants = i32::try_from(parse_group_size(&request.group_size).value()).unwrap_or(i32::MAX);

        DerivedBooking {
            id: Uuid::new_v4(),
            request_id: request.id,
            itinerary_id: request.itinerary_id,
            user_id: request.user_id,
            guide_id: request.guide_id,
            participants,
            start_date: request.start_date,
            end_date: request.end_date,
            total_price: final_price,
            currency: request.currency.clone(),
            status: BookingStatus::Confirmed,
            contact_name: request.contact.name.clone(),
            contact_email: request.contact.email.clone(),
            contact_phone: request.contact.phone.clone(),
            special_requests: request.additional_requests.clone(),
            created_at: Utc::now(),
        }
    }
}
