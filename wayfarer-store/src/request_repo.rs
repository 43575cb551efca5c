use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;
use wayfarer_core::{
    BookingStatus, ContactDetails, CustomerNotification, DerivedBooking, ItineraryRequest,
    ItinerarySummary, PaymentStatus, RequestFilter, RequestStatus, RequestStore,
    StatusHistoryEntry, StatusUpdate, StoreError, StoreResult,
};
use wayfarer_shared::{CurrencyCode, Masked};

/// Postgres-backed `RequestStore`.
///
/// Status writes are single `UPDATE ... WHERE status = ANY(..)` statements, so
/// the compare-and-set holds across processes. Uniqueness of bookings and
/// notifications is enforced by table constraints and surfaces as
/// `StoreError::Duplicate`.
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tell a missing row apart from a lost compare-and-set.
    async fn explain_miss(&self, id: Uuid, expected: RequestStatus) -> StoreError {
        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM itinerary_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        match current {
            Ok(Some(actual)) => match parse::<RequestStatus>(&actual) {
                Ok(actual) => StoreError::Conflict { id, expected, actual },
                Err(e) => e,
            },
            Ok(None) => StoreError::NotFound(format!("request {}", id)),
            Err(e) => db_error(e),
        }
    }
}

fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.message().to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn parse<T>(value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Backend(format!("corrupt column value: {}", e)))
}

/// Stored forms matching `status`, including the legacy alias.
fn status_forms(status: RequestStatus) -> Vec<String> {
    status
        .persisted_forms()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

const REQUEST_COLUMNS: &str = "id, user_id, itinerary_id, guide_id, start_date, end_date, group_size, \
    additional_requests, contact_name, contact_email, contact_phone, status, payment_status, \
    total_price, currency, payment_due_date, admin_notes, cancellation_reason, confirmed_by, \
    cancelled_by, created_at, updated_at, confirmed_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    user_id: Uuid,
    itinerary_id: Uuid,
    guide_id: Option<Uuid>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    group_size: String,
    additional_requests: Option<String>,
    contact_name: String,
    contact_email: String,
    contact_phone: Option<String>,
    status: String,
    payment_status: String,
    total_price: Option<Decimal>,
    currency: String,
    payment_due_date: Option<NaiveDate>,
    admin_notes: Option<String>,
    cancellation_reason: Option<String>,
    confirmed_by: Option<Uuid>,
    cancelled_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<RequestRow> for ItineraryRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(ItineraryRequest {
            id: row.id,
            user_id: row.user_id,
            itinerary_id: row.itinerary_id,
            guide_id: row.guide_id,
            start_date: row.start_date,
            end_date: row.end_date,
            group_size: row.group_size,
            additional_requests: row.additional_requests,
            contact: ContactDetails {
                name: row.contact_name,
                email: Masked::new(row.contact_email),
                phone: row.contact_phone.map(Masked::new),
            },
            status: parse(&row.status)?,
            payment_status: parse(&row.payment_status)?,
            total_price: row.total_price,
            currency: parse::<CurrencyCode>(&row.currency)?,
            payment_due_date: row.payment_due_date,
            admin_notes: row.admin_notes,
            cancellation_reason: row.cancellation_reason,
            confirmed_by: row.confirmed_by,
            cancelled_by: row.cancelled_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    request_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    actor_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StatusHistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(StatusHistoryEntry {
            id: row.id,
            request_id: row.request_id,
            from_status: row.from_status.as_deref().map(parse::<RequestStatus>).transpose()?,
            to_status: parse(&row.to_status)?,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    request_id: Uuid,
    recipient_id: Uuid,
    transition_status: String,
    title: String,
    message: String,
    kind: String,
    is_read: bool,
    sent_via_email: bool,
    email_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for CustomerNotification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(CustomerNotification {
            id: row.id,
            request_id: row.request_id,
            recipient_id: row.recipient_id,
            transition: parse(&row.transition_status)?,
            title: row.title,
            message: row.message,
            kind: parse(&row.kind)?,
            is_read: row.is_read,
            sent_via_email: row.sent_via_email,
            email_sent_at: row.email_sent_at,
            created_at: row.created_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str = "id, request_id, recipient_id, transition_status, title, message, \
    kind, is_read, sent_via_email, email_sent_at, created_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    request_id: Uuid,
    itinerary_id: Uuid,
    user_id: Uuid,
    guide_id: Option<Uuid>,
    participants: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_price: Decimal,
    currency: String,
    contact_name: String,
    contact_email: String,
    contact_phone: Option<String>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for DerivedBooking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(DerivedBooking {
            id: row.id,
            request_id: row.request_id,
            itinerary_id: row.itinerary_id,
            user_id: row.user_id,
            guide_id: row.guide_id,
            participants: row.participants,
            start_date: row.start_date,
            end_date: row.end_date,
            total_price: row.total_price,
            currency: parse::<CurrencyCode>(&row.currency)?,
            status: BookingStatus::Confirmed,
            contact_name: row.contact_name,
            contact_email: Masked::new(row.contact_email),
            contact_phone: row.contact_phone.map(Masked::new),
            special_requests: row.special_requests,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItineraryRow {
    id: Uuid,
    title: String,
    duration: String,
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert_request(&self, request: &ItineraryRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO itinerary_requests (
                id, user_id, itinerary_id, guide_id, start_date, end_date, group_size,
                additional_requests, contact_name, contact_email, contact_phone, status,
                payment_status, total_price, currency, payment_due_date, admin_notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.itinerary_id)
        .bind(request.guide_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(&request.group_size)
        .bind(&request.additional_requests)
        .bind(&request.contact.name)
        .bind(request.contact.email.expose())
        .bind(request.contact.phone.as_ref().map(|p| p.expose().clone()))
        .bind(request.status.as_str())
        .bind(request.payment_status.as_str())
        .bind(request.total_price)
        .bind(request.currency.as_str())
        .bind(request.payment_due_date)
        .bind(&request.admin_notes)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::debug!(request_id = %request.id, "Inserted itinerary request");
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ItineraryRequest>> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM itinerary_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(ItineraryRequest::try_from).transpose()
    }

    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ItineraryRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            SELECT {} FROM itinerary_requests
            WHERE ($1::text[] IS NULL OR status = ANY($1))
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        ))
        .bind(filter.status.map(status_forms))
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ItineraryRequest::try_from).collect()
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        update: &StatusUpdate,
    ) -> StoreResult<ItineraryRequest> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            UPDATE itinerary_requests
            SET status = $3, total_price = $4, currency = $5,
                payment_due_date = $6, admin_notes = $7, cancellation_reason = $8,
                confirmed_by = $9, cancelled_by = $10, confirmed_at = $11,
                cancelled_at = $12, updated_at = $13
            WHERE id = $1 AND status = ANY($2)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(status_forms(expected))
        .bind(update.status.as_str())
        .bind(update.total_price)
        .bind(update.currency.as_str())
        .bind(update.payment_due_date)
        .bind(&update.admin_notes)
        .bind(&update.cancellation_reason)
        .bind(update.confirmed_by)
        .bind(update.cancelled_by)
        .bind(update.confirmed_at)
        .bind(update.cancelled_at)
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.explain_miss(id, expected).await),
        }
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<ItineraryRequest> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            UPDATE itinerary_requests
            SET payment_status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(status_forms(expected))
        .bind(payment_status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.explain_miss(id, expected).await),
        }
    }

    async fn get_itinerary(&self, id: Uuid) -> StoreResult<Option<ItinerarySummary>> {
        let row = sqlx::query_as::<_, ItineraryRow>(
            "SELECT id, title, duration FROM itineraries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|r| ItinerarySummary {
            id: r.id,
            title: r.title,
            duration: r.duration,
        }))
    }

    async fn append_history(&self, entry: &StatusHistoryEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO request_status_history (id, request_id, from_status, to_status, actor_id, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.request_id)
        .bind(entry.from_status.map(|s| s.as_str()))
        .bind(entry.to_status.canonical().as_str())
        .bind(entry.actor_id)
        .bind(&entry.note)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_history(&self, request_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, request_id, from_status, to_status, actor_id, note, created_at
            FROM request_status_history
            WHERE request_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(StatusHistoryEntry::try_from).collect()
    }

    async fn insert_notification(&self, notification: &CustomerNotification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_notifications (
                id, request_id, recipient_id, transition_status, title, message, kind,
                is_read, sent_via_email, email_sent_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(notification.id)
        .bind(notification.request_id)
        .bind(notification.recipient_id)
        .bind(notification.transition.canonical().as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.is_read)
        .bind(notification.sent_via_email)
        .bind(notification.email_sent_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_notification(
        &self,
        request_id: Uuid,
        transition: RequestStatus,
    ) -> StoreResult<Option<CustomerNotification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM customer_notifications WHERE request_id = $1 AND transition_status = $2",
            NOTIFICATION_COLUMNS
        ))
        .bind(request_id)
        .bind(transition.canonical().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(CustomerNotification::try_from).transpose()
    }

    async fn get_notification(&self, id: Uuid) -> StoreResult<Option<CustomerNotification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM customer_notifications WHERE id = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(CustomerNotification::try_from).transpose()
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<CustomerNotification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {} FROM customer_notifications
            WHERE recipient_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(CustomerNotification::try_from).collect()
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE customer_notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("notification {}", id)));
        }
        Ok(())
    }

    async fn mark_notification_emailed(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE customer_notifications SET sent_via_email = TRUE, email_sent_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("notification {}", id)));
        }
        Ok(())
    }

    async fn insert_booking(&self, booking: &DerivedBooking) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO bookings (
                id, request_id, itinerary_id, user_id, guide_id, participants, start_date,
                end_date, total_price, currency, status, contact_name, contact_email,
                contact_phone, special_requests, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(booking.id)
        .bind(booking.request_id)
        .bind(booking.itinerary_id)
        .bind(booking.user_id)
        .bind(booking.guide_id)
        .bind(booking.participants)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.total_price)
        .bind(booking.currency.as_str())
        .bind(booking.status.as_str())
        .bind(&booking.contact_name)
        .bind(booking.contact_email.expose())
        .bind(booking.contact_phone.as_ref().map(|p| p.expose().clone()))
        .bind(&booking.special_requests)
        .bind(booking.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::debug!(request_id = %booking.request_id, booking_id = %id, "Inserted booking");
        Ok(id)
    }

    async fn find_booking_by_request(&self, request_id: Uuid) -> StoreResult<Option<DerivedBooking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, request_id, itinerary_id, user_id, guide_id, participants, start_date,
                   end_date, total_price, currency, contact_name, contact_email, contact_phone,
                   special_requests, created_at
            FROM bookings
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(DerivedBooking::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forms_include_legacy_alias() {
        assert_eq!(status_forms(RequestStatus::Confirmed), vec!["confirmed", "approved"]);
        assert_eq!(status_forms(RequestStatus::Approved), vec!["confirmed", "approved"]);
        assert_eq!(status_forms(RequestStatus::Pending), vec!["pending"]);
    }

    #[test]
    fn test_parse_reports_corrupt_values() {
        assert_eq!(parse::<RequestStatus>("approved").unwrap(), RequestStatus::Approved);
        assert!(matches!(
            parse::<RequestStatus>("archived"),
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(parse::<CurrencyCode>("US"), Err(StoreError::Backend(_))));
    }
}
