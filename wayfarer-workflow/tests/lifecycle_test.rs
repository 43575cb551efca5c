use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wayfarer_catalog::{PricingCalculator, PricingConfig};
use wayfarer_core::{
    Actor, ContactDetails, InMemoryRequestStore, ItineraryRequest, ItinerarySummary,
    NewItineraryRequest, RequestStatus, RequestStore, StatusUpdate,
};
use wayfarer_shared::Masked;
use wayfarer_workflow::{ConfirmPayload, EngineConfig, WorkflowEngine, WorkflowError};

struct Harness {
    store: InMemoryRequestStore,
    engine: Arc<WorkflowEngine>,
    admin: Actor,
    customer: Actor,
    itinerary_id: Uuid,
}

async fn harness() -> Harness {
    let store = InMemoryRequestStore::new();
    let itinerary_id = Uuid::new_v4();
    store
        .add_itinerary(ItinerarySummary {
            id: itinerary_id,
            title: "Coastal Walk".to_string(),
            duration: "4 days".to_string(),
        })
        .await;

    let pricing = PricingCalculator::new(PricingConfig::default()).unwrap();
    let engine = WorkflowEngine::new(Arc::new(store.clone()), pricing, EngineConfig::default());

    Harness {
        store,
        engine: Arc::new(engine),
        admin: Actor::admin(Uuid::new_v4()),
        customer: Actor::customer(Uuid::new_v4()),
        itinerary_id,
    }
}

fn trip(itinerary_id: Uuid, group_size: &str) -> NewItineraryRequest {
    NewItineraryRequest {
        itinerary_id,
        guide_id: Some(Uuid::new_v4()),
        start_date: NaiveDate::from_ymd_opt(2027, 9, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2027, 9, 4).unwrap(),
        group_size: group_size.to_string(),
        additional_requests: Some("Late check-in".to_string()),
        contact: ContactDetails {
            name: "Ari".to_string(),
            email: Masked::new("ari@example.com".to_string()),
            phone: None,
        },
    }
}

fn terms(price: Option<rust_decimal::Decimal>) -> ConfirmPayload {
    ConfirmPayload {
        total_price: price,
        payment_due_date: NaiveDate::from_ymd_opt(2027, 8, 1).unwrap(),
        admin_notes: Some("Deposit due on booking".to_string()),
    }
}

async fn submitted(h: &Harness) -> ItineraryRequest {
    h.engine.submit(&h.customer, trip(h.itinerary_id, "2 travelers")).await.unwrap()
}

#[tokio::test]
async fn test_full_lifecycle_to_completion() {
    let h = harness().await;
    let request = submitted(&h).await;

    h.engine.start_processing(request.id, &h.admin).await.unwrap();
    let confirmed = h
        .engine
        .confirm_with_price(request.id, &h.admin, terms(None))
        .await
        .unwrap();
    // 4 days * 2 * 150 + 4 days * 50
    assert_eq!(confirmed.total_price, Some(dec!(1400)));
    assert_eq!(confirmed.admin_notes.as_deref(), Some("Deposit due on booking"));

    let completed = h.engine.complete(request.id, &h.admin).await.unwrap();
    assert_eq!(completed.status, RequestStatus::Completed);

    let history = h.engine.list_history(&h.customer, request.id).await.unwrap();
    let path: Vec<_> = history.iter().rev().map(|e| e.to_status).collect();
    assert_eq!(
        path,
        vec![
            RequestStatus::Pending,
            RequestStatus::Processing,
            RequestStatus::Confirmed,
            RequestStatus::Completed,
        ]
    );
    // Each entry picks up where the previous one left off.
    for pair in history.windows(2) {
        assert_eq!(pair[0].from_status, Some(pair[1].to_status));
    }

    let notifications = h
        .engine
        .list_notifications(&h.customer, h.customer.id, false)
        .await
        .unwrap();
    let mut transitions: Vec<_> = notifications.iter().map(|n| n.transition).collect();
    transitions.sort_by_key(|s| s.as_str());
    assert_eq!(transitions, vec![RequestStatus::Completed, RequestStatus::Confirmed]);

    let booking = h.store.find_booking_by_request(request.id).await.unwrap().unwrap();
    assert_eq!(booking.participants, 2);
    assert_eq!(booking.total_price, dec!(1400));
    assert_eq!(booking.special_requests.as_deref(), Some("Late check-in"));
}

#[tokio::test]
async fn test_terminal_request_accepts_nothing() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine
        .reject(request.id, &h.admin, Some("No guides available".to_string()))
        .await
        .unwrap();

    let result = h.engine.start_processing(request.id, &h.admin).await;
    assert!(matches!(result, Err(WorkflowError::Validation(_))));
    let result = h.engine.cancel(request.id, &h.admin, None).await;
    assert!(matches!(result, Err(WorkflowError::Validation(_))));
}

#[tokio::test]
async fn test_confirm_from_pending_writes_nothing() {
    let h = harness().await;
    let request = submitted(&h).await;

    let result = h
        .engine
        .confirm_with_price(request.id, &h.admin, terms(Some(dec!(900))))
        .await;
    assert!(matches!(result, Err(WorkflowError::Validation(_))));

    let current = h.store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(current.status, RequestStatus::Pending);
    assert_eq!(current.total_price, None);
    assert_eq!(h.store.booking_count().await, 0);
    assert_eq!(h.store.notification_count(request.id).await, 0);
    assert_eq!(h.engine.list_history(&h.admin, request.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_customer_cannot_cancel_someone_elses_request() {
    let h = harness().await;
    let request = submitted(&h).await;
    let stranger = Actor::customer(Uuid::new_v4());

    let result = h
        .engine
        .cancel(request.id, &stranger, Some("Not mine".to_string()))
        .await;
    assert!(matches!(result, Err(WorkflowError::Authorization(_))));

    let current = h.store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(current.status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_customer_cancels_confirmed_trip() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine.start_processing(request.id, &h.admin).await.unwrap();
    h.engine
        .confirm_with_price(request.id, &h.admin, terms(Some(dec!(1200))))
        .await
        .unwrap();

    let cancelled = h
        .engine
        .cancel(request.id, &h.customer, Some("Family emergency".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(h.customer.id));

    // Repeating the same cancel is a no-op.
    let again = h
        .engine
        .cancel(request.id, &h.customer, Some("Family emergency".to_string()))
        .await
        .unwrap();
    assert_eq!(again.updated_at, cancelled.updated_at);
    assert_eq!(h.engine.list_history(&h.admin, request.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_concurrent_confirms_book_once() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine.start_processing(request.id, &h.admin).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        let admin = h.admin;
        let id = request.id;
        handles.push(tokio::spawn(async move {
            engine
                .confirm_with_price(id, &admin, terms(Some(dec!(1500))))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        let confirmed = result.unwrap();
        assert_eq!(confirmed.status, RequestStatus::Confirmed);
    }

    assert_eq!(h.store.booking_count().await, 1);
    assert_eq!(h.store.notification_count(request.id).await, 1);
    let confirmations = h
        .engine
        .list_history(&h.admin, request.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.to_status == RequestStatus::Confirmed)
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_racing_reject_and_confirm_have_one_winner() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine.start_processing(request.id, &h.admin).await.unwrap();

    let confirm = {
        let engine = h.engine.clone();
        let admin = h.admin;
        let id = request.id;
        tokio::spawn(async move { engine.confirm_with_price(id, &admin, terms(Some(dec!(1500)))).await })
    };
    let reject = {
        let engine = h.engine.clone();
        let admin = h.admin;
        let id = request.id;
        tokio::spawn(async move { engine.reject(id, &admin, None).await })
    };

    let confirm = confirm.await.unwrap();
    let reject = reject.await.unwrap();
    assert_ne!(confirm.is_ok(), reject.is_ok());

    let current = h.store.get_request(request.id).await.unwrap().unwrap();
    let history = h.engine.list_history(&h.admin, request.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].to_status, current.status);
    if current.status == RequestStatus::Rejected {
        assert_eq!(h.store.booking_count().await, 0);
    } else {
        assert_eq!(h.store.booking_count().await, 1);
    }
}

#[tokio::test]
async fn test_legacy_approved_reads_as_confirmed() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine.start_processing(request.id, &h.admin).await.unwrap();

    // Rows written by older deployments carry `approved`.
    let current = h.store.get_request(request.id).await.unwrap().unwrap();
    let mut legacy = StatusUpdate::from_request(&current);
    legacy.status = RequestStatus::Approved;
    legacy.total_price = Some(dec!(1000));
    h.store
        .update_request_status(request.id, RequestStatus::Processing, &legacy)
        .await
        .unwrap();

    let completed = h.engine.complete(request.id, &h.admin).await.unwrap();
    assert_eq!(completed.status, RequestStatus::Completed);

    let history = h.engine.list_history(&h.admin, request.id).await.unwrap();
    assert_eq!(history[0].from_status, Some(RequestStatus::Approved));
}

#[tokio::test]
async fn test_mark_read_twice_is_noop() {
    let h = harness().await;
    let request = submitted(&h).await;
    h.engine.cancel(request.id, &h.admin, None).await.unwrap();

    let notification = h
        .engine
        .list_notifications(&h.customer, h.customer.id, true)
        .await
        .unwrap()
        .pop()
        .unwrap();

    h.engine.mark_notification_read(&h.customer, notification.id).await.unwrap();
    h.engine.mark_notification_read(&h.customer, notification.id).await.unwrap();

    let stored = h.store.get_notification(notification.id).await.unwrap().unwrap();
    assert!(stored.is_read);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let h = harness().await;
    let request = submitted(&h).await;

    let pricing = PricingCalculator::new(PricingConfig::default()).unwrap();
    let impatient = WorkflowEngine::new(
        Arc::new(h.store.clone()),
        pricing,
        EngineConfig {
            store_timeout: Duration::from_millis(20),
            read_retries: 1,
            email_notifications: false,
        },
    );
    h.store.set_latency(Some(Duration::from_millis(200)));

    let result = impatient.get_request(&h.admin, request.id).await;
    assert!(matches!(result, Err(WorkflowError::Persistence(_))));
}
