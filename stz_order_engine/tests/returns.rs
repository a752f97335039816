use std::sync::Arc;

use chrono::{Duration, Utc};
use stz_common::Money;
use stz_order_engine::{
    db_types::{Actor, LedgerEntryType, OrderNumber, OrderStatus, PaymentStatus, ReturnStatus, Role},
    order_objects::CreateOrderRequest,
    state_machine::OrderEvent,
    test_utils::{
        fakes::{FakeGateway, FakeMeasurements, RecordingSink},
        fixtures::seed_marketplace,
        prepare_env::{prepare_test_env, random_db_path},
    },
    MarketplaceDatabase,
    OrderFlowApi,
    OrderFlowError,
    PaymentsApi,
    ReturnsApi,
    SqliteDatabase,
};

const CUSTOMER: Actor = Actor { id: 10, role: Role::Customer };
const DESIGNER: Actor = Actor { id: 20, role: Role::Designer };
const ADMIN: Actor = Actor { id: 1, role: Role::Admin };

struct Harness {
    db: SqliteDatabase,
    orders: OrderFlowApi<SqliteDatabase, FakeMeasurements>,
    payments: PaymentsApi<SqliteDatabase, FakeGateway>,
    returns: ReturnsApi<SqliteDatabase>,
}

async fn setup() -> Harness {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    seed_marketplace(&db).await;
    let sink = Arc::new(RecordingSink::new());
    let orders = OrderFlowApi::new(db.clone(), FakeMeasurements::default(), sink.clone());
    let payments = PaymentsApi::new(db.clone(), FakeGateway::new(), sink.clone());
    let returns = ReturnsApi::new(db.clone(), sink);
    Harness { db, orders, payments, returns }
}

/// Creates an order and walks it to DELIVERED.
async fn delivered_order(h: &Harness) -> OrderNumber {
    let request = CreateOrderRequest {
        design_id: 1,
        delivery_address_id: 1,
        fabric_option_id: None,
        add_on_ids: vec![],
        size_label: None,
        delivery_fee: Some(Money::from(1_500)),
        special_instructions: None,
    };
    let order = h.orders.create_order(&CUSTOMER, request).await.expect("Error creating order");
    let number = order.order_number.clone();
    let init = h.payments.initialize(&CUSTOMER, &number).await.expect("Error initializing");
    h.payments.handle_webhook_event("charge.success", &init.reference).await.expect("Error capturing");
    for (event, actor) in [
        (OrderEvent::Accept, &DESIGNER),
        (OrderEvent::StartWork, &DESIGNER),
        (OrderEvent::MarkReady, &DESIGNER),
        (OrderEvent::MarkPickedUp, &ADMIN),
        (OrderEvent::MarkInTransit, &ADMIN),
        (OrderEvent::MarkDelivered, &ADMIN),
    ] {
        h.orders.transition(&number, event, actor, None).await.unwrap_or_else(|e| panic!("{event} failed: {e}"));
    }
    number
}

/// Rewrites the order's delivery timestamp, as if it had been delivered `ago` in the past.
async fn backdate_delivery(db: &SqliteDatabase, number: &OrderNumber, ago: Duration) {
    sqlx::query("UPDATE orders SET delivered_at = $1 WHERE order_number = $2")
        .bind(Utc::now() - ago)
        .bind(number)
        .execute(db.pool())
        .await
        .expect("Error backdating delivery");
}

#[tokio::test]
async fn request_return_from_delivered() {
    let h = setup().await;
    let number = delivered_order(&h).await;
    let request = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Error requesting return");
    assert_eq!(request.status, ReturnStatus::Pending);
    assert_eq!(request.reason, "Wrong size");
    let order = h.db.fetch_order_by_number(&number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::ReturnRequested);

    // at most one request per order
    let err = h.returns.request_return(&CUSTOMER, &number, "Changed my mind").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Conflict(_)), "got {err}");
}

#[tokio::test]
async fn return_window_boundary() {
    let h = setup().await;

    // just inside the two-day window
    let number = delivered_order(&h).await;
    backdate_delivery(&h.db, &number, Duration::days(2) - Duration::minutes(5)).await;
    h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Just inside the window must succeed");

    // just outside it
    let number = delivered_order(&h).await;
    backdate_delivery(&h.db, &number, Duration::days(2) + Duration::minutes(5)).await;
    let err = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");
    let order = h.db.fetch_order_by_number(&number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered, "a rejected request must not move the order");
}

#[tokio::test]
async fn request_return_guards() {
    let h = setup().await;
    let number = delivered_order(&h).await;

    let err = h.returns.request_return(&CUSTOMER, &number, "  ").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");

    let stranger = Actor::new(11, Role::Customer);
    let err = h.returns.request_return(&stranger, &number, "Wrong size").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)), "got {err}");

    let err = h.returns.request_return(&DESIGNER, &number, "Wrong size").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)), "got {err}");
}

#[tokio::test]
async fn rejected_return_reverts_to_delivered() {
    let h = setup().await;
    let number = delivered_order(&h).await;
    let request = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Error requesting return");

    // only admins drive the workflow
    let err = h.returns.reject(&CUSTOMER, request.id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)), "got {err}");

    let rejected = h.returns.reject(&ADMIN, request.id, Some("No defect found".to_string())).await.unwrap();
    assert_eq!(rejected.status, ReturnStatus::Rejected);
    assert_eq!(rejected.admin_notes.as_deref(), Some("No defect found"));
    assert!(rejected.resolved_at.is_some());

    let order = h.db.fetch_order_by_number(&number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    // the escrow is untouched
    let payment = h.db.fetch_payment_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::HeldInEscrow);
}

#[tokio::test]
async fn completed_return_refunds_escrow() {
    let h = setup().await;
    let number = delivered_order(&h).await;
    let request = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Error requesting return");

    let approved = h.returns.approve(&ADMIN, request.id, None).await.expect("Error approving");
    assert_eq!(approved.status, ReturnStatus::Approved);

    let dispatched = h.returns.dispatch_pickup(&ADMIN, request.id, None).await.expect("Error dispatching");
    assert_eq!(dispatched.status, ReturnStatus::PickupDispatched);
    let order = h.db.fetch_order_by_number(&number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::ReturnPickup);

    let completed = h.returns.complete(&ADMIN, request.id, None).await.expect("Error completing");
    assert_eq!(completed.status, ReturnStatus::Returned);
    assert_eq!(completed.courier_fee, Some(Money::from(250_000)));

    let order = h.db.fetch_order_by_number(&number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Returned);
    assert!(order.returned_at.is_some());
    let payment = h.db.fetch_payment_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);

    // customer: hold at capture time, then the refund
    let customer_entries = h.db.fetch_ledger_entries(10).await.unwrap();
    let refund = customer_entries.iter().find(|e| e.entry_type == LedgerEntryType::Refund).expect("No refund row");
    assert_eq!(refund.amount, Money::from(29_500));

    // designer: the courier fee and no release
    let designer_entries = h.db.fetch_ledger_entries(20).await.unwrap();
    assert_eq!(designer_entries.len(), 1);
    assert_eq!(designer_entries[0].entry_type, LedgerEntryType::ReturnFeeDeduction);
    assert_eq!(designer_entries[0].amount, Money::from(250_000));

    let summary = h.db.earnings_summary(20).await.unwrap();
    assert_eq!(summary.released, Money::from(0));
    assert_eq!(summary.return_fees_deducted, Money::from(250_000));
    assert_eq!(summary.net_earnings, Money::from(-250_000));
}

#[tokio::test]
async fn workflow_order_is_enforced() {
    let h = setup().await;
    let number = delivered_order(&h).await;
    let request = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Error requesting return");

    // cannot dispatch or complete a request that was never approved
    let err = h.returns.dispatch_pickup(&ADMIN, request.id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");
    let err = h.returns.complete(&ADMIN, request.id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");

    // cannot approve twice
    h.returns.approve(&ADMIN, request.id, None).await.expect("Error approving");
    let err = h.returns.approve(&ADMIN, request.id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");
}

#[tokio::test]
async fn listing_is_role_pinned() {
    let h = setup().await;
    let number = delivered_order(&h).await;
    let request = h.returns.request_return(&CUSTOMER, &number, "Wrong size").await.expect("Error requesting return");

    let all = h.returns.search(&ADMIN, Default::default()).await.unwrap();
    assert_eq!(all.len(), 1);
    let own = h.returns.search(&CUSTOMER, Default::default()).await.unwrap();
    assert_eq!(own.len(), 1);
    let stranger = Actor::new(11, Role::Customer);
    assert!(h.returns.search(&stranger, Default::default()).await.unwrap().is_empty());

    let (fetched, order) = h.returns.request_for_actor(&CUSTOMER, request.id).await.unwrap();
    assert_eq!(fetched.id, request.id);
    assert_eq!(order.order_number, number);
    let err = h.returns.request_for_actor(&stranger, request.id).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)), "got {err}");
}
