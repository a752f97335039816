use std::sync::Arc;

use stz_common::Money;
use stz_order_engine::{
    db_types::{Actor, LedgerEntryType, OrderStatus, PaymentStatus, Role},
    order_objects::CreateOrderRequest,
    test_utils::{
        fakes::{FakeGateway, FakeMeasurements, RecordingSink},
        fixtures::seed_marketplace,
        prepare_env::{prepare_test_env, random_db_path},
    },
    traits::GatewayChargeStatus,
    MarketplaceDatabase,
    OrderFlowApi,
    OrderFlowError,
    PaymentsApi,
    SqliteDatabase,
};

const CUSTOMER: Actor = Actor { id: 10, role: Role::Customer };

async fn setup() -> (SqliteDatabase, OrderFlowApi<SqliteDatabase, FakeMeasurements>, PaymentsApi<SqliteDatabase, FakeGateway>, FakeGateway) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    seed_marketplace(&db).await;
    let sink = Arc::new(RecordingSink::new());
    let gateway = FakeGateway::new();
    let orders = OrderFlowApi::new(db.clone(), FakeMeasurements::default(), sink.clone());
    let payments = PaymentsApi::new(db.clone(), gateway.clone(), sink);
    (db, orders, payments, gateway)
}

fn plain_request() -> CreateOrderRequest {
    CreateOrderRequest {
        design_id: 1,
        delivery_address_id: 1,
        fabric_option_id: None,
        add_on_ids: vec![],
        size_label: None,
        delivery_fee: Some(Money::from(1_500)),
        special_instructions: None,
    }
}

#[tokio::test]
async fn capture_moves_money_into_escrow() {
    let (db, orders, payments, _) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");
    assert!(init.authorization_url.contains(&init.reference));

    payments.handle_webhook_event("charge.success", &init.reference).await.expect("Error capturing");

    let order = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());
    let payment = db.fetch_payment_for_order(order.id).await.unwrap().expect("Payment missing");
    assert_eq!(payment.status, PaymentStatus::HeldInEscrow);
    assert_eq!(payment.amount, Money::from(29_500));

    // the customer's hold row
    let entries = db.fetch_ledger_entries(10).await.expect("Error fetching ledger");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::EscrowHold);
    assert_eq!(entries[0].amount, Money::from(29_500));

    // the designer's prospective earnings are pending escrow
    let summary = db.earnings_summary(20).await.expect("Error fetching summary");
    assert_eq!(summary.pending_escrow, Money::from(26_550));
    assert_eq!(summary.released, Money::from(0));
}

#[tokio::test]
async fn double_capture_is_idempotent() {
    let (db, orders, payments, _) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");

    payments.handle_webhook_event("charge.success", &init.reference).await.expect("Error capturing");
    // duplicate webhook delivery must be a no-op
    payments.handle_webhook_event("charge.success", &init.reference).await.expect("Error on replay");

    let entries = db.fetch_ledger_entries(10).await.expect("Error fetching ledger");
    assert_eq!(entries.len(), 1, "a replayed capture must not write a second hold row");
    let order = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(db.fetch_status_history(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_webhook_events_are_ignored() {
    let (_, orders, payments, _) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");
    payments.handle_webhook_event("subscription.create", &init.reference).await.expect("Unknown events must not fail");
    payments.handle_webhook_event("charge.failed", &init.reference).await.expect("Failed charges are only logged");
    let err = payments.handle_webhook_event("charge.success", "no-such-reference").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(_)), "got {err}");
}

#[tokio::test]
async fn verify_captures_a_successful_charge() {
    let (db, orders, payments, gateway) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");

    // the webhook never arrives; the customer hits verify instead
    gateway.set_charge(GatewayChargeStatus::Success, Money::from(29_500));
    let result = payments.verify(&init.reference).await.expect("Error verifying");
    assert_eq!(result.gateway_status, "success");
    assert_eq!(result.order_status, OrderStatus::Paid);
    assert!(result.paid_at.is_some());

    let payment = db.fetch_payment_by_reference(&init.reference).await.unwrap().expect("Payment missing");
    assert_eq!(payment.status, PaymentStatus::HeldInEscrow);
}

#[tokio::test]
async fn verify_of_a_pending_charge_changes_nothing() {
    let (db, orders, payments, gateway) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");

    gateway.set_charge(GatewayChargeStatus::Abandoned, Money::from(0));
    let result = payments.verify(&init.reference).await.expect("Error verifying");
    assert_eq!(result.gateway_status, "abandoned");
    assert_eq!(result.order_status, OrderStatus::PendingPayment);
    let payment = db.fetch_payment_by_reference(&init.reference).await.unwrap().expect("Payment missing");
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn initialize_guards() {
    let (_, orders, payments, gateway) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");

    // only the ordering customer may pay
    let stranger = Actor::new(11, Role::Customer);
    let err = payments.initialize(&stranger, &order.order_number).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)), "got {err}");

    // a paid order cannot be re-initialized
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");
    payments.handle_webhook_event("charge.success", &init.reference).await.expect("Error capturing");
    let err = payments.initialize(&CUSTOMER, &order.order_number).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::PreconditionFailed(_)), "got {err}");

    // a gateway outage is a retryable upstream failure
    let order2 = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    gateway.set_unavailable(true);
    let err = payments.initialize(&CUSTOMER, &order2.order_number).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::ExternalUnavailable(_)), "got {err}");
}

#[tokio::test]
async fn reinitialize_captures_a_charge_completed_offline() {
    let (db, orders, payments, gateway) = setup().await;
    let order = orders.create_order(&CUSTOMER, plain_request()).await.expect("Error creating order");
    let init = payments.initialize(&CUSTOMER, &order.order_number).await.expect("Error initializing");

    // the customer completed checkout but the webhook was lost; re-initializing finds the charge
    gateway.set_charge(GatewayChargeStatus::Success, Money::from(29_500));
    let err = payments.initialize(&CUSTOMER, &order.order_number).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Conflict(_)), "got {err}");
    let payment = db.fetch_payment_by_reference(&init.reference).await.unwrap().expect("Payment missing");
    assert_eq!(payment.status, PaymentStatus::HeldInEscrow);
}
