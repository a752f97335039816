use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use paystack_client::signature_for;
use serde_json::{json, Value};
use stz_common::Secret;
use stz_order_engine::{
    db_types::{Actor, Role},
    test_utils::{
        fakes::{FakeGateway, FakeMeasurements},
        fixtures::seed_marketplace,
        prepare_env::{prepare_test_env, random_db_path},
    },
    traits::{LogSink, NotificationSink},
    OrderFlowApi,
    PaymentsApi,
    ReturnsApi,
    SettingsApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    auth::TokenIssuer,
    config::AuthConfig,
    routes::{
        health,
        CreateOrderRoute,
        GetSettingRoute,
        InitializePaymentRoute,
        MyOrdersRoute,
        MyReturnsRoute,
        OrderActionRoute,
        OrderByNumberRoute,
        OrderHistoryRoute,
        PaystackWebhookRoute,
        PutSettingRoute,
        RequestReturnRoute,
        ReturnActionRoute,
        ReturnByIdRoute,
        VerifyPaymentRoute,
        WalletEarningsRoute,
        WalletTransactionsRoute,
        WebhookSecret,
    },
};

const WEBHOOK_SECRET: &str = "sk_test_very_secret";

fn issuer() -> TokenIssuer {
    let config = AuthConfig {
        jwt_secret: Secret::new("an endpoint test signing secret!!".to_string()),
        token_validity: chrono::Duration::hours(1),
    };
    TokenIssuer::new(&config)
}

fn token(id: i64, role: Role) -> String {
    issuer().issue_token(&Actor { id, role }).unwrap()
}

fn configure(db: SqliteDatabase, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
        let orders_api = OrderFlowApi::new(db.clone(), FakeMeasurements::default(), Arc::clone(&sink));
        let payments_api = PaymentsApi::new(db.clone(), gateway.clone(), Arc::clone(&sink));
        let returns_api = ReturnsApi::new(db.clone(), Arc::clone(&sink));
        let wallet_api = WalletApi::new(db.clone());
        let settings_api = SettingsApi::new(db.clone());
        cfg.app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(returns_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(settings_api))
            .app_data(web::Data::new(issuer()))
            .app_data(web::Data::new(WebhookSecret(Secret::new(WEBHOOK_SECRET.to_string()))))
            .service(CreateOrderRoute::<SqliteDatabase, FakeMeasurements>::new())
            .service(MyOrdersRoute::<SqliteDatabase, FakeMeasurements>::new())
            .service(OrderHistoryRoute::<SqliteDatabase, FakeMeasurements>::new())
            .service(OrderByNumberRoute::<SqliteDatabase, FakeMeasurements>::new())
            .service(RequestReturnRoute::<SqliteDatabase>::new())
            .service(OrderActionRoute::<SqliteDatabase, FakeMeasurements>::new())
            .service(MyReturnsRoute::<SqliteDatabase>::new())
            .service(ReturnByIdRoute::<SqliteDatabase>::new())
            .service(ReturnActionRoute::<SqliteDatabase>::new())
            .service(InitializePaymentRoute::<SqliteDatabase, FakeGateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, FakeGateway>::new())
            .service(WalletTransactionsRoute::<SqliteDatabase>::new())
            .service(WalletEarningsRoute::<SqliteDatabase>::new())
            .service(GetSettingRoute::<SqliteDatabase>::new())
            .service(PutSettingRoute::<SqliteDatabase>::new())
            .service(PaystackWebhookRoute::<SqliteDatabase, FakeGateway>::new());
    }
}

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let res = test::call_service(&app, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = test::read_body(res).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn orders_require_a_token() {
    let db = prepare_test_env(&random_db_path()).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;
    let res = test::call_service(&app, TestRequest::get().uri("/orders").to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("No access token"), "was: {body}");
}

#[actix_web::test]
async fn garbage_tokens_are_rejected() {
    let db = prepare_test_env(&random_db_path()).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;
    let req = TestRequest::get()
        .uri("/orders")
        .insert_header(("Authorization", "Bearer not.a.jwt"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn create_and_fetch_an_order() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_marketplace(&db).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;

    let req = TestRequest::post()
        .uri("/orders")
        .insert_header(("Authorization", format!("Bearer {}", token(10, Role::Customer))))
        .set_json(json!({ "design_id": 1, "delivery_address_id": 1 }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = test::read_body_json(res).await;
    assert_eq!(order["status"], "PENDING_PAYMENT");
    let number = order["order_number"].as_str().unwrap().to_string();

    // The designer on the order can see it
    let req = TestRequest::get()
        .uri(&format!("/orders/{number}"))
        .insert_header(("Authorization", format!("Bearer {}", token(20, Role::Designer))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // A different customer cannot
    let req = TestRequest::get()
        .uri(&format!("/orders/{number}"))
        .insert_header(("Authorization", format!("Bearer {}", token(99, Role::Customer))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unknown_order_actions_are_a_bad_request() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_marketplace(&db).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/orders/STZ-20260101-XXXX/vaporize")
        .insert_header(("Authorization", format!("Bearer {}", token(10, Role::Customer))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_is_gated_on_the_signature() {
    let db = prepare_test_env(&random_db_path()).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;
    let body = json!({ "event": "charge.dispute.create", "data": {} }).to_string();

    let req = TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("x-paystack-signature", "deadbeef"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.clone())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let signature = signature_for(WEBHOOK_SECRET, body.as_bytes());
    let req = TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("x-paystack-signature", signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn webhook_failures_still_get_a_200() {
    let db = prepare_test_env(&random_db_path()).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;
    // A success event for a reference we have never seen
    let body = json!({ "event": "charge.success", "data": { "reference": "missing-ref" } }).to_string();
    let signature = signature_for(WEBHOOK_SECRET, body.as_bytes());
    let req = TestRequest::post()
        .uri("/webhooks/paystack")
        .insert_header(("x-paystack-signature", signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn settings_are_admin_only() {
    let db = prepare_test_env(&random_db_path()).await;
    let app = test::init_service(App::new().configure(configure(db, FakeGateway::new()))).await;

    let req = TestRequest::get()
        .uri("/settings/commission_percentage")
        .insert_header(("Authorization", format!("Bearer {}", token(10, Role::Customer))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = TestRequest::get()
        .uri("/settings/commission_percentage")
        .insert_header(("Authorization", format!("Bearer {}", token(1, Role::Admin))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["value"], "10");

    let req = TestRequest::put()
        .uri("/settings/commission_percentage")
        .insert_header(("Authorization", format!("Bearer {}", token(1, Role::Admin))))
        .set_json(json!({ "value": "12.5" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}
