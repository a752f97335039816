use std::sync::Arc;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::info;
use stz_order_engine::{
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
    auto_confirm_worker::start_auto_confirm_worker,
    config::ServerConfig,
    errors::ServerError,
    integrations::{OpenTailor, PaystackGateway},
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

type Db = SqliteDatabase;
type Gw = PaystackGateway;
type Mp = OpenTailor;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let _sweeper = start_auto_confirm_worker(db.clone(), config.auto_confirm_interval);
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let gateway = PaystackGateway::new(config.paystack.clone())?;
    let measurements = OpenTailor::new(config.open_tailor.clone())?;
    let webhook_secret = WebhookSecret(config.paystack.secret_key.clone());
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
        let orders_api = OrderFlowApi::new(db.clone(), measurements.clone(), Arc::clone(&sink));
        let payments_api = PaymentsApi::new(db.clone(), gateway.clone(), Arc::clone(&sink));
        let returns_api = ReturnsApi::new(db.clone(), Arc::clone(&sink));
        let wallet_api = WalletApi::new(db.clone());
        let settings_api = SettingsApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        // More specific order routes are registered ahead of the catch-all action route.
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<Db, Mp>::new())
            .service(MyOrdersRoute::<Db, Mp>::new())
            .service(OrderHistoryRoute::<Db, Mp>::new())
            .service(OrderByNumberRoute::<Db, Mp>::new())
            .service(RequestReturnRoute::<Db>::new())
            .service(OrderActionRoute::<Db, Mp>::new())
            .service(MyReturnsRoute::<Db>::new())
            .service(ReturnByIdRoute::<Db>::new())
            .service(ReturnActionRoute::<Db>::new())
            .service(InitializePaymentRoute::<Db, Gw>::new())
            .service(VerifyPaymentRoute::<Db, Gw>::new())
            .service(WalletTransactionsRoute::<Db>::new())
            .service(WalletEarningsRoute::<Db>::new())
            .service(GetSettingRoute::<Db>::new())
            .service(PutSettingRoute::<Db>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("stz::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(returns_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(settings_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(webhook_secret.clone()))
            .service(health)
            .service(PaystackWebhookRoute::<Db, Gw>::new())
            .service(api_scope)
    })
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Server is running on {host}:{port}");
    Ok(srv)
}
