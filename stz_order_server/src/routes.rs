//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the engine's ports so that endpoint tests can run them against
//! fakes. Since actix cannot register generic handlers with its attribute macros, each route is
//! declared with the [`route!`] macro instead, which emits a unit struct implementing
//! `HttpServiceFactory` for the handler.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use paystack_client::{verify_webhook_signature, WebhookEvent};
use serde_json::json;
use stz_common::Secret;
use stz_order_engine::{
    db_types::OrderNumber,
    order_objects::CreateOrderRequest,
    state_machine::OrderEvent,
    traits::{MarketplaceDatabase, MeasurementProvider, PaymentGateway},
    OrderFlowApi,
    PaymentsApi,
    ReturnsApi,
    SettingsApi,
    WalletApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        InitializePaymentRequest,
        JsonResponse,
        NewReturnRequest,
        OrderSearchQuery,
        ReturnActionRequest,
        ReturnSearchQuery,
        SettingResponse,
        SettingUpdateRequest,
        TransitionRequest,
        WalletQuery,
    },
    errors::ServerError,
};

/// The Paystack secret used to check webhook signatures. Registered as app data so the webhook
/// handler can reach it.
#[derive(Clone)]
pub struct WebhookSecret(pub Secret<String>);

#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl MarketplaceDatabase, MeasurementProvider);
/// Route handler for order creation.
///
/// Customers submit a design, address and their fabric/add-on/size selections. The engine
/// validates the selections, prices the order and snapshots the customer's measurements, and the
/// order comes back in `PENDING_PAYMENT`, ready for payment initialization.
pub async fn create_order<TB, TM>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<TB, TM>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TM: MeasurementProvider,
{
    let actor = claims.actor();
    debug!("💻️ POST create order for user {}", actor.id);
    let order = api.create_order(&actor, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders" impl MarketplaceDatabase, MeasurementProvider);
/// Route handler for the order list.
///
/// Customers and designers see their own orders; admins see everything and may additionally
/// filter by `customer_id` or `designer_id`.
pub async fn my_orders<TB, TM>(
    claims: JwtClaims,
    query: web::Query<OrderSearchQuery>,
    api: web::Data<OrderFlowApi<TB, TM>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TM: MeasurementProvider,
{
    let actor = claims.actor();
    debug!("💻️ GET orders for {}", actor.label());
    let result = api.search(&actor, query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(order_by_number => Get "/orders/{order_no}" impl MarketplaceDatabase, MeasurementProvider);
pub async fn order_by_number<TB, TM>(
    claims: JwtClaims,
    path: web::Path<OrderNumber>,
    api: web::Data<OrderFlowApi<TB, TM>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TM: MeasurementProvider,
{
    let number = path.into_inner();
    debug!("💻️ GET order {number}");
    let order = api.order_for_actor(&claims.actor(), &number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_history => Get "/orders/{order_no}/history" impl MarketplaceDatabase, MeasurementProvider);
pub async fn order_history<TB, TM>(
    claims: JwtClaims,
    path: web::Path<OrderNumber>,
    api: web::Data<OrderFlowApi<TB, TM>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TM: MeasurementProvider,
{
    let number = path.into_inner();
    debug!("💻️ GET history for order {number}");
    let history = api.history_for_actor(&claims.actor(), &number).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(order_action => Post "/orders/{order_no}/{action}" impl MarketplaceDatabase, MeasurementProvider);
/// Route handler for lifecycle transitions.
///
/// The action segment names the transition: `accept`, `reject`, `start`, `ready`, `picked-up`,
/// `in-transit`, `delivered`, `confirm` or `cancel`. Who may fire which transition, and from
/// which status, is enforced by the engine. Payment capture, auto-confirmation and the return
/// workflow are deliberately not reachable here.
pub async fn order_action<TB, TM>(
    claims: JwtClaims,
    path: web::Path<(OrderNumber, String)>,
    body: Option<web::Json<TransitionRequest>>,
    api: web::Data<OrderFlowApi<TB, TM>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TM: MeasurementProvider,
{
    let (number, action) = path.into_inner();
    let event = order_event_from_action(&action)
        .ok_or_else(|| ServerError::InvalidRequestPath(format!("'{action}' is not a valid order action")))?;
    let note = body.and_then(|b| b.into_inner().note);
    debug!("💻️ POST {event} on order {number}");
    let order = api.transition(&number, event, &claims.actor(), note).await?;
    Ok(HttpResponse::Ok().json(order))
}

fn order_event_from_action(action: &str) -> Option<OrderEvent> {
    let event = match action {
        "accept" => OrderEvent::Accept,
        "reject" => OrderEvent::Reject,
        "start" => OrderEvent::StartWork,
        "ready" => OrderEvent::MarkReady,
        "picked-up" => OrderEvent::MarkPickedUp,
        "in-transit" => OrderEvent::MarkInTransit,
        "delivered" => OrderEvent::MarkDelivered,
        "confirm" => OrderEvent::Confirm,
        "cancel" => OrderEvent::Cancel,
        _ => return None,
    };
    Some(event)
}

//----------------------------------------------   Returns  ----------------------------------------------------

route!(request_return => Post "/orders/{order_no}/returns" impl MarketplaceDatabase);
pub async fn request_return<TB>(
    claims: JwtClaims,
    path: web::Path<OrderNumber>,
    body: web::Json<NewReturnRequest>,
    api: web::Data<ReturnsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let number = path.into_inner();
    debug!("💻️ POST return request for order {number}");
    let request = api.request_return(&claims.actor(), &number, &body.reason).await?;
    Ok(HttpResponse::Created().json(request))
}

route!(my_returns => Get "/returns" impl MarketplaceDatabase);
pub async fn my_returns<TB>(
    claims: JwtClaims,
    query: web::Query<ReturnSearchQuery>,
    api: web::Data<ReturnsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let actor = claims.actor();
    debug!("💻️ GET returns for {}", actor.label());
    let requests = api.search(&actor, query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(requests))
}

route!(return_by_id => Get "/returns/{id}" impl MarketplaceDatabase);
pub async fn return_by_id<TB>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ReturnsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let id = path.into_inner();
    debug!("💻️ GET return request {id}");
    let (request, order) = api.request_for_actor(&claims.actor(), id).await?;
    Ok(HttpResponse::Ok().json(json!({ "return_request": request, "order": order })))
}

route!(return_action => Post "/returns/{id}/{action}" impl MarketplaceDatabase);
/// Route handler for the return workflow: `approve`, `reject`, `dispatch` and `complete`.
/// All four are admin actions; `complete` refunds the escrow and deducts the courier fee.
pub async fn return_action<TB>(
    claims: JwtClaims,
    path: web::Path<(i64, String)>,
    body: Option<web::Json<ReturnActionRequest>>,
    api: web::Data<ReturnsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let (id, action) = path.into_inner();
    let actor = claims.actor();
    let notes = body.and_then(|b| b.into_inner().notes);
    debug!("💻️ POST {action} on return request {id}");
    let request = match action.as_str() {
        "approve" => api.approve(&actor, id, notes).await?,
        "reject" => api.reject(&actor, id, notes).await?,
        "dispatch" => api.dispatch_pickup(&actor, id, notes).await?,
        "complete" => api.complete(&actor, id, notes).await?,
        other => {
            return Err(ServerError::InvalidRequestPath(format!("'{other}' is not a valid return action")));
        },
    };
    Ok(HttpResponse::Ok().json(request))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(initialize_payment => Post "/payments/initialize" impl MarketplaceDatabase, PaymentGateway);
/// Route handler for payment initialization.
///
/// Returns the Paystack authorization URL the customer must be sent to. Re-initializing an
/// unpaid order issues a fresh reference; if the previous reference turns out to have been paid
/// in the meantime, the payment is captured and a 409 is returned instead.
pub async fn initialize_payment<TB, TG>(
    claims: JwtClaims,
    body: web::Json<InitializePaymentRequest>,
    api: web::Data<PaymentsApi<TB, TG>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TG: PaymentGateway,
{
    let number = body.into_inner().order_number;
    debug!("💻️ POST initialize payment for order {number}");
    let result = api.initialize(&claims.actor(), &number).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(verify_payment => Get "/payments/verify/{reference}" impl MarketplaceDatabase, PaymentGateway);
/// Route handler for the payment verification callback. Queries Paystack for the charge status
/// and captures the payment if it succeeded, so the redirect back from the checkout page settles
/// the order even when the webhook is delayed.
pub async fn verify_payment<TB, TG>(
    _claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<PaymentsApi<TB, TG>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
    TG: PaymentGateway,
{
    let reference = path.into_inner();
    debug!("💻️ GET verify payment {reference}");
    let result = api.verify(&reference).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(paystack_webhook => Post "/webhooks/paystack" impl MarketplaceDatabase, PaymentGateway);
/// Route handler for Paystack webhook deliveries.
///
/// The request is gated on the `x-paystack-signature` header, an HMAC-SHA512 of the raw body
/// under the Paystack secret. An invalid or missing signature is a 401. Once past the gate,
/// the response is always a 200: Paystack retries non-2xx responses, and none of the failures
/// here are fixed by redelivery.
pub async fn paystack_webhook<TB, TG>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentsApi<TB, TG>>,
    secret: web::Data<WebhookSecret>,
) -> HttpResponse
where
    TB: MarketplaceDatabase,
    TG: PaymentGateway,
{
    trace!("💸️ Received webhook request: {}", req.uri());
    let signature = req.headers().get("x-paystack-signature").and_then(|v| v.to_str().ok());
    let valid = signature
        .map(|sig| verify_webhook_signature(secret.0.reveal(), &body, sig))
        .unwrap_or(false);
    if !valid {
        warn!("💸️ Webhook delivery with a missing or invalid signature was rejected");
        return HttpResponse::Unauthorized().json(JsonResponse::failure("Invalid signature"));
    }
    let event = match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("💸️ Could not deserialize webhook payload. {e}");
            return HttpResponse::BadRequest().json(JsonResponse::failure("Malformed payload"));
        },
    };
    let Some(reference) = event.reference() else {
        debug!("💸️ Webhook event {} carried no transaction reference. Ignoring it.", event.event);
        return HttpResponse::Ok().json(JsonResponse::success("Event ignored"));
    };
    match api.handle_webhook_event(&event.event, reference).await {
        Ok(()) => HttpResponse::Ok().json(JsonResponse::success("Event processed")),
        Err(e) => {
            warn!("💸️ Could not process webhook event {} for {reference}. {e}", event.event);
            HttpResponse::Ok().json(JsonResponse::failure(e))
        },
    }
}

//----------------------------------------------   Wallet  ----------------------------------------------------

route!(wallet_transactions => Get "/wallet/transactions" impl MarketplaceDatabase);
/// Route handler for the wallet ledger. Callers see their own entries; admins may pass
/// `user_id` to inspect another wallet.
pub async fn wallet_transactions<TB>(
    claims: JwtClaims,
    query: web::Query<WalletQuery>,
    api: web::Data<WalletApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let actor = claims.actor();
    let user_id = query.user_id.unwrap_or(actor.id);
    debug!("💻️ GET wallet transactions for user {user_id}");
    let entries = api.ledger_entries(&actor, user_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(wallet_earnings => Get "/wallet/earnings" impl MarketplaceDatabase);
pub async fn wallet_earnings<TB>(
    claims: JwtClaims,
    query: web::Query<WalletQuery>,
    api: web::Data<WalletApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let actor = claims.actor();
    let designer_id = query.user_id.unwrap_or(actor.id);
    debug!("💻️ GET earnings summary for designer {designer_id}");
    let summary = api.earnings_summary(&actor, designer_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Settings  ----------------------------------------------------

route!(get_setting => Get "/settings/{key}" impl MarketplaceDatabase);
pub async fn get_setting<TB>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<SettingsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let key = path.into_inner();
    debug!("💻️ GET setting {key}");
    let value = api.get(&claims.actor(), &key).await?;
    Ok(HttpResponse::Ok().json(SettingResponse { key, value }))
}

route!(put_setting => Put "/settings/{key}" impl MarketplaceDatabase);
pub async fn put_setting<TB>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<SettingUpdateRequest>,
    api: web::Data<SettingsApi<TB>>,
) -> Result<HttpResponse, ServerError>
where
    TB: MarketplaceDatabase,
{
    let key = path.into_inner();
    debug!("💻️ PUT setting {key}");
    api.set(&claims.actor(), &key, &body.value).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Setting {key} updated"))))
}
