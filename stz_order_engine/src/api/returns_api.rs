use std::sync::Arc;

use chrono::Duration;
use log::*;
use serde_json::json;
use stz_common::Money;

use crate::{
    db_types::{Actor, Order, OrderNumber, ReturnRequest, Role},
    order_objects::ReturnQueryFilter,
    traits::{
        MarketplaceDatabase,
        Notification,
        NotificationKind,
        NotificationSink,
        OrderFlowError,
        AUTO_CONFIRM_DAYS,
        DEFAULT_AUTO_CONFIRM_DAYS,
        DEFAULT_RETURN_COURIER_FEE,
        RETURN_COURIER_FEE,
    },
};

/// The post-delivery return workflow. Customers open a request; admins drive it to a refund or a
/// rejection.
#[derive(Clone)]
pub struct ReturnsApi<B: MarketplaceDatabase> {
    db: B,
    sink: Arc<dyn NotificationSink>,
}

impl<B: MarketplaceDatabase> ReturnsApi<B> {
    pub fn new(db: B, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, sink }
    }

    async fn setting_or<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, OrderFlowError> {
        match self.db.fetch_setting(key).await? {
            Some(v) => v.parse().map_err(|_| {
                OrderFlowError::precondition(format!("platform setting {key} has unparseable value '{v}'"))
            }),
            None => Ok(default),
        }
    }

    /// Opens a return request. The return window is the same span as the auto-confirmation
    /// window: once the order would have auto-confirmed, it can no longer be returned.
    pub async fn request_return(
        &self,
        actor: &Actor,
        number: &OrderNumber,
        reason: &str,
    ) -> Result<ReturnRequest, OrderFlowError> {
        if reason.trim().is_empty() {
            return Err(OrderFlowError::precondition("a return reason is required"));
        }
        let days = self.setting_or(AUTO_CONFIRM_DAYS, DEFAULT_AUTO_CONFIRM_DAYS).await?;
        let request = self.db.create_return_request(number, actor, reason, Duration::days(days)).await?;
        let (_, order) = self.fetch(request.id).await?;
        self.sink.notify(Notification {
            user_id: order.designer_id,
            kind: NotificationKind::ReturnUpdate,
            title: "Return requested".to_string(),
            body: format!("The customer has requested a return for order {number}"),
            data: json!({ "order_number": number, "return_request_id": request.id }),
        });
        Ok(request)
    }

    pub async fn approve(&self, actor: &Actor, id: i64, notes: Option<String>) -> Result<ReturnRequest, OrderFlowError> {
        let request = self.db.approve_return(id, actor, notes).await?;
        self.notify_customer(id, "Return approved", "Your return request has been approved").await;
        Ok(request)
    }

    pub async fn reject(&self, actor: &Actor, id: i64, notes: Option<String>) -> Result<ReturnRequest, OrderFlowError> {
        let request = self.db.reject_return(id, actor, notes).await?;
        self.notify_customer(id, "Return rejected", "Your return request has been rejected").await;
        Ok(request)
    }

    pub async fn dispatch_pickup(
        &self,
        actor: &Actor,
        id: i64,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError> {
        let request = self.db.dispatch_return_pickup(id, actor, notes).await?;
        self.notify_customer(id, "Return pickup dispatched", "A courier is on the way to collect your return").await;
        Ok(request)
    }

    /// Completes the return: order to `RETURNED`, escrow refunded to the customer, courier fee
    /// (read from platform settings at this moment) deducted from the designer.
    pub async fn complete(
        &self,
        actor: &Actor,
        id: i64,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError> {
        let courier_fee: Money =
            self.setting_or(RETURN_COURIER_FEE, DEFAULT_RETURN_COURIER_FEE).await.map(Money::from)?;
        let request = self.db.complete_return(id, actor, notes, courier_fee).await?;
        let (_, order) = self.fetch(id).await?;
        self.sink.notify(Notification {
            user_id: order.customer_id,
            kind: NotificationKind::ReturnUpdate,
            title: "Return completed".to_string(),
            body: format!("Order {} has been returned and refunded", order.order_number),
            data: json!({ "order_number": order.order_number }),
        });
        self.sink.notify(Notification {
            user_id: order.designer_id,
            kind: NotificationKind::ReturnUpdate,
            title: "Return completed".to_string(),
            body: format!("Order {} was returned. The courier fee of {courier_fee} was deducted", order.order_number),
            data: json!({ "order_number": order.order_number }),
        });
        Ok(request)
    }

    /// Fetches a return request if the actor may see it: the ordering customer, the order's
    /// designer, or an admin.
    pub async fn request_for_actor(&self, actor: &Actor, id: i64) -> Result<(ReturnRequest, Order), OrderFlowError> {
        let (request, order) = self.fetch(id).await?;
        let visible = match actor.role {
            Role::Admin | Role::System => true,
            Role::Customer => order.customer_id == actor.id,
            Role::Designer => order.designer_id == actor.id,
        };
        if visible {
            Ok((request, order))
        } else {
            Err(OrderFlowError::forbidden(format!("{} may not view return request {id}", actor.label())))
        }
    }

    /// Lists return requests, pinned to the actor's own orders unless they are an admin.
    pub async fn search(&self, actor: &Actor, mut filter: ReturnQueryFilter) -> Result<Vec<ReturnRequest>, OrderFlowError> {
        match actor.role {
            Role::Customer => filter.customer_id = Some(actor.id),
            Role::Designer => filter.designer_id = Some(actor.id),
            Role::Admin | Role::System => {},
        }
        self.db.search_return_requests(filter).await
    }

    async fn fetch(&self, id: i64) -> Result<(ReturnRequest, Order), OrderFlowError> {
        self.db
            .fetch_return_request(id)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))
    }

    async fn notify_customer(&self, id: i64, title: &str, body: &str) {
        match self.fetch(id).await {
            Ok((request, order)) => self.sink.notify(Notification {
                user_id: order.customer_id,
                kind: NotificationKind::ReturnUpdate,
                title: title.to_string(),
                body: body.to_string(),
                data: json!({ "order_number": order.order_number, "return_request_id": request.id }),
            }),
            Err(e) => warn!("🔔️ Could not load return request {id} for notification: {e}"),
        }
    }
}
