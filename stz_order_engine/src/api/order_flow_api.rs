use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde_json::json;
use stz_common::Money;

use crate::{
    db_types::{Actor, NewOrder, Order, OrderNumber, Role, StatusHistoryEntry},
    helpers::{generate_order_number, PriceBreakdown},
    order_objects::{CreateOrderRequest, OrderQueryFilter, OrderResult},
    state_machine::OrderEvent,
    traits::{
        MarketplaceDatabase,
        MeasurementProvider,
        Notification,
        NotificationKind,
        NotificationSink,
        OrderFlowError,
        AUTO_CONFIRM_DAYS,
        COMMISSION_PERCENTAGE,
        DEFAULT_AUTO_CONFIRM_DAYS,
        DEFAULT_COMMISSION_PERCENTAGE,
    },
};

/// Order creation, lifecycle transitions and reads.
#[derive(Clone)]
pub struct OrderFlowApi<B, M>
where
    B: MarketplaceDatabase,
    M: MeasurementProvider,
{
    db: B,
    measurements: M,
    sink: Arc<dyn NotificationSink>,
}

impl<B, M> OrderFlowApi<B, M>
where
    B: MarketplaceDatabase,
    M: MeasurementProvider,
{
    pub fn new(db: B, measurements: M, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, measurements, sink }
    }

    async fn setting_or<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, OrderFlowError> {
        match self.db.fetch_setting(key).await? {
            Some(v) => v.parse().map_err(|_| {
                OrderFlowError::precondition(format!("platform setting {key} has unparseable value '{v}'"))
            }),
            None => Ok(default),
        }
    }

    /// Validates the request against the design catalog, prices the order, freezes a measurement
    /// snapshot and persists everything in one transaction. The customer pays nothing yet; the
    /// order starts out in `PENDING_PAYMENT`.
    pub async fn create_order(&self, actor: &Actor, request: CreateOrderRequest) -> Result<Order, OrderFlowError> {
        if actor.role != Role::Customer {
            return Err(OrderFlowError::forbidden("only customers can place orders"));
        }
        let customer = self
            .db
            .fetch_user(actor.id)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Customer {}", actor.id)))?;
        let record = self
            .db
            .fetch_design(request.design_id)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Design {}", request.design_id)))?;
        if !record.design.is_published || !record.design.is_active {
            return Err(OrderFlowError::precondition(format!(
                "design {} is not available for ordering",
                record.design.id
            )));
        }
        self.db
            .fetch_address_for_user(request.delivery_address_id, actor.id)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Address {}", request.delivery_address_id)))?;

        let fabric_adjustment = match request.fabric_option_id {
            Some(id) => {
                let option = record
                    .fabric_options
                    .iter()
                    .find(|o| o.id == id)
                    .ok_or_else(|| {
                        OrderFlowError::precondition(format!("fabric option {id} does not belong to this design"))
                    })?;
                if !option.is_available {
                    return Err(OrderFlowError::precondition(format!("fabric option {} is unavailable", option.name)));
                }
                option.price_adjustment
            },
            None => Money::from(0),
        };

        let mut add_on_selections = Vec::with_capacity(request.add_on_ids.len());
        for id in &request.add_on_ids {
            let add_on = record.add_ons.iter().find(|a| a.id == *id).ok_or_else(|| {
                OrderFlowError::precondition(format!("add-on {id} does not belong to this design"))
            })?;
            if !add_on.is_available {
                return Err(OrderFlowError::precondition(format!("add-on {} is unavailable", add_on.name)));
            }
            add_on_selections.push((add_on.id, add_on.price));
        }
        let add_ons_total: Money = add_on_selections.iter().map(|(_, price)| *price).sum();

        let size_adjustment = match &request.size_label {
            Some(label) => {
                record
                    .size_pricings
                    .iter()
                    .find(|s| &s.size_label == label)
                    .map(|s| s.price_adjustment)
                    .ok_or_else(|| {
                        OrderFlowError::precondition(format!("size {label} is not offered for this design"))
                    })?
            },
            None => Money::from(0),
        };

        let breakdown = PriceBreakdown {
            base_price: record.design.base_price,
            fabric_adjustment,
            size_adjustment,
            add_ons_total,
            delivery_fee: request.delivery_fee.unwrap_or_default(),
        };
        let commission_pct = self.setting_or(COMMISSION_PERCENTAGE, DEFAULT_COMMISSION_PERCENTAGE).await?;
        let total_price = breakdown.total();
        let platform_commission = breakdown.commission(commission_pct);

        let measurement_email = customer.open_tailor_email.as_deref().unwrap_or(&customer.email);
        let measurement_snapshot = match self.measurements.measurements_by_email(measurement_email).await {
            Ok(Some(snapshot)) => Some(snapshot.to_string()),
            Ok(None) => None,
            Err(e) => {
                warn!("📏️ Measurement lookup for {measurement_email} failed: {e}. Using a placeholder snapshot");
                Some(json!({ "available": false }).to_string())
            },
        };

        let order = NewOrder {
            order_number: self.unique_order_number().await?,
            customer_id: customer.id,
            designer_id: record.design.designer_id,
            design_id: record.design.id,
            delivery_address_id: request.delivery_address_id,
            base_price: breakdown.base_price,
            fabric_adjustment,
            size_adjustment,
            add_ons_total,
            delivery_fee: breakdown.delivery_fee,
            total_price,
            platform_commission,
            currency: record.design.currency.clone(),
            size_label: request.size_label,
            special_instructions: request.special_instructions,
            measurement_snapshot,
            fabric_option_id: request.fabric_option_id,
            add_on_selections,
        };
        let order = self.db.insert_order(order).await?;
        self.sink.notify(Notification {
            user_id: order.designer_id,
            kind: NotificationKind::OrderUpdate,
            title: "New order".to_string(),
            body: format!("Order {} is awaiting payment", order.order_number),
            data: json!({ "order_number": order.order_number }),
        });
        Ok(order)
    }

    async fn unique_order_number(&self) -> Result<OrderNumber, OrderFlowError> {
        for _ in 0..5 {
            let number = generate_order_number();
            if self.db.fetch_order_by_number(&number).await?.is_none() {
                return Ok(number);
            }
        }
        Err(OrderFlowError::conflict("could not generate a unique order number"))
    }

    /// Applies one lifecycle transition, notifying the counterparty on success.
    pub async fn transition(
        &self,
        number: &OrderNumber,
        event: OrderEvent,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.apply_transition(number, event, actor, note).await?;
        let recipient = match event {
            OrderEvent::Accept |
            OrderEvent::Reject |
            OrderEvent::StartWork |
            OrderEvent::MarkReady |
            OrderEvent::MarkPickedUp |
            OrderEvent::MarkInTransit |
            OrderEvent::MarkDelivered => order.customer_id,
            _ => order.designer_id,
        };
        self.sink.notify(Notification {
            user_id: recipient,
            kind: NotificationKind::OrderUpdate,
            title: format!("Order {}", order.status),
            body: format!("Order {} is now {}", order.order_number, order.status),
            data: json!({ "order_number": order.order_number, "status": order.status }),
        });
        Ok(order)
    }

    /// Fetches the order if the actor is allowed to see it: customers and designers see their
    /// own, admins see everything.
    pub async fn order_for_actor(&self, actor: &Actor, number: &OrderNumber) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_number(number)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order {number}")))?;
        let visible = match actor.role {
            Role::Admin | Role::System => true,
            Role::Customer => order.customer_id == actor.id,
            Role::Designer => order.designer_id == actor.id,
        };
        if visible {
            Ok(order)
        } else {
            Err(OrderFlowError::forbidden(format!("{} may not view order {number}", actor.label())))
        }
    }

    pub async fn history_for_actor(
        &self,
        actor: &Actor,
        number: &OrderNumber,
    ) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        let order = self.order_for_actor(actor, number).await?;
        self.db.fetch_status_history(order.id).await
    }

    /// Lists orders with the filter pinned to the actor's own records unless they are an admin.
    pub async fn search(&self, actor: &Actor, mut filter: OrderQueryFilter) -> Result<OrderResult, OrderFlowError> {
        match actor.role {
            Role::Customer => filter.customer_id = Some(actor.id),
            Role::Designer => filter.designer_id = Some(actor.id),
            Role::Admin | Role::System => {},
        }
        let total = self.db.count_orders(&filter).await?;
        let page = filter.pagination.page();
        let limit = filter.pagination.limit();
        let orders = self.db.search_orders(filter).await?;
        Ok(OrderResult { orders, total, page, limit })
    }

    /// One auto-confirmation sweep: every `DELIVERED` order whose confirmation window has lapsed
    /// is confirmed on the customer's behalf, releasing its escrow. Returns (confirmed, failed).
    /// Failures are logged and skipped; each order is its own transaction, so a rerun picks up
    /// exactly the stragglers.
    pub async fn auto_confirm_due(&self, now: DateTime<Utc>) -> Result<(usize, usize), OrderFlowError> {
        let days = self.setting_or(AUTO_CONFIRM_DAYS, DEFAULT_AUTO_CONFIRM_DAYS).await?;
        let cutoff = now - Duration::days(days);
        let due = self.db.fetch_due_auto_confirmations(cutoff).await?;
        if due.is_empty() {
            return Ok((0, 0));
        }
        info!("🕰️ {} order(s) due for auto-confirmation", due.len());
        let mut confirmed = 0;
        let mut failed = 0;
        for order in due {
            match self.transition(&order.order_number, OrderEvent::AutoConfirm, &Actor::system(), None).await {
                Ok(_) => confirmed += 1,
                Err(e) => {
                    warn!("🕰️ Auto-confirmation of order {} failed: {e}", order.order_number);
                    failed += 1;
                },
            }
        }
        Ok((confirmed, failed))
    }
}
