use std::sync::Arc;

use log::*;
use serde_json::json;

use crate::{
    db_types::{Actor, OrderNumber, OrderStatus, PaymentStatus},
    helpers::generate_payment_reference,
    order_objects::{CaptureOutcome, PaymentInitResult, PaymentVerifyResult},
    traits::{
        GatewayChargeStatus,
        MarketplaceDatabase,
        Notification,
        NotificationKind,
        NotificationSink,
        OrderFlowError,
        PaymentGateway,
    },
};

/// Payment initialization, webhook handling and verification. This is where customer money
/// enters escrow; everything in here is keyed on the gateway reference and idempotent against
/// duplicate gateway signals.
#[derive(Clone)]
pub struct PaymentsApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    db: B,
    gateway: G,
    sink: Arc<dyn NotificationSink>,
}

impl<B, G> PaymentsApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, gateway, sink }
    }

    /// Starts (or restarts) checkout for an order. Only the ordering customer may pay, and only
    /// while the order is still `PENDING_PAYMENT`.
    ///
    /// If a pending payment already exists it is re-verified with the gateway first: the
    /// customer may have completed the charge without us receiving the webhook, and issuing a
    /// fresh reference over a successful charge would double-charge them. A successful charge
    /// found this way is captured and reported as a conflict.
    pub async fn initialize(&self, actor: &Actor, number: &OrderNumber) -> Result<PaymentInitResult, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_number(number)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order {number}")))?;
        if !order.is_owned_by_customer(actor) {
            return Err(OrderFlowError::forbidden(format!("{} may not pay for order {number}", actor.label())));
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(OrderFlowError::precondition(format!(
                "order {number} is {} and cannot be paid for",
                order.status
            )));
        }
        if let Some(existing) = self.db.fetch_payment_for_order(order.id).await? {
            if existing.status == PaymentStatus::Pending {
                match self.gateway.verify_transaction(&existing.reference).await {
                    Ok(v) if v.status == GatewayChargeStatus::Success => {
                        self.capture(&existing.reference).await?;
                        return Err(OrderFlowError::conflict(format!(
                            "order {number} was already paid under reference {}",
                            existing.reference
                        )));
                    },
                    Ok(_) => {},
                    Err(e) => warn!("💰️ Could not re-verify pending reference {}: {e}", existing.reference),
                }
            }
        }
        let customer = self
            .db
            .fetch_user(order.customer_id)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Customer {}", order.customer_id)))?;
        let reference = generate_payment_reference(number);
        let payment = self.db.upsert_pending_payment(order.id, &reference, order.total_price, &order.currency).await?;
        let metadata = json!({
            "order_number": order.order_number,
            "customer_id": order.customer_id,
        });
        let init = self.gateway.initialize_transaction(&customer.email, order.total_price, &reference, metadata).await?;
        info!("💰️ Checkout initialized for order {number} under reference {reference}");
        Ok(PaymentInitResult {
            payment_id: payment.id,
            reference: init.reference,
            authorization_url: init.authorization_url,
            access_code: init.access_code,
        })
    }

    /// Handles a gateway event that has already passed signature verification. Unknown event
    /// types are logged and ignored so new gateway features cannot break the webhook endpoint.
    pub async fn handle_webhook_event(&self, event_type: &str, reference: &str) -> Result<(), OrderFlowError> {
        match event_type {
            "charge.success" => {
                let outcome = self.capture(reference).await?;
                if !outcome.applied {
                    debug!("💰️ Webhook replay for reference {reference} ignored");
                }
                Ok(())
            },
            "charge.failed" => {
                warn!("💰️ Charge failed for reference {reference}");
                Ok(())
            },
            other => {
                debug!("💰️ Ignoring webhook event type {other} for reference {reference}");
                Ok(())
            },
        }
    }

    /// Customer-driven verification, used when the webhook is delayed. Confirms the charge with
    /// the gateway and captures it if we had not already.
    pub async fn verify(&self, reference: &str) -> Result<PaymentVerifyResult, OrderFlowError> {
        let payment = self
            .db
            .fetch_payment_by_reference(reference)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Payment with reference {reference}")))?;
        let verification = self.gateway.verify_transaction(reference).await?;
        let order = if verification.status == GatewayChargeStatus::Success {
            self.capture(reference).await?.order
        } else {
            self.db
                .fetch_order_by_id(payment.order_id)
                .await?
                .ok_or_else(|| OrderFlowError::not_found(format!("Order for payment {reference}")))?
        };
        Ok(PaymentVerifyResult {
            reference: reference.to_string(),
            gateway_status: verification.status.as_str().to_string(),
            amount: verification.amount,
            paid_at: verification.paid_at,
            order_status: order.status,
        })
    }

    /// Captures a gateway-confirmed charge: escrow hold + order to `PAID`, idempotent on replays.
    async fn capture(&self, reference: &str) -> Result<CaptureOutcome, OrderFlowError> {
        let outcome = self.db.capture_payment(reference).await?;
        if outcome.applied {
            let order = &outcome.order;
            self.sink.notify(Notification {
                user_id: order.customer_id,
                kind: NotificationKind::PaymentUpdate,
                title: "Payment received".to_string(),
                body: format!("Your payment for order {} is held in escrow", order.order_number),
                data: json!({ "order_number": order.order_number, "reference": reference }),
            });
            self.sink.notify(Notification {
                user_id: order.designer_id,
                kind: NotificationKind::OrderUpdate,
                title: "Order paid".to_string(),
                body: format!("Order {} has been paid and awaits your response", order.order_number),
                data: json!({ "order_number": order.order_number }),
            });
        }
        Ok(outcome)
    }
}
