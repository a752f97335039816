use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use sqlx::{SqliteConnection, SqlitePool};
use stz_common::Money;

use crate::{
    db_types::{
        Actor,
        Address,
        DesignRecord,
        LedgerEntry,
        NewOrder,
        Order,
        OrderNumber,
        OrderStatus,
        Payment,
        PaymentStatus,
        ReturnRequest,
        ReturnStatus,
        StatusHistoryEntry,
        User,
    },
    order_objects::{CaptureOutcome, EarningsSummary, OrderQueryFilter, Pagination, ReturnQueryFilter},
    sqlite::db,
    state_machine::{actor_may_fire, default_note, next_status, OrderEvent},
    traits::{MarketplaceDatabase, OrderFlowError},
};

/// The SQLite backend. Every trait method opens one transaction on the pool and composes the
/// low-level functions in [`crate::sqlite::db`] inside it.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pub(crate) pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").field("url", &self.url).finish()
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool and runs any pending migrations.
    pub async fn new(max_connections: u32) -> Result<Self, OrderFlowError> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderFlowError> {
        let pool = db::new_pool(url, max_connections).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| OrderFlowError::DatabaseError(format!("Migration error: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Applies one state-machine edge to the order inside the caller's transaction. Checks the actor
/// rule and the transition table, performs the guarded status update, stamps event timestamps,
/// writes the history row, and releases escrow on a confirmation edge. Returns the re-read order.
async fn transition_order(
    order: &Order,
    event: OrderEvent,
    actor: &Actor,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    if !actor_may_fire(event, actor, order) {
        return Err(OrderFlowError::forbidden(format!(
            "{} is not permitted to {event} order {}",
            actor.label(),
            order.order_number
        )));
    }
    let Some(to) = next_status(order.status, event) else {
        return Err(OrderFlowError::precondition(format!(
            "order {} cannot {event} from status {}",
            order.order_number, order.status
        )));
    };
    let moved = db::orders::guarded_status_update(order.id, order.status, to, conn).await?;
    if !moved {
        return Err(OrderFlowError::precondition(format!(
            "order {} was modified concurrently. Expected status {}",
            order.order_number, order.status
        )));
    }
    let now = Utc::now();
    match event {
        OrderEvent::MarkReady => db::orders::set_timestamp(order.id, "ready_at", now, conn).await?,
        OrderEvent::MarkPickedUp => db::orders::set_timestamp(order.id, "picked_up_at", now, conn).await?,
        OrderEvent::MarkDelivered => {
            let days = db::settings::auto_confirm_days(conn).await?;
            db::orders::set_timestamp(order.id, "delivered_at", now, conn).await?;
            db::orders::set_timestamp(order.id, "auto_confirm_deadline", now + Duration::days(days), conn).await?;
        },
        OrderEvent::Confirm | OrderEvent::AutoConfirm => {
            db::orders::set_timestamp(order.id, "confirmed_at", now, conn).await?;
        },
        OrderEvent::Cancel => db::orders::set_timestamp(order.id, "cancelled_at", now, conn).await?,
        OrderEvent::CompleteReturn => db::orders::set_timestamp(order.id, "returned_at", now, conn).await?,
        _ => {},
    }
    let note = note.unwrap_or_else(|| default_note(event));
    db::orders::insert_history(order.id, Some(order.status), to, note, &actor.label(), conn).await?;
    if matches!(event, OrderEvent::Confirm | OrderEvent::AutoConfirm) {
        let payment = db::payments::fetch_by_order(order.id, conn)
            .await?
            .ok_or_else(|| OrderFlowError::conflict(format!("order {} has no payment record", order.order_number)))?;
        db::escrow::release(order, &payment, conn).await?;
    }
    debug!("🔄️ Order {} moved {} -> {to} ({event}) by {}", order.order_number, order.status, actor.label());
    let updated = db::orders::fetch_order_by_id(order.id, conn)
        .await?
        .ok_or_else(|| OrderFlowError::not_found(format!("Order {}", order.order_number)))?;
    Ok(updated)
}

async fn fetch_order_or_err(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    db::orders::fetch_order_by_number(number, conn)
        .await?
        .ok_or_else(|| OrderFlowError::not_found(format!("Order {number}")))
}

fn admin_only(actor: &Actor) -> Result<(), OrderFlowError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(OrderFlowError::forbidden(format!("{} may not administer return requests", actor.label())))
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::catalog::fetch_user(user_id, &mut conn).await?)
    }

    async fn fetch_design(&self, design_id: i64) -> Result<Option<DesignRecord>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::catalog::fetch_design_record(design_id, &mut conn).await?)
    }

    async fn fetch_address_for_user(&self, address_id: i64, user_id: i64) -> Result<Option<Address>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::catalog::fetch_address_for_user(address_id, user_id, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let inserted = db::orders::insert_order(&order, &mut tx).await?;
        db::orders::insert_selections(inserted.id, &order, &mut tx).await?;
        db::orders::insert_history(
            inserted.id,
            None,
            OrderStatus::PendingPayment,
            "Order created",
            &inserted.customer_id.to_string(),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        info!("📝️ Order {} created for customer {}", inserted.order_number, inserted.customer_id);
        Ok(inserted)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_order_by_number(number, &mut conn).await?)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::search_orders(&filter, &mut conn).await?)
    }

    async fn count_orders(&self, filter: &OrderQueryFilter) -> Result<i64, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::count_orders(filter, &mut conn).await?)
    }

    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_history(order_id, &mut conn).await?)
    }

    async fn apply_transition(
        &self,
        number: &OrderNumber,
        event: OrderEvent,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        use OrderEvent::*;
        if matches!(event, PaymentCaptured | RequestReturn | RejectReturn | DispatchReturnPickup | CompleteReturn) {
            return Err(OrderFlowError::precondition(format!(
                "{event} is driven by its own operation and cannot be applied directly"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_err(number, &mut tx).await?;
        let updated = transition_order(&order, event, actor, note.as_deref(), &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn fetch_due_auto_confirmations(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::fetch_due_auto_confirmations(cutoff, &mut conn).await?)
    }

    async fn upsert_pending_payment(
        &self,
        order_id: i64,
        reference: &str,
        amount: Money,
        currency: &str,
    ) -> Result<Payment, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let payment = db::payments::upsert_pending(order_id, reference, amount, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::payments::fetch_by_order(order_id, &mut conn).await?)
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::payments::fetch_by_reference(reference, &mut conn).await?)
    }

    async fn capture_payment(&self, reference: &str) -> Result<CaptureOutcome, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let payment = db::payments::fetch_by_reference(reference, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Payment with reference {reference}")))?;
        let order = db::orders::fetch_order_by_id(payment.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order for payment {reference}")))?;
        match payment.status {
            PaymentStatus::Pending => {},
            PaymentStatus::HeldInEscrow => {
                // Duplicate webhook delivery or a verify racing the webhook. Nothing to do.
                debug!("💰️ Capture replay for reference {reference} ignored");
                return Ok(CaptureOutcome { order, applied: false });
            },
            status => {
                return Err(OrderFlowError::conflict(format!(
                    "payment {reference} is already {status} and cannot be captured"
                )));
            },
        }
        let held = db::escrow::hold(&order, &payment, &mut tx).await?;
        if !held {
            return Err(OrderFlowError::conflict(format!("payment {reference} was captured concurrently")));
        }
        let moved =
            db::orders::guarded_status_update(order.id, OrderStatus::PendingPayment, OrderStatus::Paid, &mut tx)
                .await?;
        if !moved {
            return Err(OrderFlowError::conflict(format!(
                "order {} is not awaiting payment. A captured charge against it needs manual review",
                order.order_number
            )));
        }
        let now = Utc::now();
        db::orders::set_timestamp(order.id, "paid_at", now, &mut tx).await?;
        db::orders::insert_history(
            order.id,
            Some(OrderStatus::PendingPayment),
            OrderStatus::Paid,
            default_note(OrderEvent::PaymentCaptured),
            &Actor::system().label(),
            &mut tx,
        )
        .await?;
        let updated = db::orders::fetch_order_by_id(order.id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order {}", order.order_number)))?;
        tx.commit().await?;
        info!("💰️ Payment {reference} captured. Order {} is now PAID", updated.order_number);
        Ok(CaptureOutcome { order: updated, applied: true })
    }

    async fn create_return_request(
        &self,
        number: &OrderNumber,
        actor: &Actor,
        reason: &str,
        window: Duration,
    ) -> Result<ReturnRequest, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_err(number, &mut tx).await?;
        if let Some(existing) = db::returns::fetch_by_order(order.id, &mut tx).await? {
            return Err(OrderFlowError::conflict(format!(
                "order {number} already has a return request ({})",
                existing.status
            )));
        }
        // The transition below also checks ownership and the DELIVERED precondition; the window
        // check only makes sense once we know the order has a delivery timestamp.
        let updated = transition_order(&order, OrderEvent::RequestReturn, actor, None, &mut tx).await?;
        let delivered_at = order
            .delivered_at
            .ok_or_else(|| OrderFlowError::precondition(format!("order {number} has no delivery timestamp")))?;
        if Utc::now() - delivered_at > window {
            return Err(OrderFlowError::precondition(format!(
                "the return window for order {number} closed {}",
                delivered_at + window
            )));
        }
        let request = db::returns::insert_request(order.id, reason, &mut tx).await?;
        tx.commit().await?;
        info!("↩️ Return request #{} opened for order {} ({})", request.id, updated.order_number, reason);
        Ok(request)
    }

    async fn fetch_return_request(&self, id: i64) -> Result<Option<(ReturnRequest, Order)>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let Some(request) = db::returns::fetch_by_id(id, &mut conn).await? else {
            return Ok(None);
        };
        let order = db::orders::fetch_order_by_id(request.order_id, &mut conn)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order for return request {id}")))?;
        Ok(Some((request, order)))
    }

    async fn search_return_requests(&self, filter: ReturnQueryFilter) -> Result<Vec<ReturnRequest>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::returns::search(&filter, &mut conn).await?)
    }

    async fn approve_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError> {
        admin_only(actor)?;
        let mut tx = self.pool.begin().await?;
        let request = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        let moved = db::returns::guarded_status_update(
            id,
            ReturnStatus::Pending,
            ReturnStatus::Approved,
            notes.as_deref(),
            None,
            &mut tx,
        )
        .await?;
        if !moved {
            return Err(OrderFlowError::precondition(format!(
                "return request {id} is {} and cannot be approved",
                request.status
            )));
        }
        let updated = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        tx.commit().await?;
        info!("↩️ Return request #{id} approved by {}", actor.label());
        Ok(updated)
    }

    async fn reject_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError> {
        admin_only(actor)?;
        let mut tx = self.pool.begin().await?;
        let request = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        let moved = db::returns::guarded_status_update(
            id,
            ReturnStatus::Pending,
            ReturnStatus::Rejected,
            notes.as_deref(),
            None,
            &mut tx,
        )
        .await?;
        if !moved {
            return Err(OrderFlowError::precondition(format!(
                "return request {id} is {} and cannot be rejected",
                request.status
            )));
        }
        let order = db::orders::fetch_order_by_id(request.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order for return request {id}")))?;
        transition_order(&order, OrderEvent::RejectReturn, actor, notes.as_deref(), &mut tx).await?;
        let updated = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        tx.commit().await?;
        info!("↩️ Return request #{id} rejected by {}", actor.label());
        Ok(updated)
    }

    async fn dispatch_return_pickup(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError> {
        admin_only(actor)?;
        let mut tx = self.pool.begin().await?;
        let request = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        let moved = db::returns::guarded_status_update(
            id,
            ReturnStatus::Approved,
            ReturnStatus::PickupDispatched,
            notes.as_deref(),
            None,
            &mut tx,
        )
        .await?;
        if !moved {
            return Err(OrderFlowError::precondition(format!(
                "return request {id} is {} and a pickup cannot be dispatched",
                request.status
            )));
        }
        let order = db::orders::fetch_order_by_id(request.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order for return request {id}")))?;
        transition_order(&order, OrderEvent::DispatchReturnPickup, actor, notes.as_deref(), &mut tx).await?;
        let updated = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        tx.commit().await?;
        info!("↩️ Courier dispatched for return request #{id} by {}", actor.label());
        Ok(updated)
    }

    async fn complete_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
        courier_fee: Money,
    ) -> Result<ReturnRequest, OrderFlowError> {
        admin_only(actor)?;
        let mut tx = self.pool.begin().await?;
        let request = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        let moved = db::returns::guarded_status_update(
            id,
            ReturnStatus::PickupDispatched,
            ReturnStatus::Returned,
            notes.as_deref(),
            Some(courier_fee),
            &mut tx,
        )
        .await?;
        if !moved {
            return Err(OrderFlowError::precondition(format!(
                "return request {id} is {} and cannot be completed",
                request.status
            )));
        }
        let order = db::orders::fetch_order_by_id(request.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Order for return request {id}")))?;
        transition_order(&order, OrderEvent::CompleteReturn, actor, notes.as_deref(), &mut tx).await?;
        let payment = db::payments::fetch_by_order(order.id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::conflict(format!("order {} has no payment record", order.order_number)))?;
        db::escrow::refund(&order, &payment, courier_fee, &mut tx).await?;
        let updated = db::returns::fetch_by_id(id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Return request {id}")))?;
        tx.commit().await?;
        info!("↩️ Return request #{id} completed. Order {} refunded", order.order_number);
        Ok(updated)
    }

    async fn fetch_ledger_entries(&self, user_id: i64) -> Result<Vec<LedgerEntry>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let pagination = Pagination { page: None, limit: Some(100) };
        Ok(db::ledger::entries_for_user(user_id, &pagination, &mut conn).await?)
    }

    async fn earnings_summary(&self, designer_id: i64) -> Result<EarningsSummary, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        db::ledger::earnings_summary(designer_id, &mut conn).await
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::settings::fetch(key, &mut conn).await?)
    }

    async fn update_setting(&self, key: &str, value: &str, actor: &Actor) -> Result<(), OrderFlowError> {
        admin_only(actor)?;
        let mut conn = self.pool.acquire().await?;
        Ok(db::settings::update(key, value, &actor.label(), &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}
