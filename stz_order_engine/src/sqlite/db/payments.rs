use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;
use stz_common::Money;

use crate::{
    db_types::{Payment, PaymentStatus},
    traits::OrderFlowError,
};

/// Creates the 1:1 payment record for an order, or re-points an existing still-`PENDING` record
/// at a fresh gateway reference (a customer re-initializing an expired checkout). Any other
/// payment state means money has already moved and is a conflict.
pub async fn upsert_pending(
    order_id: i64,
    reference: &str,
    amount: Money,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, OrderFlowError> {
    let now = Utc::now();
    let existing: Option<Payment> =
        sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match existing {
        None => {
            let payment = sqlx::query_as(
                r#"
                    INSERT INTO payments (order_id, reference, amount, currency, status, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $6)
                    RETURNING *;
                "#,
            )
            .bind(order_id)
            .bind(reference)
            .bind(amount)
            .bind(currency)
            .bind(PaymentStatus::Pending)
            .bind(now)
            .fetch_one(conn)
            .await?;
            debug!("🗃️💰️ Payment record created for order #{order_id} with reference {reference}");
            Ok(payment)
        },
        Some(p) if p.status == PaymentStatus::Pending => {
            let payment = sqlx::query_as(
                "UPDATE payments SET reference = $1, amount = $2, updated_at = $3 WHERE id = $4 RETURNING *",
            )
            .bind(reference)
            .bind(amount)
            .bind(now)
            .bind(p.id)
            .fetch_one(conn)
            .await?;
            debug!("🗃️💰️ Pending payment for order #{order_id} re-pointed at reference {reference}");
            Ok(payment)
        },
        Some(p) => Err(OrderFlowError::conflict(format!(
            "a payment already exists for this order with status {}",
            p.status
        ))),
    }
}

pub async fn fetch_by_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_by_reference(reference: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE reference = $1").bind(reference).fetch_optional(conn).await
}

/// Moves the payment to `to`, asserting it is still in `from`. The same optimistic guard as the
/// order-status update: a `false` return means another writer got there first.
pub async fn guarded_status_update(
    payment_id: i64,
    from: PaymentStatus,
    to: PaymentStatus,
    timestamp_column: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderFlowError> {
    let now = Utc::now();
    // timestamp_column is a compile-time constant at every call site.
    let sql = match timestamp_column {
        Some(col) => format!("UPDATE payments SET status = $1, updated_at = $2, {col} = $2 WHERE id = $3 AND status = $4"),
        None => "UPDATE payments SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4".to_string(),
    };
    let result = sqlx::query(&sql).bind(to).bind(now).bind(payment_id).bind(from).execute(conn).await?;
    Ok(result.rows_affected() == 1)
}
