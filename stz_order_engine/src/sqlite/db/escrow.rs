//! The escrow ledger. Every kobo that moves on the platform moves through one of the three
//! functions in this module, always inside the caller's transaction:
//!
//! * [`hold`] when a gateway charge is captured. The customer's money enters escrow.
//! * [`release`] when the customer (or the auto-confirm sweep) confirms delivery. The designer is
//!   credited with the order total less the platform commission.
//! * [`refund`] when a completed return is processed. The customer is made whole and the courier
//!   fee is deducted from the designer.
//!
//! Each function asserts the payment's current status with a guarded update, so a racing writer
//! surfaces as a [`OrderFlowError::Conflict`] rather than a double credit.

use log::info;
use sqlx::SqliteConnection;
use stz_common::Money;

use crate::{
    db_types::{LedgerEntryType, Order, Payment, PaymentStatus},
    sqlite::db::ledger,
    traits::OrderFlowError,
};

/// Moves a `PENDING` payment into escrow and records the `ESCROW_HOLD` ledger entry against the
/// customer. Returns `false` if the payment was no longer pending, which the caller treats as an
/// idempotent replay.
pub async fn hold(order: &Order, payment: &Payment, conn: &mut SqliteConnection) -> Result<bool, OrderFlowError> {
    let moved = super::payments::guarded_status_update(
        payment.id,
        PaymentStatus::Pending,
        PaymentStatus::HeldInEscrow,
        Some("paid_at"),
        conn,
    )
    .await?;
    if !moved {
        return Ok(false);
    }
    ledger::insert_entry(
        order.customer_id,
        payment.id,
        LedgerEntryType::EscrowHold,
        payment.amount,
        &payment.currency,
        &format!("Payment for order {} held in escrow", order.order_number),
        conn,
    )
    .await?;
    info!("🔒️ {} held in escrow for order {}", payment.amount, order.order_number);
    Ok(true)
}

/// Releases escrowed funds to the designer. Two ledger rows are written: the net earnings
/// credit (total less commission) and the commission record, so the designer's statement shows
/// where the difference went.
pub async fn release(order: &Order, payment: &Payment, conn: &mut SqliteConnection) -> Result<(), OrderFlowError> {
    let moved = super::payments::guarded_status_update(
        payment.id,
        PaymentStatus::HeldInEscrow,
        PaymentStatus::Released,
        Some("released_at"),
        conn,
    )
    .await?;
    if !moved {
        return Err(OrderFlowError::conflict(format!(
            "payment for order {} is not held in escrow and cannot be released",
            order.order_number
        )));
    }
    ledger::insert_entry(
        order.designer_id,
        payment.id,
        LedgerEntryType::EscrowRelease,
        order.designer_earnings(),
        &payment.currency,
        &format!("Earnings released for order {}", order.order_number),
        conn,
    )
    .await?;
    ledger::insert_entry(
        order.designer_id,
        payment.id,
        LedgerEntryType::CommissionDeduction,
        order.platform_commission,
        &payment.currency,
        &format!("Platform commission for order {}", order.order_number),
        conn,
    )
    .await?;
    info!(
        "💸️ Escrow released for order {}. Designer {} earns {} ({} less {} commission)",
        order.order_number,
        order.designer_id,
        order.designer_earnings(),
        order.total_price,
        order.platform_commission
    );
    Ok(())
}

/// Refunds escrowed funds to the customer after a completed return. The courier fee for the
/// return pickup is charged to the designer.
pub async fn refund(
    order: &Order,
    payment: &Payment,
    courier_fee: Money,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let moved = super::payments::guarded_status_update(
        payment.id,
        PaymentStatus::HeldInEscrow,
        PaymentStatus::Refunded,
        Some("refunded_at"),
        conn,
    )
    .await?;
    if !moved {
        return Err(OrderFlowError::conflict(format!(
            "payment for order {} is not held in escrow and cannot be refunded",
            order.order_number
        )));
    }
    ledger::insert_entry(
        order.customer_id,
        payment.id,
        LedgerEntryType::Refund,
        order.total_price,
        &payment.currency,
        &format!("Refund for returned order {}", order.order_number),
        conn,
    )
    .await?;
    ledger::insert_entry(
        order.designer_id,
        payment.id,
        LedgerEntryType::ReturnFeeDeduction,
        courier_fee,
        &payment.currency,
        &format!("Return courier fee for order {}", order.order_number),
        conn,
    )
    .await?;
    info!(
        "↩️ Escrow refunded for order {}. Customer {} receives {}, courier fee {} charged to designer {}",
        order.order_number, order.customer_id, order.total_price, courier_fee, order.designer_id
    );
    Ok(())
}
