use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use stz_common::Money;

use crate::{
    db_types::{LedgerEntry, LedgerEntryType, PaymentStatus},
    order_objects::{EarningsSummary, Pagination},
    traits::OrderFlowError,
};

/// Appends a row to the wallet ledger. All amounts are recorded positive; what an entry means
/// for a balance is determined by its type when the ledger is rolled up.
pub async fn insert_entry(
    user_id: i64,
    payment_id: i64,
    entry_type: LedgerEntryType,
    amount: Money,
    currency: &str,
    description: &str,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, OrderFlowError> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions (user_id, payment_id, entry_type, amount, currency, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(payment_id)
    .bind(entry_type)
    .bind(amount)
    .bind(currency)
    .bind(description)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// Newest entries first.
pub async fn entries_for_user(
    user_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3")
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(conn)
        .await
}

async fn sum_for_type(user_id: i64, entry_type: LedgerEntryType, conn: &mut SqliteConnection) -> Result<Money, sqlx::Error> {
    let row: SqliteRow =
        sqlx::query("SELECT COALESCE(SUM(amount), 0) AS total FROM wallet_transactions WHERE user_id = $1 AND entry_type = $2")
            .bind(user_id)
            .bind(entry_type)
            .fetch_one(conn)
            .await?;
    row.try_get::<Money, _>("total")
}

/// Money destined for this designer that is still sitting in escrow, i.e. the prospective
/// earnings of every order of theirs whose payment has been captured but not yet released or
/// refunded.
async fn pending_escrow_for_designer(designer_id: i64, conn: &mut SqliteConnection) -> Result<Money, sqlx::Error> {
    let row: SqliteRow = sqlx::query(
        r#"
            SELECT COALESCE(SUM(o.total_price - o.platform_commission), 0) AS total
            FROM orders o
            JOIN payments p ON p.order_id = o.id
            WHERE o.designer_id = $1 AND p.status = $2
        "#,
    )
    .bind(designer_id)
    .bind(PaymentStatus::HeldInEscrow)
    .fetch_one(conn)
    .await?;
    row.try_get::<Money, _>("total")
}

/// Rolls the ledger up into the designer-facing wallet view. Release entries carry the net
/// earnings and deduction entries are positive records, so the net position is
/// `released - commission - fees`.
pub async fn earnings_summary(designer_id: i64, conn: &mut SqliteConnection) -> Result<EarningsSummary, OrderFlowError> {
    let released = sum_for_type(designer_id, LedgerEntryType::EscrowRelease, conn).await?;
    let commission_deducted = sum_for_type(designer_id, LedgerEntryType::CommissionDeduction, conn).await?;
    let return_fees_deducted = sum_for_type(designer_id, LedgerEntryType::ReturnFeeDeduction, conn).await?;
    let pending_escrow = pending_escrow_for_designer(designer_id, conn).await?;
    Ok(EarningsSummary {
        released,
        commission_deducted,
        return_fees_deducted,
        net_earnings: released - commission_deducted - return_fees_deducted,
        pending_escrow,
    })
}
