use chrono::Utc;
use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stz_common::Money;

use crate::{
    db_types::{ReturnRequest, ReturnStatus},
    order_objects::ReturnQueryFilter,
    traits::OrderFlowError,
};

pub async fn insert_request(
    order_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<ReturnRequest, OrderFlowError> {
    let now = Utc::now();
    let request: ReturnRequest = sqlx::query_as(
        r#"
            INSERT INTO return_requests (order_id, reason, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(reason)
    .bind(ReturnStatus::Pending)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️↩️ Return request #{} created for order #{order_id}", request.id);
    Ok(request)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<ReturnRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM return_requests WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_by_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<ReturnRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM return_requests WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

/// Moves a return request to `to`, asserting it is still in `from`. Resolution fields are only
/// written on the transitions that resolve the request.
pub async fn guarded_status_update(
    id: i64,
    from: ReturnStatus,
    to: ReturnStatus,
    admin_notes: Option<&str>,
    courier_fee: Option<Money>,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderFlowError> {
    let now = Utc::now();
    let resolved_at = matches!(to, ReturnStatus::Returned | ReturnStatus::Rejected).then_some(now);
    let result = sqlx::query(
        r#"
            UPDATE return_requests
            SET status = $1,
                admin_notes = COALESCE($2, admin_notes),
                courier_fee = COALESCE($3, courier_fee),
                resolved_at = COALESCE($4, resolved_at),
                updated_at = $5
            WHERE id = $6 AND status = $7
        "#,
    )
    .bind(to)
    .bind(admin_notes)
    .bind(courier_fee)
    .bind(resolved_at)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn search(filter: &ReturnQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<ReturnRequest>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT r.* FROM return_requests r");
    if filter.designer_id.is_some() || filter.customer_id.is_some() {
        builder.push(" JOIN orders o ON o.id = r.order_id");
    }
    builder.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ").push_bind(status);
    }
    if let Some(designer_id) = filter.designer_id {
        builder.push(" AND o.designer_id = ").push_bind(designer_id);
    }
    if let Some(customer_id) = filter.customer_id {
        builder.push(" AND o.customer_id = ").push_bind(customer_id);
    }
    builder
        .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
        .push_bind(filter.pagination.limit())
        .push(" OFFSET ")
        .push_bind(filter.pagination.offset());
    builder.build_query_as().fetch_all(conn).await
}
