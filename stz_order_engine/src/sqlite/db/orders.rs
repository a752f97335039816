use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatus, StatusHistoryEntry},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

/// Inserts a new order row. Not atomic on its own; callers embed this in a transaction together
/// with [`insert_selections`] and [`insert_history`].
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let now = Utc::now();
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                customer_id,
                designer_id,
                design_id,
                delivery_address_id,
                status,
                base_price,
                fabric_adjustment,
                size_adjustment,
                add_ons_total,
                delivery_fee,
                total_price,
                platform_commission,
                currency,
                size_label,
                special_instructions,
                measurement_snapshot,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(order.customer_id)
    .bind(order.designer_id)
    .bind(order.design_id)
    .bind(order.delivery_address_id)
    .bind(OrderStatus::PendingPayment)
    .bind(order.base_price)
    .bind(order.fabric_adjustment)
    .bind(order.size_adjustment)
    .bind(order.add_ons_total)
    .bind(order.delivery_fee)
    .bind(order.total_price)
    .bind(order.platform_commission)
    .bind(&order.currency)
    .bind(&order.size_label)
    .bind(&order.special_instructions)
    .bind(&order.measurement_snapshot)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", inserted.order_number, inserted.id);
    Ok(inserted)
}

/// Persists the fabric and add-on selections made at checkout.
pub async fn insert_selections(
    order_id: i64,
    order: &NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    if let Some(fabric_option_id) = order.fabric_option_id {
        sqlx::query(
            "INSERT INTO order_fabric_selections (order_id, fabric_option_id, price_adjustment) VALUES ($1, $2, $3)",
        )
        .bind(order_id)
        .bind(fabric_option_id)
        .bind(order.fabric_adjustment)
        .execute(&mut *conn)
        .await?;
    }
    for (add_on_id, price) in &order.add_on_selections {
        sqlx::query("INSERT INTO order_add_on_selections (order_id, add_on_id, price) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(add_on_id)
            .bind(price)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number).fetch_optional(conn).await
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Moves the order to `to`, asserting that it is still in `from`. Returns `false` when the guard
/// fails, i.e. another writer moved the order first; callers turn that into a
/// `PreconditionFailed` and roll the transaction back.
pub async fn guarded_status_update(
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderFlowError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(to)
        .bind(Utc::now())
        .bind(order_id)
        .bind(from)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Stamps an event-specific timestamp column. `column` is compile-time constant at every call
/// site, never user input.
pub async fn set_timestamp(
    order_id: i64,
    column: &str,
    value: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let sql = format!("UPDATE orders SET {column} = $1 WHERE id = $2");
    sqlx::query(&sql).bind(value).bind(order_id).execute(conn).await?;
    Ok(())
}

/// Appends one status-history row. Called exactly once per successful transition, inside the
/// transition's transaction.
pub async fn insert_history(
    order_id: i64,
    from: Option<OrderStatus>,
    to: OrderStatus,
    note: &str,
    changed_by: &str,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, from_status, to_status, note, changed_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(note)
    .bind(changed_by)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_history(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

fn apply_filter<'a>(builder: &mut QueryBuilder<'a, sqlx::Sqlite>, filter: &'a OrderQueryFilter) {
    let mut first = true;
    let mut sep = |builder: &mut QueryBuilder<'a, sqlx::Sqlite>| {
        builder.push(if first { " WHERE " } else { " AND " });
        first = false;
    };
    if let Some(customer_id) = filter.customer_id {
        sep(builder);
        builder.push("customer_id = ").push_bind(customer_id);
    }
    if let Some(designer_id) = filter.designer_id {
        sep(builder);
        builder.push("designer_id = ").push_bind(designer_id);
    }
    if let Some(status) = filter.status {
        sep(builder);
        builder.push("status = ").push_bind(status);
    }
}

/// Fetches orders according to the filter, newest first.
pub async fn search_orders(filter: &OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    apply_filter(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC, id DESC");
    builder.push(" LIMIT ").push_bind(i64::from(filter.pagination.limit()));
    builder.push(" OFFSET ").push_bind(i64::from(filter.pagination.offset()));
    builder.build_query_as().fetch_all(conn).await
}

pub async fn count_orders(filter: &OrderQueryFilter, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM orders");
    apply_filter(&mut builder, filter);
    let count: (i64,) = builder.build_query_as().fetch_one(conn).await?;
    Ok(count.0)
}

/// Orders sitting in `DELIVERED` whose delivery timestamp is at or before the cutoff. These are
/// due for auto-confirmation.
pub async fn fetch_due_auto_confirmations(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE status = $1 AND delivered_at <= $2 ORDER BY delivered_at ASC")
        .bind(OrderStatus::Delivered)
        .bind(cutoff)
        .fetch_all(conn)
        .await
}
