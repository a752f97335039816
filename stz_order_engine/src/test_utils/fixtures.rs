//! Record fixtures. The `seed_*` functions write directly to a test database; `bare_order` is a
//! pure in-memory order for unit tests that never touch storage.
use chrono::Utc;
use stz_common::Money;

use crate::db_types::{Order, OrderNumber, OrderStatus};
#[cfg(feature = "sqlite")]
use crate::{db_types::Role, SqliteDatabase};

pub fn bare_order() -> Order {
    let now = Utc::now();
    Order {
        id: 1,
        order_number: OrderNumber("STZ-20260101-TEST".into()),
        customer_id: 1,
        designer_id: 2,
        design_id: 1,
        delivery_address_id: 1,
        status: OrderStatus::PendingPayment,
        base_price: Money::from(28_000),
        fabric_adjustment: Money::from(0),
        size_adjustment: Money::from(0),
        add_ons_total: Money::from(0),
        delivery_fee: Money::from(1_500),
        total_price: Money::from(29_500),
        platform_commission: Money::from(2_950),
        currency: "NGN".into(),
        size_label: None,
        special_instructions: None,
        measurement_snapshot: None,
        created_at: now,
        updated_at: now,
        paid_at: None,
        ready_at: None,
        picked_up_at: None,
        delivered_at: None,
        auto_confirm_deadline: None,
        confirmed_at: None,
        cancelled_at: None,
        returned_at: None,
    }
}

#[cfg(feature = "sqlite")]
pub async fn seed_user(db: &SqliteDatabase, id: i64, email: &str, role: Role) {
    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, role, open_tailor_email, created_at) \
         VALUES ($1, $2, 'Test', 'User', $3, $2, $4)",
    )
    .bind(id)
    .bind(email)
    .bind(role)
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .expect("Error seeding user");
}

#[cfg(feature = "sqlite")]
pub async fn seed_address(db: &SqliteDatabase, id: i64, user_id: i64) {
    sqlx::query(
        "INSERT INTO addresses (id, user_id, line1, city, state, created_at) \
         VALUES ($1, $2, '1 Test Close', 'Lagos', 'Lagos', $3)",
    )
    .bind(id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .expect("Error seeding address");
}

/// Seeds a published design with one fabric option (+₦20.00), one add-on (₦50.00) and one "XL"
/// size pricing (+₦10.00).
#[cfg(feature = "sqlite")]
pub async fn seed_design(db: &SqliteDatabase, id: i64, designer_id: i64, base_price: Money) {
    sqlx::query(
        "INSERT INTO designs (id, designer_id, title, base_price, currency, is_published, is_active, created_at) \
         VALUES ($1, $2, 'Agbada', $3, 'NGN', 1, 1, $4)",
    )
    .bind(id)
    .bind(designer_id)
    .bind(base_price)
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .expect("Error seeding design");
    sqlx::query(
        "INSERT INTO design_fabric_options (design_id, name, price_adjustment, is_available) \
         VALUES ($1, 'Ankara', 2000, 1)",
    )
    .bind(id)
    .execute(db.pool())
    .await
    .expect("Error seeding fabric option");
    sqlx::query("INSERT INTO design_add_ons (design_id, name, price, is_available) VALUES ($1, 'Embroidery', 5000, 1)")
        .bind(id)
        .execute(db.pool())
        .await
        .expect("Error seeding add-on");
    sqlx::query("INSERT INTO design_size_pricings (design_id, size_label, price_adjustment) VALUES ($1, 'XL', 1000)")
        .bind(id)
        .execute(db.pool())
        .await
        .expect("Error seeding size pricing");
}

/// Seeds the standard cast: customer #10 with address #1, designer #20 with design #1.
#[cfg(feature = "sqlite")]
pub async fn seed_marketplace(db: &SqliteDatabase) {
    seed_user(db, 10, "customer@test.stz", Role::Customer).await;
    seed_user(db, 20, "designer@test.stz", Role::Designer).await;
    seed_address(db, 1, 10).await;
    seed_design(db, 1, 20, Money::from(28_000)).await;
}
