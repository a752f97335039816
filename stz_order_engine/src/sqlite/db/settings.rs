//! Platform settings, stored as key/value text and parsed by the caller. The seeded keys are
//! `commission_percentage`, `return_courier_fee` (kobo) and `auto_confirm_days`.

use chrono::Utc;
use log::info;
use sqlx::SqliteConnection;

use crate::traits::OrderFlowError;

pub use crate::traits::{AUTO_CONFIRM_DAYS, COMMISSION_PERCENTAGE, DEFAULT_AUTO_CONFIRM_DAYS, RETURN_COURIER_FEE};

pub async fn fetch(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let value: Option<(String,)> =
        sqlx::query_as("SELECT value FROM platform_settings WHERE key = $1").bind(key).fetch_optional(conn).await?;
    Ok(value.map(|(v,)| v))
}

pub async fn update(key: &str, value: &str, updated_by: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO platform_settings (key, value, updated_by, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(updated_by)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    info!("⚙️ Platform setting {key} set to {value} by {updated_by}");
    Ok(())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OrderFlowError> {
    value
        .parse()
        .map_err(|_| OrderFlowError::precondition(format!("platform setting {key} has unparseable value '{value}'")))
}

pub async fn auto_confirm_days(conn: &mut SqliteConnection) -> Result<i64, OrderFlowError> {
    match fetch(AUTO_CONFIRM_DAYS, conn).await? {
        Some(v) => parse(AUTO_CONFIRM_DAYS, &v),
        None => Ok(DEFAULT_AUTO_CONFIRM_DAYS),
    }
}
