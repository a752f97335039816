//! Reads over the collaborator records (users, addresses, designs and their options). The CRUD
//! surfaces for these live outside this crate; the order flow only consumes them.
use sqlx::SqliteConnection;

use crate::db_types::{AddOn, Address, Design, DesignRecord, FabricOption, SizePricing, User};

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await
}

pub async fn fetch_address_for_user(
    address_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

/// Fetches a design with all of its selectable options in one go.
pub async fn fetch_design_record(
    design_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DesignRecord>, sqlx::Error> {
    let design: Option<Design> =
        sqlx::query_as("SELECT * FROM designs WHERE id = $1").bind(design_id).fetch_optional(&mut *conn).await?;
    let Some(design) = design else {
        return Ok(None);
    };
    let fabric_options: Vec<FabricOption> =
        sqlx::query_as("SELECT * FROM design_fabric_options WHERE design_id = $1")
            .bind(design_id)
            .fetch_all(&mut *conn)
            .await?;
    let add_ons: Vec<AddOn> = sqlx::query_as("SELECT * FROM design_add_ons WHERE design_id = $1")
        .bind(design_id)
        .fetch_all(&mut *conn)
        .await?;
    let size_pricings: Vec<SizePricing> = sqlx::query_as("SELECT * FROM design_size_pricings WHERE design_id = $1")
        .bind(design_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(Some(DesignRecord { design, fabric_options, add_ons, size_pricings }))
}
