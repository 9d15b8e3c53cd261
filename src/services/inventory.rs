//! Per-hospital vaccine stock.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Db,
    errors::{AppError, AppResult},
    models::Inventory,
};

const INVENTORY_SELECT: &str =
    "SELECT i.id, i.hospital_id, i.vaccine_id, v.name AS vaccine_name, i.stock_quantity, i.updated_at
     FROM inventory i
     JOIN vaccines v ON v.id = i.vaccine_id";

/// One catalog vaccine as seen from a hospital: the record is absent until
/// the hospital first sets a quantity for it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct InventoryLine {
    pub vaccine_id:      String,
    pub vaccine_name:    String,
    pub recommended_age: String,
    pub inventory_id:    Option<String>,
    pub stock_quantity:  Option<i32>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct VaccineOption {
    pub id:   String,
    pub name: String,
}

/// Stock is an absolute count; negative values never reach the database.
pub fn check_stock_quantity(raw: i64) -> AppResult<i32> {
    if raw < 0 {
        return Err(AppError::field("stock_quantity", "Stock quantity cannot be negative."));
    }
    i32::try_from(raw).map_err(|_| AppError::field("stock_quantity", "Stock quantity is too large."))
}

pub async fn list_for_hospital(pool: &Db, hospital_id: &str) -> AppResult<Vec<InventoryLine>> {
    let rows = sqlx::query_as::<_, InventoryLine>(
        "SELECT v.id AS vaccine_id, v.name AS vaccine_name, v.recommended_age,
                i.id AS inventory_id, i.stock_quantity
         FROM vaccines v
         LEFT JOIN inventory i ON i.vaccine_id = v.id AND i.hospital_id = ?
         ORDER BY v.name",
    )
    .bind(hospital_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_record(pool: &Db, hospital_id: &str, inventory_id: &str) -> AppResult<Inventory> {
    let sql = format!("{INVENTORY_SELECT} WHERE i.id = ? AND i.hospital_id = ?");
    sqlx::query_as::<_, Inventory>(&sql)
        .bind(inventory_id)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

async fn fetch_by_vaccine(pool: &Db, hospital_id: &str, vaccine_id: &str) -> AppResult<Inventory> {
    let sql = format!("{INVENTORY_SELECT} WHERE i.hospital_id = ? AND i.vaccine_id = ?");
    sqlx::query_as::<_, Inventory>(&sql)
        .bind(hospital_id)
        .bind(vaccine_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

/// Overwrite the quantity of an existing record owned by the hospital.
pub async fn set_stock(pool: &Db, hospital_id: &str, inventory_id: &str, quantity: i32) -> AppResult<Inventory> {
    let before = fetch_record(pool, hospital_id, inventory_id).await?;

    sqlx::query(
        "UPDATE inventory SET stock_quantity = ?, updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND hospital_id = ?",
    )
    .bind(quantity)
    .bind(inventory_id)
    .bind(hospital_id)
    .execute(pool)
    .await?;

    tracing::info!(
        hospital_id,
        vaccine = %before.vaccine_name,
        from = before.stock_quantity,
        to = quantity,
        "Stock updated"
    );
    fetch_record(pool, hospital_id, inventory_id).await
}

/// Set the quantity for a vaccine, creating the hospital's record on first use.
pub async fn set_stock_for_vaccine(
    pool: &Db,
    hospital_id: &str,
    vaccine_id: &str,
    quantity: i32,
) -> AppResult<Inventory> {
    let vaccine_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vaccines WHERE id = ?)")
        .bind(vaccine_id)
        .fetch_one(pool)
        .await?;
    if !vaccine_exists {
        return Err(AppError::NotFound);
    }

    let created = sqlx::query(
        "INSERT IGNORE INTO inventory (id, hospital_id, vaccine_id, stock_quantity, updated_at)
         VALUES (?, ?, ?, 0, UTC_TIMESTAMP())",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(hospital_id)
    .bind(vaccine_id)
    .execute(pool)
    .await?
    .rows_affected();
    if created > 0 {
        tracing::info!(hospital_id, vaccine_id, "Inventory record created");
    }

    let record = fetch_by_vaccine(pool, hospital_id, vaccine_id).await?;
    set_stock(pool, hospital_id, &record.id, quantity).await
}

/// Vaccines with at least one unit in stock at an existing hospital.
pub async fn available_vaccines(pool: &Db, hospital_id: &str) -> AppResult<Vec<VaccineOption>> {
    let hospital_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hospitals WHERE id = ?)")
        .bind(hospital_id)
        .fetch_one(pool)
        .await?;
    if !hospital_exists {
        return Err(AppError::NotFound);
    }

    let rows = sqlx::query_as::<_, VaccineOption>(
        "SELECT v.id, v.name
         FROM inventory i
         JOIN vaccines v ON v.id = i.vaccine_id
         WHERE i.hospital_id = ? AND i.stock_quantity > 0
         ORDER BY v.name",
    )
    .bind(hospital_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn low_stock(pool: &Db, hospital_id: &str, threshold: i32) -> AppResult<Vec<Inventory>> {
    let sql = format!("{INVENTORY_SELECT} WHERE i.hospital_id = ? AND i.stock_quantity <= ? ORDER BY i.stock_quantity, v.name");
    let rows = sqlx::query_as::<_, Inventory>(&sql)
        .bind(hospital_id)
        .bind(threshold)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
