//! The calling hospital's vaccine stock.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    errors::AppResult,
    middleware::role_guard::HospitalCtx,
    models::Inventory,
    services::inventory::{self, InventoryLine},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hospital/inventory",                        get(list_inventory))
        .route("/hospital/inventory/{id}",                   put(update_stock))
        .route("/hospital/inventory/vaccines/{vaccine_id}",  put(set_stock_for_vaccine))
}

#[derive(Deserialize)]
struct StockBody {
    stock_quantity: i64,
}

async fn list_inventory(
    State(state): State<AppState>,
    hospital: HospitalCtx,
) -> AppResult<Json<Vec<InventoryLine>>> {
    Ok(Json(inventory::list_for_hospital(&state.pool, &hospital.hospital_id).await?))
}

async fn update_stock(
    State(state): State<AppState>,
    hospital: HospitalCtx,
    Path(id): Path<String>,
    Json(body): Json<StockBody>,
) -> AppResult<Json<Inventory>> {
    let quantity = inventory::check_stock_quantity(body.stock_quantity)?;
    let record = inventory::set_stock(&state.pool, &hospital.hospital_id, &id, quantity).await?;
    Ok(Json(record))
}

async fn set_stock_for_vaccine(
    State(state): State<AppState>,
    hospital: HospitalCtx,
    Path(vaccine_id): Path<String>,
    Json(body): Json<StockBody>,
) -> AppResult<Json<Inventory>> {
    let quantity = inventory::check_stock_quantity(body.stock_quantity)?;
    let record =
        inventory::set_stock_for_vaccine(&state.pool, &hospital.hospital_id, &vaccine_id, quantity).await?;
    Ok(Json(record))
}
