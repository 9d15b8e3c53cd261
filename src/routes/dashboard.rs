//! Landing summaries for parents and hospitals.

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::{
    errors::AppResult,
    middleware::role_guard::{HospitalCtx, ParentCtx},
    models::{AppointmentStatus, Hospital, Inventory, Parent},
    services::{hospitals, inventory},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/parent/dashboard",   get(parent_dashboard))
        .route("/hospital/dashboard", get(hospital_dashboard))
}

#[derive(Serialize)]
struct ParentDashboard {
    parent:                Parent,
    children:              i64,
    upcoming_appointments: i64,
}

#[derive(Serialize)]
struct HospitalDashboard {
    hospital:            Hospital,
    appointments:        BTreeMap<&'static str, i64>,
    low_stock_threshold: i32,
    low_stock:           Vec<Inventory>,
}

async fn parent_dashboard(
    State(state): State<AppState>,
    ctx: ParentCtx,
) -> AppResult<Json<ParentDashboard>> {
    let pool = &state.pool;
    let parent = sqlx::query_as::<_, Parent>(
        "SELECT p.id, p.user_id, u.username, u.email, p.phone_number, p.address
         FROM parents p
         JOIN users u ON u.id = p.user_id
         WHERE p.id = ?",
    )
    .bind(&ctx.parent_id)
    .fetch_one(pool)
    .await?;

    let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children WHERE parent_id = ?")
        .bind(&ctx.parent_id)
        .fetch_one(pool)
        .await?;
    let upcoming_appointments: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM appointments
         WHERE parent_id = ? AND date >= ? AND status <> 'cancelled'",
    )
    .bind(&ctx.parent_id)
    .bind(Utc::now().date_naive())
    .fetch_one(pool)
    .await?;

    Ok(Json(ParentDashboard { parent, children, upcoming_appointments }))
}

async fn hospital_dashboard(
    State(state): State<AppState>,
    ctx: HospitalCtx,
) -> AppResult<Json<HospitalDashboard>> {
    let pool = &state.pool;
    let hospital = hospitals::fetch(pool, &ctx.hospital_id).await?;

    let counts: Vec<(AppointmentStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM appointments WHERE hospital_id = ? GROUP BY status",
    )
    .bind(&ctx.hospital_id)
    .fetch_all(pool)
    .await?;

    // Every status is reported, including those with no appointments.
    let mut appointments: BTreeMap<&'static str, i64> =
        AppointmentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for (status, count) in counts {
        appointments.insert(status.as_str(), count);
    }

    let threshold = state.config.low_stock_threshold;
    let low_stock = inventory::low_stock(pool, &ctx.hospital_id, threshold).await?;

    Ok(Json(HospitalDashboard {
        hospital,
        appointments,
        low_stock_threshold: threshold,
        low_stock,
    }))
}
