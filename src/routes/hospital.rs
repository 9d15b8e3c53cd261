//! Review, approval and status changes for the calling hospital's appointments.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    errors::{AppError, AppResult},
    middleware::role_guard::HospitalCtx,
    models::{Appointment, AppointmentStatus},
    services::appointments::{self, ApprovalOutcome, StatusBuckets},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hospital/appointments",              get(list_appointments))
        .route("/hospital/appointments/{id}/status",  patch(update_status))
        .route("/hospital/appointments/{id}/approve", post(approve_appointment))
}

#[derive(Deserialize)]
struct UpdateStatusBody {
    status: String,
}

async fn list_appointments(
    State(state): State<AppState>,
    hospital: HospitalCtx,
) -> AppResult<Json<StatusBuckets>> {
    let rows = appointments::list_for_hospital(&state.pool, &hospital.hospital_id).await?;
    Ok(Json(appointments::group_by_status(rows)))
}

/// Generic status overwrite; see `STATUS_UPDATE_POLICY` for how `approved`
/// is treated.
async fn update_status(
    State(state): State<AppState>,
    hospital: HospitalCtx,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> AppResult<Json<Appointment>> {
    let target = body
        .status
        .parse::<AppointmentStatus>()
        .map_err(|msg| AppError::field("status", msg))?;

    let appointment = appointments::set_status(
        &state.pool,
        &hospital.hospital_id,
        &id,
        target,
        state.config.status_update_policy,
    )
    .await?;
    Ok(Json(appointment))
}

/// Quick-approve: consumes one unit of the appointment's vaccine.
async fn approve_appointment(
    State(state): State<AppState>,
    hospital: HospitalCtx,
    Path(id): Path<String>,
) -> AppResult<Json<ApprovalOutcome>> {
    let outcome = appointments::approve(&state.pool, &hospital.hospital_id, &id).await?;
    Ok(Json(outcome))
}
