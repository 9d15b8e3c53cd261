//! Parent-side booking, listing and cancellation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::AppResult,
    middleware::role_guard::ParentCtx,
    models::{Appointment, Child, Hospital, Vaccine},
    services::{
        appointments::{self, AppointmentTimeline, NewAppointment},
        hospitals,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments",             get(list_appointments).post(book_appointment))
        .route("/appointments/options",     get(booking_options))
        .route("/appointments/{id}/cancel", post(cancel_appointment))
}

// ── Payload types ────────────────────────────────────────────

#[derive(Deserialize)]
struct BookBody {
    child_id:    String,
    hospital_id: String,
    vaccine_id:  Option<String>,
    date:        NaiveDate,
    time:        NaiveTime,
    #[serde(default)]
    notes:       String,
}

impl From<BookBody> for NewAppointment {
    fn from(body: BookBody) -> Self {
        NewAppointment {
            child_id:    body.child_id,
            hospital_id: body.hospital_id,
            // Forms send an empty string for "no vaccine".
            vaccine_id:  body.vaccine_id.filter(|v| !v.trim().is_empty()),
            date:        body.date,
            time:        body.time,
            notes:       body.notes.trim().to_owned(),
        }
    }
}

#[derive(Serialize)]
struct BookingOptions {
    children:  Vec<Child>,
    hospitals: Vec<Hospital>,
    vaccines:  Vec<Vaccine>,
}

// ── Handlers ─────────────────────────────────────────────────

/// Everything a booking form may offer. Unapproved hospitals never appear.
async fn booking_options(
    State(state): State<AppState>,
    parent: ParentCtx,
) -> AppResult<Json<BookingOptions>> {
    let pool = &state.pool;
    let children = sqlx::query_as::<_, Child>(
        "SELECT id, parent_id, name, date_of_birth, gender, blood_group
         FROM children WHERE parent_id = ? ORDER BY name",
    )
    .bind(&parent.parent_id)
    .fetch_all(pool)
    .await?;
    let hospitals = hospitals::list_bookable(pool).await?;
    let vaccines = sqlx::query_as::<_, Vaccine>(
        "SELECT id, name, description, recommended_age FROM vaccines ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(BookingOptions { children, hospitals, vaccines }))
}

async fn list_appointments(
    State(state): State<AppState>,
    parent: ParentCtx,
) -> AppResult<Json<AppointmentTimeline>> {
    let rows = appointments::list_for_parent(&state.pool, &parent.parent_id).await?;
    Ok(Json(appointments::split_by_date(rows, Utc::now().date_naive())))
}

async fn book_appointment(
    State(state): State<AppState>,
    parent: ParentCtx,
    Json(body): Json<BookBody>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    let appointment = appointments::book(
        &state.pool,
        &parent.parent_id,
        body.into(),
        Utc::now().date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn cancel_appointment(
    State(state): State<AppState>,
    parent: ParentCtx,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    let appointment = appointments::cancel_for_parent(&state.pool, &parent.parent_id, &id).await?;
    Ok(Json(appointment))
}
