//! Hospital admission and vaccine catalog maintenance.
//! Every handler takes an `AdminCtx`, so non-admin callers are rejected
//! before any work is done.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::email::{send_hospital_approved_email, send_hospital_rejected_email},
    errors::{is_unique_violation, AppError, AppResult},
    middleware::role_guard::AdminCtx,
    models::{Hospital, Vaccine},
    services::hospitals::{self, AdmissionOutcome, HospitalFilter},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/hospitals",              get(list_hospitals))
        .route("/admin/hospitals/{id}/approve", post(approve_hospital))
        .route("/admin/hospitals/{id}/reject",  post(reject_hospital))
        .route("/admin/vaccines",               post(create_vaccine))
        .route("/admin/vaccines/{id}",          put(update_vaccine))
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct HospitalQuery {
    status: Option<String>,
}

#[derive(Deserialize, Validate)]
struct VaccineBody {
    #[validate(length(min = 1, max = 100, message = "Name is required (at most 100 characters)"))]
    name:            String,
    #[serde(default)]
    description:     String,
    #[serde(default)]
    #[validate(length(max = 50, message = "Recommended age is at most 50 characters"))]
    recommended_age: String,
}

// ── Hospitals ────────────────────────────────────────────────

async fn list_hospitals(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Query(query): Query<HospitalQuery>,
) -> AppResult<Json<Vec<Hospital>>> {
    let filter = HospitalFilter::parse(query.status.as_deref())?;
    Ok(Json(hospitals::list(&state.pool, filter).await?))
}

async fn approve_hospital(
    State(state): State<AppState>,
    admin: AdminCtx,
    Path(id): Path<String>,
) -> AppResult<Json<AdmissionOutcome>> {
    let outcome = hospitals::approve(&state.pool, &id).await?;
    tracing::info!(admin = %admin.user_id, hospital_id = %id, "{}", outcome.message);

    if let Err(err) = send_hospital_approved_email(&state.config, &outcome.hospital.email, &outcome.hospital.name).await {
        tracing::warn!(error = %err, hospital_id = %id, "Approval email failed");
    }
    Ok(Json(outcome))
}

async fn reject_hospital(
    State(state): State<AppState>,
    admin: AdminCtx,
    Path(id): Path<String>,
) -> AppResult<Json<AdmissionOutcome>> {
    let outcome = hospitals::reject(&state.pool, &id).await?;
    tracing::info!(admin = %admin.user_id, hospital_id = %id, "{}", outcome.message);

    if let Err(err) = send_hospital_rejected_email(&state.config, &outcome.hospital.email, &outcome.hospital.name).await {
        tracing::warn!(error = %err, hospital_id = %id, "Rejection email failed");
    }
    Ok(Json(outcome))
}

// ── Vaccine catalog ──────────────────────────────────────────

async fn create_vaccine(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Json(body): Json<VaccineBody>,
) -> AppResult<(StatusCode, Json<Vaccine>)> {
    body.validate()?;
    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();

    let inserted = sqlx::query(
        "INSERT INTO vaccines (id, name, description, recommended_age) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(body.name.trim())
    .bind(body.description.trim())
    .bind(body.recommended_age.trim())
    .execute(pool)
    .await;
    if let Err(ref err) = inserted {
        if is_unique_violation(err) {
            return Err(AppError::Conflict(format!("A vaccine named {} already exists", body.name.trim())));
        }
    }
    inserted?;

    tracing::info!(vaccine_id = %id, name = %body.name, "Vaccine added to catalog");
    let row = fetch_vaccine(pool, &id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_vaccine(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Path(id): Path<String>,
    Json(body): Json<VaccineBody>,
) -> AppResult<Json<Vaccine>> {
    body.validate()?;
    let pool = &state.pool;
    fetch_vaccine(pool, &id).await?;

    let updated = sqlx::query(
        "UPDATE vaccines SET name = ?, description = ?, recommended_age = ? WHERE id = ?",
    )
    .bind(body.name.trim())
    .bind(body.description.trim())
    .bind(body.recommended_age.trim())
    .bind(&id)
    .execute(pool)
    .await;
    if let Err(ref err) = updated {
        if is_unique_violation(err) {
            return Err(AppError::Conflict(format!("A vaccine named {} already exists", body.name.trim())));
        }
    }
    updated?;

    Ok(Json(fetch_vaccine(pool, &id).await?))
}

async fn fetch_vaccine(pool: &crate::db::Db, id: &str) -> AppResult<Vaccine> {
    sqlx::query_as::<_, Vaccine>(
        "SELECT id, name, description, recommended_age FROM vaccines WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vaccine_body_needs_a_name() {
        let body: VaccineBody = serde_json::from_str(r#"{"name":""}"#).unwrap();
        let err: AppError = body.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("name")));

        let body: VaccineBody =
            serde_json::from_str(r#"{"name":"MMR","recommended_age":"12-15 months"}"#).unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.description, "");
    }
}
