//! Vaccine catalog reads and the per-hospital availability lookup used by
//! the booking form.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    errors::AppResult,
    models::Vaccine,
    services::inventory::{self, VaccineOption},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vaccines",                           get(list_vaccines))
        .route("/hospitals/{id}/available-vaccines",  get(available_vaccines))
}

async fn list_vaccines(State(state): State<AppState>) -> AppResult<Json<Vec<Vaccine>>> {
    let rows = sqlx::query_as::<_, Vaccine>(
        "SELECT id, name, description, recommended_age FROM vaccines ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

/// `[{id, name}]` of vaccines in stock; 404 when the hospital is unknown.
async fn available_vaccines(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<VaccineOption>>> {
    Ok(Json(inventory::available_vaccines(&state.pool, &id).await?))
}
