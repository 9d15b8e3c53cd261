//! CRUD for the calling parent's children.
//!
//! Every lookup is scoped by `parent_id`, so another family's child answers
//! exactly like a missing one (404).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::Db,
    errors::{AppError, AppResult},
    middleware::role_guard::ParentCtx,
    models::{Child, Gender},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/children",      get(list_children).post(create_child))
        .route("/children/{id}", get(get_child).put(update_child).delete(delete_child))
}

// ── Payload types ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct ChildBody {
    #[validate(length(min = 1, max = 100, message = "Name is required (at most 100 characters)"))]
    name:          String,
    date_of_birth: NaiveDate,
    gender:        Gender,
    #[serde(default)]
    #[validate(length(max = 5, message = "Blood group is at most 5 characters"))]
    blood_group:   String,
}

impl ChildBody {
    fn check(&self, today: NaiveDate) -> AppResult<()> {
        self.validate()?;
        if self.date_of_birth > today {
            return Err(AppError::field("date_of_birth", "Date of birth cannot be in the future."));
        }
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────

async fn fetch_owned(pool: &Db, parent_id: &str, child_id: &str) -> AppResult<Child> {
    sqlx::query_as::<_, Child>(
        "SELECT id, parent_id, name, date_of_birth, gender, blood_group
         FROM children
         WHERE id = ? AND parent_id = ?",
    )
    .bind(child_id)
    .bind(parent_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

// ── Handlers ─────────────────────────────────────────────────

async fn list_children(
    State(state): State<AppState>,
    parent: ParentCtx,
) -> AppResult<Json<Vec<Child>>> {
    let rows = sqlx::query_as::<_, Child>(
        "SELECT id, parent_id, name, date_of_birth, gender, blood_group
         FROM children
         WHERE parent_id = ?
         ORDER BY name",
    )
    .bind(&parent.parent_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn create_child(
    State(state): State<AppState>,
    parent: ParentCtx,
    Json(body): Json<ChildBody>,
) -> AppResult<(StatusCode, Json<Child>)> {
    body.check(Utc::now().date_naive())?;
    let pool = &state.pool;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO children (id, parent_id, name, date_of_birth, gender, blood_group)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&parent.parent_id)
    .bind(body.name.trim())
    .bind(body.date_of_birth)
    .bind(body.gender.as_str())
    .bind(body.blood_group.trim())
    .execute(pool)
    .await?;

    tracing::info!(child_id = %id, parent_id = %parent.parent_id, "Child added");
    let row = fetch_owned(pool, &parent.parent_id, &id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn get_child(
    State(state): State<AppState>,
    parent: ParentCtx,
    Path(id): Path<String>,
) -> AppResult<Json<Child>> {
    Ok(Json(fetch_owned(&state.pool, &parent.parent_id, &id).await?))
}

async fn update_child(
    State(state): State<AppState>,
    parent: ParentCtx,
    Path(id): Path<String>,
    Json(body): Json<ChildBody>,
) -> AppResult<Json<Child>> {
    let pool = &state.pool;
    fetch_owned(pool, &parent.parent_id, &id).await?;
    body.check(Utc::now().date_naive())?;

    sqlx::query(
        "UPDATE children
         SET name = ?, date_of_birth = ?, gender = ?, blood_group = ?
         WHERE id = ? AND parent_id = ?",
    )
    .bind(body.name.trim())
    .bind(body.date_of_birth)
    .bind(body.gender.as_str())
    .bind(body.blood_group.trim())
    .bind(&id)
    .bind(&parent.parent_id)
    .execute(pool)
    .await?;

    Ok(Json(fetch_owned(pool, &parent.parent_id, &id).await?))
}

/// Removes the child's appointments first, then the child, in one transaction.
async fn delete_child(
    State(state): State<AppState>,
    parent: ParentCtx,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;

    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM children WHERE id = ? AND parent_id = ?)",
    )
    .bind(&id)
    .bind(&parent.parent_id)
    .fetch_one(&mut *tx)
    .await?;
    if !owned {
        return Err(AppError::NotFound);
    }

    sqlx::query("DELETE FROM appointments WHERE child_id = ? AND parent_id = ?")
        .bind(&id)
        .bind(&parent.parent_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM children WHERE id = ? AND parent_id = ?")
        .bind(&id)
        .bind(&parent.parent_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(child_id = %id, parent_id = %parent.parent_id, "Child deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(dob: &str) -> ChildBody {
        ChildBody {
            name:          "Bob".into(),
            date_of_birth: NaiveDate::parse_from_str(dob, "%Y-%m-%d").unwrap(),
            gender:        Gender::Male,
            blood_group:   "O+".into(),
        }
    }

    #[test]
    fn birth_date_up_to_today_is_accepted() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert!(body("2020-01-01").check(today).is_ok());
        assert!(body("2025-06-10").check(today).is_ok());
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let err = body("2025-06-11").check(today).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("date_of_birth")));
    }

    #[test]
    fn blank_name_and_long_blood_group_are_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let mut b = body("2020-01-01");
        b.name = String::new();
        b.blood_group = "AB+ve!".into();
        match b.check(today).unwrap_err() {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("name"));
                assert!(fields.contains_key("blood_group"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_gender_fails_to_deserialize() {
        let raw = r#"{"name":"Bob","date_of_birth":"2020-01-01","gender":"Unknown"}"#;
        assert!(serde_json::from_str::<ChildBody>(raw).is_err());
        let ok = r#"{"name":"Bob","date_of_birth":"2020-01-01","gender":"Female"}"#;
        assert_eq!(serde_json::from_str::<ChildBody>(ok).unwrap().blood_group, "");
    }

    use crate::{db::fixtures, models::AppointmentStatus};
    use sqlx::MySqlPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn another_parents_child_answers_not_found(pool: MySqlPool) {
        let alice = fixtures::parent(&pool, "alice").await;
        let bob   = fixtures::child(&pool, &alice, "Bob").await;
        let carol = fixtures::parent(&pool, "carol").await;
        let state = AppState::with_pool(pool.clone());
        let as_carol = || ParentCtx { parent_id: carol.clone() };

        let err = get_child(State(state.clone()), as_carol(), Path(bob.clone())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        let err = update_child(State(state.clone()), as_carol(), Path(bob.clone()), Json(body("2021-01-01")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        let err = delete_child(State(state.clone()), as_carol(), Path(bob.clone())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        let Json(listed) = list_children(State(state), as_carol()).await.unwrap();
        assert!(listed.is_empty());

        let kept = fetch_owned(&pool, &alice, &bob).await.unwrap();
        assert_eq!(kept.name, "Bob");
        assert_eq!(kept.gender, Gender::Female);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn owner_updates_and_deletes_with_appointments(pool: MySqlPool) {
        let alice    = fixtures::parent(&pool, "alice").await;
        let bob      = fixtures::child(&pool, &alice, "Bob").await;
        let hospital = fixtures::hospital(&pool, "CityClinic", true).await;
        fixtures::appointment(&pool, &alice, &bob, &hospital, None, AppointmentStatus::Pending).await;
        let state = AppState::with_pool(pool.clone());
        let as_alice = || ParentCtx { parent_id: alice.clone() };

        let Json(updated) = update_child(State(state.clone()), as_alice(), Path(bob.clone()), Json(body("2021-01-01")))
            .await
            .unwrap();
        assert_eq!(updated.gender, Gender::Male);
        assert_eq!(updated.blood_group, "O+");

        let status = delete_child(State(state), as_alice(), Path(bob.clone())).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(fixtures::count(&pool, "appointments", "child_id", &bob).await, 0);
        assert_eq!(fixtures::count(&pool, "children", "id", &bob).await, 0);
    }
}
