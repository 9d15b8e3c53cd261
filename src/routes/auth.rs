use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, Transaction};
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{generate_token, hash_password, validate_password_strength, verify_password},
    db::Db,
    errors::{is_unique_violation, AppError, AppResult},
    middleware::auth_guard::{AuthUser, SESSION_COOKIE},
    models::UserRole,
    state::AppState,
};

const PENDING_APPROVAL: &str = "Your hospital registration is pending admin approval.";
const DEACTIVATED: &str = "This account has been deactivated.";

// ── Request / response types ──────────────────────────────────

#[derive(Deserialize, Validate)]
struct ParentRegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username is required (at most 150 characters)"))]
    username: String,
    #[validate(email(message = "Enter a valid email address"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    password_confirm: String,
    #[serde(default)]
    #[validate(length(max = 15, message = "Phone number is at most 15 characters"))]
    phone_number: String,
    #[serde(default)]
    address: String,
}

#[derive(Deserialize, Validate)]
struct HospitalRegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username is required (at most 150 characters)"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    password_confirm: String,
    #[validate(length(min = 1, max = 200, message = "Hospital name is required"))]
    name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    address: String,
    #[validate(length(min = 1, max = 15, message = "Phone is required (at most 15 characters)"))]
    phone: String,
    #[validate(email(message = "Enter a valid email address"))]
    email: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id:       String,
    username: String,
    role:     UserRole,
}

// ── Database row types ────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct UserRow {
    id:            String,
    username:      String,
    password_hash: String,
    role:          UserRole,
    is_active:     bool,
}

#[derive(sqlx::FromRow)]
struct HospitalLoginRow {
    id:            String,
    username:      String,
    password_hash: String,
    is_active:     bool,
    approved:      bool,
}

// ── Router ────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/parent/register",   post(parent_register))
        .route("/auth/hospital/register", post(hospital_register))
        .route("/auth/login",             post(login))
        .route("/auth/hospital/login",    post(hospital_login))
        .route("/auth/logout",            post(logout))
}

/// Routes that need the session middleware.
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

// ── Handlers ──────────────────────────────────────────────────

/// POST /auth/parent/register
async fn parent_register(
    State(state): State<AppState>,
    Json(body): Json<ParentRegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    body.validate()?;
    if !state.config.is_development() {
        validate_password_strength(&body.password)?;
    }
    ensure_username_free(pool, &body.username).await?;

    let hash      = hash_password(&body.password)?;
    let user_id   = Uuid::new_v4().to_string();
    let parent_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;
    insert_identity(&mut tx, NewIdentity {
        id:            &user_id,
        username:      body.username.trim(),
        email:         &body.email,
        password_hash: &hash,
        role:          UserRole::Parent,
        active:        true,
    })
    .await?;

    sqlx::query("INSERT INTO parents (id, user_id, phone_number, address) VALUES (?, ?, ?, ?)")
        .bind(&parent_id)
        .bind(&user_id)
        .bind(body.phone_number.trim())
        .bind(body.address.trim())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%user_id, %parent_id, "Parent registered");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message":   "Registration successful. Please log in.",
            "parent_id": parent_id,
        })),
    ))
}

/// POST /auth/hospital/register
///
/// The identity stays inactive until an admin approves the hospital.
async fn hospital_register(
    State(state): State<AppState>,
    Json(body): Json<HospitalRegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    body.validate()?;
    if !state.config.is_development() {
        validate_password_strength(&body.password)?;
    }
    ensure_username_free(pool, &body.username).await?;

    let phone_taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hospitals WHERE phone = ?)")
        .bind(body.phone.trim())
        .fetch_one(pool)
        .await?;
    if phone_taken {
        return Err(AppError::Conflict("A hospital with this phone number is already registered".into()));
    }
    let email_taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hospitals WHERE email = ?)")
        .bind(body.email.trim())
        .fetch_one(pool)
        .await?;
    if email_taken {
        return Err(AppError::Conflict("A hospital with this email is already registered".into()));
    }

    let hash        = hash_password(&body.password)?;
    let user_id     = Uuid::new_v4().to_string();
    let hospital_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;
    insert_identity(&mut tx, NewIdentity {
        id:            &user_id,
        username:      body.username.trim(),
        email:         body.email.trim(),
        password_hash: &hash,
        role:          UserRole::Hospital,
        active:        false,
    })
    .await?;

    let inserted = sqlx::query(
        "INSERT INTO hospitals (id, user_id, name, address, phone, email, approved, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, UTC_TIMESTAMP())",
    )
    .bind(&hospital_id)
    .bind(&user_id)
    .bind(body.name.trim())
    .bind(body.address.trim())
    .bind(body.phone.trim())
    .bind(body.email.trim())
    .execute(&mut *tx)
    .await;
    // The unique keys catch what the EXISTS checks raced past.
    if let Err(ref err) = inserted {
        if is_unique_violation(err) {
            return Err(AppError::Conflict("Phone or email is already registered".into()));
        }
    }
    inserted?;
    tx.commit().await?;

    tracing::info!(%user_id, %hospital_id, name = %body.name, "Hospital registered, awaiting approval");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message":     "Registration received. An administrator will review your hospital before you can log in.",
            "hospital_id": hospital_id,
        })),
    ))
}

/// POST /auth/login (parents and the administrator)
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash, role, is_active FROM users WHERE username = ? LIMIT 1",
    )
    .bind(body.username.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    verify_password(&body.password, &row.password_hash)?;

    let role = row.role;
    if role == UserRole::Hospital {
        return Err(AppError::AccessDenied(
            "Hospital accounts must sign in through the hospital login.".into(),
        ));
    }
    if !row.is_active {
        return Err(AppError::AccessDenied(DEACTIVATED.into()));
    }

    start_session(&state, &cookies, &row.id).await?;
    tracing::info!(user_id = %row.id, %role, "Login");

    Ok(Json(UserResponse { id: row.id, username: row.username, role }))
}

/// POST /auth/hospital/login
async fn hospital_login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let row = sqlx::query_as::<_, HospitalLoginRow>(
        "SELECT u.id, u.username, u.password_hash, u.is_active, h.approved
         FROM users u
         JOIN hospitals h ON h.user_id = u.id
         WHERE u.username = ? AND u.role = 'hospital'
         LIMIT 1",
    )
    .bind(body.username.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    verify_password(&body.password, &row.password_hash)?;

    if !row.approved {
        return Err(AppError::AccessDenied(PENDING_APPROVAL.into()));
    }
    if !row.is_active {
        return Err(AppError::AccessDenied(DEACTIVATED.into()));
    }

    start_session(&state, &cookies, &row.id).await?;
    tracing::info!(user_id = %row.id, "Hospital login");

    Ok(Json(UserResponse { id: row.id, username: row.username, role: UserRole::Hospital }))
}

/// POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        sqlx::query("DELETE FROM user_sessions WHERE token = ?")
            .bind(&token)
            .execute(&state.pool)
            .await?;
    }
    clear_session_cookie(&cookies);
    Ok(Json(serde_json::json!({ "message": "You have been logged out." })))
}

/// GET /auth/me
async fn me(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse { id: user.user_id, username: user.username, role: user.role })
}

// ── Internal helpers ──────────────────────────────────────────

struct NewIdentity<'a> {
    id:            &'a str,
    username:      &'a str,
    email:         &'a str,
    password_hash: &'a str,
    role:          UserRole,
    active:        bool,
}

/// Insert a `users` row. A username that slipped past `ensure_username_free`
/// is still reported as a conflict.
async fn insert_identity(tx: &mut Transaction<'_, MySql>, identity: NewIdentity<'_>) -> AppResult<()> {
    let inserted = sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_active)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(identity.id)
    .bind(identity.username)
    .bind(identity.email)
    .bind(identity.password_hash)
    .bind(identity.role.as_str())
    .bind(identity.active)
    .execute(&mut **tx)
    .await;
    match inserted {
        Err(ref err) if is_unique_violation(err) => {
            Err(AppError::Conflict("Username is already taken".into()))
        }
        other => other.map(|_| ()).map_err(AppError::from),
    }
}

async fn ensure_username_free(pool: &Db, username: &str) -> AppResult<()> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username.trim())
        .fetch_one(pool)
        .await?;
    if taken {
        return Err(AppError::Conflict("Username is already taken".into()));
    }
    Ok(())
}

async fn start_session(state: &AppState, cookies: &Cookies, user_id: &str) -> AppResult<()> {
    let days  = state.config.session_days;
    let token = create_session(&state.pool, user_id, days).await?;
    set_session_cookie(cookies, &token, days);
    Ok(())
}

async fn create_session(pool: &Db, user_id: &str, days: i64) -> AppResult<String> {
    let token = generate_token();
    let id    = Uuid::new_v4().to_string();
    let expires_at =
        (Utc::now() + chrono::Duration::days(days)).naive_utc();

    sqlx::query(
        "INSERT INTO user_sessions (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(&token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(token)
}

fn set_session_cookie(cookies: &Cookies, token: &str, days: i64) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::days(days))
        .build();
    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(cookie);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_body() -> ParentRegisterRequest {
        ParentRegisterRequest {
            username:         "alice".into(),
            email:            "alice@example.com".into(),
            password:         "Vaccinate2025".into(),
            password_confirm: "Vaccinate2025".into(),
            phone_number:     "5550100".into(),
            address:          "1 Elm Street".into(),
        }
    }

    #[test]
    fn parent_registration_accepts_well_formed_body() {
        assert!(parent_body().validate().is_ok());
    }

    #[test]
    fn mismatched_passwords_are_a_field_error() {
        let mut body = parent_body();
        body.password_confirm = "Vaccinate2026".into();
        let err: AppError = body.validate().unwrap_err().into();
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields["password_confirm"], vec!["Passwords do not match".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn hospital_registration_requires_contact_details() {
        let body = HospitalRegisterRequest {
            username:         "cityclinic".into(),
            password:         "Vaccinate2025".into(),
            password_confirm: "Vaccinate2025".into(),
            name:             "CityClinic".into(),
            address:          String::new(),
            phone:            "5550199".into(),
            email:            "not-an-email".into(),
        };
        let err: AppError = body.validate().unwrap_err().into();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("address"));
                assert!(fields.contains_key("email"));
                assert!(!fields.contains_key("phone"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    use crate::db::fixtures;
    use sqlx::MySqlPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn username_taken_between_check_and_insert_is_a_conflict(pool: MySqlPool) {
        ensure_username_free(&pool, "cityclinic").await.unwrap();
        fixtures::user(&pool, "cityclinic", UserRole::Parent, true).await;

        let mut tx = pool.begin().await.unwrap();
        let err = insert_identity(&mut tx, NewIdentity {
            id:            "3f8a2c1e-0000-4000-8000-000000000001",
            username:      "cityclinic",
            email:         "desk@cityclinic.example",
            password_hash: "not-a-hash",
            role:          UserRole::Hospital,
            active:        false,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Username is already taken"));
        assert!(matches!(ensure_username_free(&pool, "cityclinic").await, Err(AppError::Conflict(_))));
    }
}
