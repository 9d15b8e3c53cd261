//! Authentication guard middleware.
//!
//! Reads the `session` cookie, validates it against `user_sessions` in the DB,
//! and injects an `AuthUser` extension into the request for downstream handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    errors::AppError,
    models::UserRole,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session";

/// Authenticated principal extracted from a valid session. Role-specific
/// handlers narrow it further through the capability extractors in
/// [`super::role_guard`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id:  String,
    pub username: String,
    pub role:     UserRole,
}

/// Middleware: require any valid session cookie belonging to an active identity.
/// On success, inserts `AuthUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    #[derive(sqlx::FromRow)]
    struct SessionRow {
        id:       String,
        username: String,
        role:     UserRole,
    }

    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT u.id, u.username, u.role
         FROM user_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?
           AND s.expires_at > UTC_TIMESTAMP()
           AND u.is_active = 1
         LIMIT 1",
    )
    .bind(&token)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser {
        user_id:  row.id,
        username: row.username,
        role:     row.role,
    });

    Ok(next.run(req).await)
}
