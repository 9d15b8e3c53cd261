//! Capability extractors.
//!
//! Each extractor reads the `AuthUser` injected by `require_auth`, rejects
//! callers holding a different role, and resolves the caller's profile row so
//! handlers receive the ids they scope their queries with.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    errors::{AppError, AppResult},
    middleware::auth_guard::AuthUser,
    models::UserRole,
    state::AppState,
};

fn auth_user(parts: &Parts) -> AppResult<&AuthUser> {
    parts.extensions.get::<AuthUser>().ok_or(AppError::Unauthorized)
}

/// Caller is a parent; `parent_id` is the `parents.id` of their profile.
#[derive(Debug, Clone)]
pub struct ParentCtx {
    pub parent_id: String,
}

/// Caller is an approved hospital; `hospital_id` is their `hospitals.id`.
#[derive(Debug, Clone)]
pub struct HospitalCtx {
    pub hospital_id: String,
}

/// Caller is the superuser.
#[derive(Debug, Clone)]
pub struct AdminCtx {
    pub user_id: String,
}

impl FromRequestParts<AppState> for ParentCtx {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = auth_user(parts)?;
        if user.role != UserRole::Parent {
            return Err(AppError::Forbidden);
        }

        let parent_id: String = sqlx::query_scalar("SELECT id FROM parents WHERE user_id = ?")
            .bind(&user.user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(AppError::Forbidden)?;

        Ok(ParentCtx { parent_id })
    }
}

impl FromRequestParts<AppState> for HospitalCtx {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = auth_user(parts)?;
        if user.role != UserRole::Hospital {
            return Err(AppError::Forbidden);
        }

        #[derive(sqlx::FromRow)]
        struct HospitalRow {
            id:       String,
            approved: bool,
        }

        let row = sqlx::query_as::<_, HospitalRow>(
            "SELECT id, approved FROM hospitals WHERE user_id = ? LIMIT 1",
        )
        .bind(&user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::Forbidden)?;

        if !row.approved {
            return Err(AppError::AccessDenied(
                "Your hospital registration is pending admin approval.".into(),
            ));
        }

        Ok(HospitalCtx { hospital_id: row.id })
    }
}

impl FromRequestParts<AppState> for AdminCtx {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let user = auth_user(parts)?;
        if user.role != UserRole::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminCtx { user_id: user.user_id.clone() })
    }
}
