//! Hospital admission: admin approval and rejection.

use serde::Serialize;

use crate::{
    db::Db,
    errors::{AppError, AppResult},
    models::Hospital,
};

const HOSPITAL_SELECT: &str =
    "SELECT id, user_id, name, address, phone, email, approved, created_at FROM hospitals";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HospitalFilter {
    Pending,
    Approved,
    All,
}

impl HospitalFilter {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.unwrap_or("pending") {
            "pending"  => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "all"      => Ok(Self::All),
            other => Err(AppError::BadRequest(format!(
                "Unknown status filter '{other}' (expected pending, approved or all)"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdmissionOutcome {
    pub hospital: Hospital,
    pub message:  String,
}

pub async fn list(pool: &Db, filter: HospitalFilter) -> AppResult<Vec<Hospital>> {
    let sql = match filter {
        HospitalFilter::Pending  => format!("{HOSPITAL_SELECT} WHERE approved = 0 ORDER BY created_at"),
        HospitalFilter::Approved => format!("{HOSPITAL_SELECT} WHERE approved = 1 ORDER BY name"),
        HospitalFilter::All      => format!("{HOSPITAL_SELECT} ORDER BY approved, name"),
    };
    let rows = sqlx::query_as::<_, Hospital>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Hospitals a parent may book with.
pub async fn list_bookable(pool: &Db) -> AppResult<Vec<Hospital>> {
    list(pool, HospitalFilter::Approved).await
}

pub async fn fetch(pool: &Db, hospital_id: &str) -> AppResult<Hospital> {
    let sql = format!("{HOSPITAL_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Hospital>(&sql)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

/// Mark the hospital approved and activate its identity. Approving twice is
/// a no-op apart from the message.
pub async fn approve(pool: &Db, hospital_id: &str) -> AppResult<AdmissionOutcome> {
    let mut tx = pool.begin().await?;

    let sql = format!("{HOSPITAL_SELECT} WHERE id = ? FOR UPDATE");
    let hospital = sqlx::query_as::<_, Hospital>(&sql)
        .bind(hospital_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

    if !hospital.approved {
        sqlx::query("UPDATE hospitals SET approved = 1 WHERE id = ?")
            .bind(hospital_id)
            .execute(&mut *tx)
            .await?;
    }
    if let Some(user_id) = &hospital.user_id {
        sqlx::query("UPDATE users SET is_active = 1, updated_at = UTC_TIMESTAMP() WHERE id = ? AND is_active = 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let message = if hospital.approved {
        format!("{} is already approved.", hospital.name)
    } else {
        tracing::info!(hospital_id, name = %hospital.name, "Hospital approved");
        format!("{} has been approved.", hospital.name)
    };

    Ok(AdmissionOutcome { hospital: fetch(pool, hospital_id).await?, message })
}

/// Remove a hospital registration together with its identity.
///
/// Rows that reference the hospital or its identity are deleted first, in
/// one transaction, so nothing is left dangling if any step fails.
pub async fn reject(pool: &Db, hospital_id: &str) -> AppResult<AdmissionOutcome> {
    let mut tx = pool.begin().await?;

    let sql = format!("{HOSPITAL_SELECT} WHERE id = ? FOR UPDATE");
    let hospital = sqlx::query_as::<_, Hospital>(&sql)
        .bind(hospital_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

    let appointments = sqlx::query("DELETE FROM appointments WHERE hospital_id = ?")
        .bind(hospital_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM inventory WHERE hospital_id = ?")
        .bind(hospital_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM hospitals WHERE id = ?")
        .bind(hospital_id)
        .execute(&mut *tx)
        .await?;

    if let Some(user_id) = &hospital.user_id {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(hospital_id, name = %hospital.name, appointments, "Hospital rejected and removed");
    let message = format!("{} has been rejected and removed.", hospital.name);
    Ok(AdmissionOutcome { hospital, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_to_pending_queue() {
        assert_eq!(HospitalFilter::parse(None).unwrap(), HospitalFilter::Pending);
        assert_eq!(HospitalFilter::parse(Some("all")).unwrap(), HospitalFilter::All);
        assert_eq!(HospitalFilter::parse(Some("approved")).unwrap(), HospitalFilter::Approved);
    }

    #[test]
    fn unknown_filter_is_bad_request() {
        assert!(matches!(HospitalFilter::parse(Some("rejected")), Err(AppError::BadRequest(_))));
    }

    use crate::{db::fixtures, models::AppointmentStatus};
    use sqlx::MySqlPool;

    async fn identity_of(pool: &MySqlPool, hospital_id: &str) -> String {
        let user_id: Option<String> = sqlx::query_scalar("SELECT user_id FROM hospitals WHERE id = ?")
            .bind(hospital_id)
            .fetch_one(pool)
            .await
            .unwrap();
        user_id.unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn approving_activates_the_identity_and_is_idempotent(pool: MySqlPool) {
        let hospital = fixtures::hospital(&pool, "Eastside", false).await;
        let user_id = identity_of(&pool, &hospital).await;

        let outcome = approve(&pool, &hospital).await.unwrap();
        assert_eq!(outcome.message, "Eastside has been approved.");
        assert!(outcome.hospital.approved);
        let active: bool = sqlx::query_scalar("SELECT is_active FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(active);

        let again = approve(&pool, &hospital).await.unwrap();
        assert_eq!(again.message, "Eastside is already approved.");
        assert_eq!(list(&pool, HospitalFilter::Pending).await.unwrap().len(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejecting_removes_everything_tied_to_the_hospital(pool: MySqlPool) {
        let hospital = fixtures::hospital(&pool, "Eastside", false).await;
        let user_id  = identity_of(&pool, &hospital).await;
        let vaccine  = fixtures::vaccine(&pool, "Polio").await;
        fixtures::stock(&pool, &hospital, &vaccine, 4).await;
        let parent = fixtures::parent(&pool, "alice").await;
        let child  = fixtures::child(&pool, &parent, "Bob").await;
        fixtures::appointment(&pool, &parent, &child, &hospital, Some(vaccine.as_str()), AppointmentStatus::Pending).await;

        let outcome = reject(&pool, &hospital).await.unwrap();
        assert_eq!(outcome.message, "Eastside has been rejected and removed.");

        assert_eq!(fixtures::count(&pool, "appointments", "hospital_id", &hospital).await, 0);
        assert_eq!(fixtures::count(&pool, "inventory", "hospital_id", &hospital).await, 0);
        assert_eq!(fixtures::count(&pool, "hospitals", "id", &hospital).await, 0);
        assert_eq!(fixtures::count(&pool, "users", "id", &user_id).await, 0);
        assert_eq!(fixtures::count(&pool, "children", "id", &child).await, 1);
        assert_eq!(fixtures::count(&pool, "vaccines", "id", &vaccine).await, 1);

        assert!(matches!(reject(&pool, &hospital).await, Err(AppError::NotFound)));
    }
}
