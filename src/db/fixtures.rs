//! Row builders for tests that run against a migrated MySQL database.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::{
    db::Db,
    models::{AppointmentStatus, UserRole},
};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn next_week() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(7)
}

pub async fn user(pool: &Db, username: &str, role: UserRole, active: bool) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_active)
         VALUES (?, ?, NULL, 'not-a-hash', ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(role.as_str())
    .bind(active)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Returns the `parents.id`.
pub async fn parent(pool: &Db, username: &str) -> String {
    let user_id = user(pool, username, UserRole::Parent, true).await;
    let id = new_id();
    sqlx::query("INSERT INTO parents (id, user_id, phone_number, address) VALUES (?, ?, '', '')")
        .bind(&id)
        .bind(&user_id)
        .execute(pool)
        .await
        .unwrap();
    id
}

/// Returns the `hospitals.id`. The identity is active only when approved.
pub async fn hospital(pool: &Db, name: &str, approved: bool) -> String {
    let user_id = user(pool, &name.to_lowercase(), UserRole::Hospital, approved).await;
    let id = new_id();
    sqlx::query(
        "INSERT INTO hospitals (id, user_id, name, address, phone, email, approved)
         VALUES (?, ?, ?, '1 Main Street', ?, ?, ?)",
    )
    .bind(&id)
    .bind(&user_id)
    .bind(name)
    .bind(&id[..15])
    .bind(format!("{}@example.com", name.to_lowercase()))
    .bind(approved)
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn vaccine(pool: &Db, name: &str) -> String {
    let id = new_id();
    sqlx::query("INSERT INTO vaccines (id, name, description, recommended_age) VALUES (?, ?, '', '')")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

/// Returns the `inventory.id`.
pub async fn stock(pool: &Db, hospital_id: &str, vaccine_id: &str, quantity: i32) -> String {
    let id = new_id();
    sqlx::query("INSERT INTO inventory (id, hospital_id, vaccine_id, stock_quantity) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(hospital_id)
        .bind(vaccine_id)
        .bind(quantity)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn child(pool: &Db, parent_id: &str, name: &str) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO children (id, parent_id, name, date_of_birth, gender, blood_group)
         VALUES (?, ?, ?, ?, 'Female', '')",
    )
    .bind(&id)
    .bind(parent_id)
    .bind(name)
    .bind(NaiveDate::from_ymd_opt(2022, 3, 1).unwrap())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn appointment(
    pool: &Db,
    parent_id: &str,
    child_id: &str,
    hospital_id: &str,
    vaccine_id: Option<&str>,
    status: AppointmentStatus,
) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO appointments (id, parent_id, child_id, hospital_id, vaccine_id, date, time, status, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, '')",
    )
    .bind(&id)
    .bind(parent_id)
    .bind(child_id)
    .bind(hospital_id)
    .bind(vaccine_id)
    .bind(next_week())
    .bind(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
    .bind(status.as_str())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn stock_of(pool: &Db, hospital_id: &str, vaccine_id: &str) -> i32 {
    sqlx::query_scalar("SELECT stock_quantity FROM inventory WHERE hospital_id = ? AND vaccine_id = ?")
        .bind(hospital_id)
        .bind(vaccine_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn status_of(pool: &Db, appointment_id: &str) -> AppointmentStatus {
    sqlx::query_scalar("SELECT status FROM appointments WHERE id = ?")
        .bind(appointment_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count(pool: &Db, table: &str, column: &str, value: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?"))
        .bind(value)
        .fetch_one(pool)
        .await
        .unwrap()
}
