//! Appointment lifecycle: booking, hospital approval with stock deduction,
//! generic status updates and parent cancellation.
//!
//! The rules themselves are plain functions (`check_*`, `split_*`,
//! `group_*`) so they can be exercised without a database; the async
//! functions wrap them in the queries and transactions.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::StatusUpdatePolicy,
    db::Db,
    errors::{AppError, AppResult, FieldErrors},
    models::{Appointment, AppointmentStatus},
};

const APPOINTMENT_SELECT: &str =
    "SELECT a.id, a.parent_id, a.child_id, c.name AS child_name,
            a.hospital_id, h.name AS hospital_name,
            a.vaccine_id, v.name AS vaccine_name,
            a.date, a.time, a.status, a.notes, a.created_at, a.updated_at
     FROM appointments a
     JOIN children  c ON c.id = a.child_id
     JOIN hospitals h ON h.id = a.hospital_id
     LEFT JOIN vaccines v ON v.id = a.vaccine_id";

// ── Types ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub child_id:    String,
    pub hospital_id: String,
    pub vaccine_id:  Option<String>,
    pub date:        NaiveDate,
    pub time:        NaiveTime,
    pub notes:       String,
}

/// Parent-facing split of their appointments.
#[derive(Debug, Default, Serialize)]
pub struct AppointmentTimeline {
    pub upcoming: Vec<Appointment>,
    pub past:     Vec<Appointment>,
}

/// Hospital-facing split of their appointments.
#[derive(Debug, Default, Serialize)]
pub struct StatusBuckets {
    pub pending:   Vec<Appointment>,
    pub approved:  Vec<Appointment>,
    pub completed: Vec<Appointment>,
    pub cancelled: Vec<Appointment>,
}

/// The inventory row an approval draws from.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StockRecord {
    pub id:             String,
    pub stock_quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub appointment:     Appointment,
    pub remaining_stock: i32,
}

// ── Rules ────────────────────────────────────────────────────

pub fn check_booking_date(date: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if date < today {
        return Err("Appointment date cannot be in the past.".into());
    }
    Ok(())
}

/// Booking-time availability of a chosen vaccine at a hospital.
/// `stock` is `None` when the hospital has no inventory record for it.
pub fn check_booking_stock(vaccine: &str, hospital: &str, stock: Option<i32>) -> Result<(), String> {
    match stock {
        None => Err(format!("Inventory data for {vaccine} at {hospital} is unavailable.")),
        Some(n) if n <= 0 => Err(format!("{vaccine} is out of stock at {hospital}.")),
        Some(_) => Ok(()),
    }
}

/// Preconditions for a hospital approval, in order. Returns the record to
/// draw from with `stock_quantity` already reduced by the consumed unit.
pub fn check_approval(
    status: AppointmentStatus,
    vaccine: Option<&str>,
    stock: Option<StockRecord>,
) -> AppResult<StockRecord> {
    if status != AppointmentStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "Only pending appointments can be approved (current status: {status})."
        )));
    }
    let Some(vaccine) = vaccine else {
        return Err(AppError::InvalidState(
            "Cannot approve: no vaccine selected for this appointment.".into(),
        ));
    };
    match stock {
        Some(record) if record.stock_quantity > 0 => Ok(StockRecord {
            stock_quantity: record.stock_quantity - 1,
            ..record
        }),
        _ => Err(AppError::InvalidState(format!(
            "Cannot approve: {vaccine} is out of stock at this hospital."
        ))),
    }
}

pub fn check_cancellable(status: AppointmentStatus) -> AppResult<()> {
    if !status.is_cancellable() {
        return Err(AppError::InvalidState("This appointment cannot be cancelled.".into()));
    }
    Ok(())
}

/// Upcoming: on or after `today` and not cancelled. Everything else is past.
pub fn split_by_date(appointments: Vec<Appointment>, today: NaiveDate) -> AppointmentTimeline {
    let mut timeline = AppointmentTimeline::default();
    for appt in appointments {
        if appt.date >= today && appt.status != AppointmentStatus::Cancelled {
            timeline.upcoming.push(appt);
        } else {
            timeline.past.push(appt);
        }
    }
    timeline.past.reverse();
    timeline
}

pub fn group_by_status(appointments: Vec<Appointment>) -> StatusBuckets {
    let mut buckets = StatusBuckets::default();
    for appt in appointments {
        match appt.status {
            AppointmentStatus::Pending   => buckets.pending.push(appt),
            AppointmentStatus::Approved  => buckets.approved.push(appt),
            AppointmentStatus::Completed => buckets.completed.push(appt),
            AppointmentStatus::Cancelled => buckets.cancelled.push(appt),
        }
    }
    buckets
}

// ── Queries ──────────────────────────────────────────────────

pub async fn list_for_parent(pool: &Db, parent_id: &str) -> AppResult<Vec<Appointment>> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.parent_id = ? ORDER BY a.date, a.time");
    let rows = sqlx::query_as::<_, Appointment>(&sql)
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_for_hospital(pool: &Db, hospital_id: &str) -> AppResult<Vec<Appointment>> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.hospital_id = ? ORDER BY a.date, a.time");
    let rows = sqlx::query_as::<_, Appointment>(&sql)
        .bind(hospital_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn fetch_for_parent(pool: &Db, parent_id: &str, id: &str) -> AppResult<Appointment> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = ? AND a.parent_id = ?");
    sqlx::query_as::<_, Appointment>(&sql)
        .bind(id)
        .bind(parent_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn fetch_for_hospital(pool: &Db, hospital_id: &str, id: &str) -> AppResult<Appointment> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = ? AND a.hospital_id = ?");
    sqlx::query_as::<_, Appointment>(&sql)
        .bind(id)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

// ── Booking ──────────────────────────────────────────────────

pub async fn book(
    pool: &Db,
    parent_id: &str,
    new: NewAppointment,
    today: NaiveDate,
) -> AppResult<Appointment> {
    // A child outside the caller's family is indistinguishable from a missing one.
    let owns_child: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM children WHERE id = ? AND parent_id = ?)",
    )
    .bind(&new.child_id)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;
    if !owns_child {
        return Err(AppError::NotFound);
    }

    let mut fields = FieldErrors::new();

    if let Err(msg) = check_booking_date(new.date, today) {
        fields.entry("date".into()).or_default().push(msg);
    }

    let hospital_name: Option<String> = sqlx::query_scalar(
        "SELECT name FROM hospitals WHERE id = ? AND approved = 1",
    )
    .bind(&new.hospital_id)
    .fetch_optional(pool)
    .await?;

    match (&hospital_name, &new.vaccine_id) {
        (None, _) => {
            fields.entry("hospital_id".into()).or_default().push("Select a valid hospital.".into());
        }
        (Some(hospital), Some(vaccine_id)) => {
            let vaccine_name: Option<String> = sqlx::query_scalar("SELECT name FROM vaccines WHERE id = ?")
                .bind(vaccine_id)
                .fetch_optional(pool)
                .await?;
            match vaccine_name {
                None => {
                    fields.entry("vaccine_id".into()).or_default().push("Select a valid vaccine.".into());
                }
                Some(vaccine) => {
                    let stock: Option<i32> = sqlx::query_scalar(
                        "SELECT stock_quantity FROM inventory WHERE hospital_id = ? AND vaccine_id = ?",
                    )
                    .bind(&new.hospital_id)
                    .bind(vaccine_id)
                    .fetch_optional(pool)
                    .await?;
                    if let Err(msg) = check_booking_stock(&vaccine, hospital, stock) {
                        fields.entry("vaccine_id".into()).or_default().push(msg);
                    }
                }
            }
        }
        (Some(_), None) => {}
    }

    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO appointments
            (id, parent_id, child_id, hospital_id, vaccine_id, date, time, status, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(parent_id)
    .bind(&new.child_id)
    .bind(&new.hospital_id)
    .bind(&new.vaccine_id)
    .bind(new.date)
    .bind(new.time)
    .bind(&new.notes)
    .execute(pool)
    .await?;

    tracing::info!(appointment_id = %id, parent_id, hospital_id = %new.hospital_id, "Appointment booked");
    fetch_for_parent(pool, parent_id, &id).await
}

// ── Hospital actions ─────────────────────────────────────────

/// Approve a pending appointment and consume one unit of the matching stock.
///
/// The appointment and inventory rows are locked for the duration of the
/// transaction; the stock decrement is also guarded in its WHERE clause so a
/// concurrent approval can never take the count below zero.
pub async fn approve(pool: &Db, hospital_id: &str, appointment_id: &str) -> AppResult<ApprovalOutcome> {
    let mut tx = pool.begin().await?;

    #[derive(sqlx::FromRow)]
    struct LockedAppointment {
        status:     AppointmentStatus,
        vaccine_id: Option<String>,
    }

    let locked = sqlx::query_as::<_, LockedAppointment>(
        "SELECT status, vaccine_id FROM appointments WHERE id = ? AND hospital_id = ? FOR UPDATE",
    )
    .bind(appointment_id)
    .bind(hospital_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound)?;

    let vaccine_name: Option<String> = match &locked.vaccine_id {
        Some(vaccine_id) => sqlx::query_scalar("SELECT name FROM vaccines WHERE id = ?")
            .bind(vaccine_id)
            .fetch_optional(&mut *tx)
            .await?,
        None => None,
    };

    let stock_row: Option<StockRecord> = match &locked.vaccine_id {
        Some(vaccine_id) => sqlx::query_as::<_, StockRecord>(
            "SELECT id, stock_quantity FROM inventory
             WHERE hospital_id = ? AND vaccine_id = ?
             FOR UPDATE",
        )
        .bind(hospital_id)
        .bind(vaccine_id)
        .fetch_optional(&mut *tx)
        .await?,
        None => None,
    };

    let drawn = match check_approval(locked.status, vaccine_name.as_deref(), stock_row) {
        Ok(drawn) => drawn,
        Err(err) => {
            tracing::warn!(appointment_id, hospital_id, error = %err, "Appointment approval refused");
            return Err(err);
        }
    };

    let decremented = sqlx::query(
        "UPDATE inventory
         SET stock_quantity = stock_quantity - 1, updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND stock_quantity > 0",
    )
    .bind(&drawn.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if decremented != 1 {
        return Err(AppError::InvalidState(
            "Cannot approve: vaccine is out of stock at this hospital.".into(),
        ));
    }

    sqlx::query("UPDATE appointments SET status = 'approved', updated_at = UTC_TIMESTAMP() WHERE id = ?")
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(appointment_id, hospital_id, remaining_stock = drawn.stock_quantity, "Appointment approved");
    let appointment = fetch_for_hospital(pool, hospital_id, appointment_id).await?;
    Ok(ApprovalOutcome { appointment, remaining_stock: drawn.stock_quantity })
}

/// Overwrite an appointment's status. Under `Unrestricted` no transition rule
/// or stock check applies; under `EnforceStock` a target of `approved` is
/// delegated to [`approve`].
pub async fn set_status(
    pool: &Db,
    hospital_id: &str,
    appointment_id: &str,
    target: AppointmentStatus,
    policy: StatusUpdatePolicy,
) -> AppResult<Appointment> {
    if policy == StatusUpdatePolicy::EnforceStock && target == AppointmentStatus::Approved {
        return approve(pool, hospital_id, appointment_id).await.map(|o| o.appointment);
    }

    let current = fetch_for_hospital(pool, hospital_id, appointment_id).await?;

    sqlx::query("UPDATE appointments SET status = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
        .bind(target.as_str())
        .bind(appointment_id)
        .execute(pool)
        .await?;

    tracing::info!(
        appointment_id,
        hospital_id,
        from = %current.status,
        to = %target,
        "Appointment status updated"
    );
    fetch_for_hospital(pool, hospital_id, appointment_id).await
}

// ── Parent actions ───────────────────────────────────────────

pub async fn cancel_for_parent(pool: &Db, parent_id: &str, appointment_id: &str) -> AppResult<Appointment> {
    let current = fetch_for_parent(pool, parent_id, appointment_id).await?;
    check_cancellable(current.status)?;

    let affected = sqlx::query(
        "UPDATE appointments SET status = 'cancelled', updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND parent_id = ? AND status IN ('pending', 'approved')",
    )
    .bind(appointment_id)
    .bind(parent_id)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        // Status moved between the read and the write.
        return Err(AppError::InvalidState("This appointment cannot be cancelled.".into()));
    }

    tracing::info!(appointment_id, parent_id, "Appointment cancelled by parent");
    fetch_for_parent(pool, parent_id, appointment_id).await
}
