use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Maps a string-backed enum onto a VARCHAR column through its `as_str` and
/// `FromStr`. Decoding an unknown value is an error, never a default.
macro_rules! text_column {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::MySql> for $ty {
            fn type_info() -> sqlx::mysql::MySqlTypeInfo {
                <str as sqlx::Type<sqlx::MySql>>::type_info()
            }

            fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::MySql>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::MySql> for $ty {
            fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::MySql>>::decode(value)?;
                Ok(raw.parse::<$ty>()?)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::MySql> for $ty {
            fn encode_by_ref(&self, buf: &mut Vec<u8>) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::MySql>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ── Users ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Parent,
    Hospital,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin    => "admin",
            UserRole::Parent   => "parent",
            UserRole::Hospital => "hospital",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin"    => Ok(UserRole::Admin),
            "parent"   => Ok(UserRole::Parent),
            "hospital" => Ok(UserRole::Hospital),
            other      => Err(format!("unknown role '{other}'")),
        }
    }
}

text_column!(UserRole);

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Profiles ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Parent {
    pub id:           String,
    pub user_id:      String,
    pub username:     String,
    pub email:        Option<String>,
    pub phone_number: String,
    pub address:      String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Hospital {
    pub id:         String,
    pub user_id:    Option<String>,
    pub name:       String,
    pub address:    String,
    pub phone:      String,
    pub email:      String,
    pub approved:   bool,
    pub created_at: NaiveDateTime,
}

// ── Children ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male   => "Male",
            Gender::Female => "Female",
            Gender::Other  => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male"   => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other"  => Ok(Gender::Other),
            other    => Err(format!("unknown gender '{other}'")),
        }
    }
}

text_column!(Gender);

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Child {
    pub id:            String,
    pub parent_id:     String,
    pub name:          String,
    pub date_of_birth: NaiveDate,
    pub gender:        Gender,
    pub blood_group:   String,
}

// ── Vaccines / inventory ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vaccine {
    pub id:              String,
    pub name:            String,
    pub description:     String,
    pub recommended_age: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Inventory {
    pub id:             String,
    pub hospital_id:    String,
    pub vaccine_id:     String,
    pub vaccine_name:   String,
    pub stock_quantity: i32,
    pub updated_at:     NaiveDateTime,
}

// ── Appointments ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending   => "pending",
            AppointmentStatus::Approved  => "approved",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a parent may still cancel from.
    pub fn is_cancellable(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending"   => Ok(AppointmentStatus::Pending),
            "approved"  => Ok(AppointmentStatus::Approved),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other       => Err(format!("'{other}' is not a valid appointment status")),
        }
    }
}

text_column!(AppointmentStatus);

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appointment joined with the display names of everything it references.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id:            String,
    pub parent_id:     String,
    pub child_id:      String,
    pub child_name:    String,
    pub hospital_id:   String,
    pub hospital_name: String,
    pub vaccine_id:    Option<String>,
    pub vaccine_name:  Option<String>,
    pub date:          NaiveDate,
    pub time:          NaiveTime,
    pub status:        AppointmentStatus,
    pub notes:         String,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_round_trips_through_its_name() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
        }
        assert_eq!("Approved".parse::<AppointmentStatus>(), Ok(AppointmentStatus::Approved));
        assert!("rejected".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn only_pending_and_approved_are_cancellable() {
        assert!(AppointmentStatus::Pending.is_cancellable());
        assert!(AppointmentStatus::Approved.is_cancellable());
        assert!(!AppointmentStatus::Completed.is_cancellable());
        assert!(!AppointmentStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn gender_serializes_capitalised() {
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"Female\"");
        let parsed: Gender = serde_json::from_str("\"Other\"").unwrap();
        assert_eq!(parsed, Gender::Other);
    }

    #[test]
    fn roles_serialize_as_column_values() {
        assert_eq!(serde_json::to_string(&UserRole::Hospital).unwrap(), "\"hospital\"");
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!("hospital".parse::<UserRole>(), Ok(UserRole::Hospital));
        assert!("child".parse::<UserRole>().is_err());
    }

    #[test]
    fn genders_parse_only_their_column_spelling() {
        assert_eq!("Female".parse::<Gender>(), Ok(Gender::Female));
        assert!("female".parse::<Gender>().is_err());
    }

    use sqlx::MySqlPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn column_values_decode_strictly(pool: MySqlPool) {
        let status: AppointmentStatus = sqlx::query_scalar("SELECT 'approved'").fetch_one(&pool).await.unwrap();
        assert_eq!(status, AppointmentStatus::Approved);
        let gender: Gender = sqlx::query_scalar("SELECT 'Other'").fetch_one(&pool).await.unwrap();
        assert_eq!(gender, Gender::Other);

        let unknown = sqlx::query_scalar::<_, AppointmentStatus>("SELECT 'rescheduled'").fetch_one(&pool).await;
        assert!(unknown.is_err());
    }
}
