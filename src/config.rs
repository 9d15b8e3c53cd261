use dotenvy::dotenv;
use std::{env, str::FromStr};
use thiserror::Error;

const DEV_ADMIN_PASSWORD: &str = "admin";

/// How the hospital's generic status update treats a target of `approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdatePolicy {
    /// Any valid status may be written; inventory is not consulted.
    Unrestricted,
    /// A target of `approved` goes through the stock-deducting approval.
    EnforceStock,
}

impl FromStr for StatusUpdatePolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unrestricted"  => Ok(Self::Unrestricted),
            "enforce_stock" => Ok(Self::EnforceStock),
            _ => Err(ConfigError::InvalidValue("STATUS_UPDATE_POLICY".into(), raw.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_host:          String,
    pub db_port:          u16,
    pub db_name:          String,
    pub db_user:          String,
    pub db_password:      String,

    // Backend
    pub backend_host:     String,
    pub backend_port:     u16,

    // Session
    pub session_days:     i64,

    // Email
    pub smtp_host:        String,
    pub smtp_port:        u16,
    pub smtp_user:        String,
    pub smtp_password:    String,
    pub smtp_from:        String,

    // Seeded superuser
    pub admin_username:   String,
    pub admin_password:   String,
    pub admin_email:      String,

    // Appointments / inventory
    pub low_stock_threshold:  i32,
    pub status_update_policy: StatusUpdatePolicy,

    // App
    pub app_env:          String,
    pub app_base_url:     String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
            match env::var(key) {
                Ok(raw) => raw
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
                Err(_) => Ok(default),
            }
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let admin_password = admin_password_for(&app_env, env::var("ADMIN_PASSWORD").ok())?;

        let status_update_policy = match env::var("STATUS_UPDATE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_)  => StatusUpdatePolicy::Unrestricted,
        };

        Ok(Self {
            db_host:      env::var("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:      parse_or("DB_PORT", 3306)?,
            db_name:      require("DB_NAME")?,
            db_user:      require("DB_USER")?,
            db_password:  require("DB_PASSWORD")?,

            backend_host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port: parse_or("BACKEND_PORT", 8080)?,

            session_days: parse_or("SESSION_DAYS", 14)?,

            smtp_host:     env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port:     env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(587),
            smtp_user:     env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from:     env::var("SMTP_FROM").unwrap_or_default(),

            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
            admin_password,
            admin_email:    env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".into()),

            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 5)?,
            status_update_policy,

            app_env,
            app_base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost".into()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

/// Outside development the superuser password must be set explicitly and
/// may not be the development default.
fn admin_password_for(app_env: &str, raw: Option<String>) -> Result<String, ConfigError> {
    match raw {
        None if app_env == "development" => Ok(DEV_ADMIN_PASSWORD.into()),
        None => Err(ConfigError::MissingVar("ADMIN_PASSWORD".into())),
        Some(p) if app_env != "development" && (p.trim().is_empty() || p == DEV_ADMIN_PASSWORD) => {
            Err(ConfigError::InvalidValue("ADMIN_PASSWORD".into(), "<default>".into()))
        }
        Some(p) => Ok(p),
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for router tests; nothing here is read from the environment.
    pub fn for_tests() -> Self {
        Self {
            db_host:      "127.0.0.1".into(),
            db_port:      3306,
            db_name:      "vaxbook_test".into(),
            db_user:      "test".into(),
            db_password:  "test".into(),
            backend_host: "127.0.0.1".into(),
            backend_port: 0,
            session_days: 1,
            smtp_host:     String::new(),
            smtp_port:     587,
            smtp_user:     String::new(),
            smtp_password: String::new(),
            smtp_from:     String::new(),
            admin_username: "admin".into(),
            admin_password: "admin".into(),
            admin_email:    "admin@localhost".into(),
            low_stock_threshold:  5,
            status_update_policy: StatusUpdatePolicy::Unrestricted,
            app_env:      "test".into(),
            app_base_url: "http://localhost".into(),
        }
    }
}
