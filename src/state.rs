//! Shared application state.

use crate::{config::Config, db::Db};

/// Application-wide state passed via axum `State<AppState>`.
///
/// `MySqlPool` is `Arc`-backed and `Config` holds only small owned fields, so
/// cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub pool:   Db,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// State backed by a pool that never connects until a query runs.
    pub fn lazy_for_tests() -> Self {
        let config = crate::config::Config::for_tests();
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&crate::db::database_url(&config))
            .expect("lazy pool");
        Self { pool, config }
    }

    /// State over an already-migrated test database.
    pub fn with_pool(pool: Db) -> Self {
        Self { pool, config: crate::config::Config::for_tests() }
    }
}
