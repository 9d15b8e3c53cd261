use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::Config;
use crate::db::Db;
use crate::models::UserRole;

/// Seeds the superuser account from `ADMIN_USERNAME` / `ADMIN_PASSWORD`.
/// Safe to call on every startup; existence is checked before inserting.
pub async fn seed_accounts(pool: &Db, config: &Config) -> anyhow::Result<()> {
    seed_admin(pool, config).await?;

    Ok(())
}

async fn seed_admin(pool: &Db, config: &Config) -> anyhow::Result<()> {
    #[derive(sqlx::FromRow)]
    struct AdminRow {
        id:        String,
        role:      UserRole,
        is_active: bool,
    }

    let row: Option<AdminRow> = sqlx::query_as::<_, AdminRow>(
        "SELECT id, role, is_active FROM users WHERE username = ? LIMIT 1",
    )
    .bind(&config.admin_username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) if r.role != UserRole::Admin => {
            tracing::warn!(
                username = %config.admin_username,
                role = %r.role,
                "Admin username is taken by a non-admin account; skipping seed"
            );
        }

        Some(r) => {
            if !r.is_active {
                sqlx::query("UPDATE users SET is_active = 1, updated_at = UTC_TIMESTAMP() WHERE id = ?")
                    .bind(&r.id)
                    .execute(pool)
                    .await?;
                tracing::info!("Re-activated seeded admin account");
            }
        }

        None => {
            let hash = hash_password(&config.admin_password)?;
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO users (id, username, email, password_hash, role, is_active, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'admin', 1, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
            )
            .bind(id)
            .bind(&config.admin_username)
            .bind(&config.admin_email)
            .bind(hash)
            .execute(pool)
            .await?;
            tracing::info!(username = %config.admin_username, "Seeded admin account");
        }
    }

    Ok(())
}
