//! Hospital admission notifications.
//!
//! If SMTP is not configured (empty `smtp_host`), the message is logged
//! instead of sent.

use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::Config;
use crate::errors::{AppError, AppResult};

// ── Public helpers ────────────────────────────────────────────

pub async fn send_hospital_approved_email(config: &Config, to: &str, hospital_name: &str) -> AppResult<()> {
    let link = format!("{}/hospital/login", config.app_base_url);

    if config.smtp_host.is_empty() {
        tracing::warn!(to, hospital = hospital_name, "SMTP not configured; approval notice not sent");
        return Ok(());
    }

    let body = format!(
        "Hello {hospital_name},\n\nYour hospital registration has been approved. You can now sign in:\n\n{link}\n\nVaxBook"
    );

    send(config, to, "Hospital registration approved", &body).await
}

pub async fn send_hospital_rejected_email(config: &Config, to: &str, hospital_name: &str) -> AppResult<()> {
    if config.smtp_host.is_empty() {
        tracing::warn!(to, hospital = hospital_name, "SMTP not configured; rejection notice not sent");
        return Ok(());
    }

    let body = format!(
        "Hello {hospital_name},\n\nYour hospital registration was not approved and the account has been removed.\n\nVaxBook"
    );

    send(config, to, "Hospital registration rejected", &body).await
}

// ── Internal ──────────────────────────────────────────────────

async fn send(config: &Config, to: &str, subject: &str, body: &str) -> AppResult<()> {
    let email = Message::builder()
        .from(
            config.smtp_from.parse()
                .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid SMTP_FROM address")))?,
        )
        .to(to.parse().map_err(|_| AppError::BadRequest("Invalid email address".into()))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_owned())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email: {e}")))?;

    let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    transport
        .send(email)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send email: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_smtp_is_a_silent_success() {
        let config = Config::for_tests();
        assert!(send_hospital_approved_email(&config, "clinic@example.com", "CityClinic").await.is_ok());
        assert!(send_hospital_rejected_email(&config, "clinic@example.com", "CityClinic").await.is_ok());
    }
}
