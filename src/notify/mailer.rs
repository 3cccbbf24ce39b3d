//! Outbound mail: the `Mailer` seam and its SMTP implementation on lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::{parse_flag, parse_var};
use crate::error::{ConfigError, NotificationError};

/// Delivers one plain-text message.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

// ── Configuration ───────────────────────────────────────────────────

/// SMTP settings, built from `SMTP_*` environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from_address: String,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
}

impl MailConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("SMTP_HOST").unwrap_or_else(|| "localhost".to_string());
        let port = parse_var(lookup, "SMTP_PORT", 587u16)?;
        let username = non_empty("SMTP_USER");
        let password = non_empty("SMTP_PASSWORD").map(SecretString::from);
        let from_address = non_empty("SMTP_FROM")
            .or_else(|| username.clone())
            .unwrap_or_else(|| "no-reply@localhost".to_string());
        let use_tls = parse_flag(lookup, "SMTP_USE_TLS", true);

        Ok(Self {
            host,
            port,
            username,
            password,
            from_address,
            use_tls,
        })
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends mail through an SMTP relay. Blocking I/O runs on the blocking pool.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        let builder = if config.use_tls {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| NotificationError::Transport(format!("SMTP relay error: {e}")))?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let from = config.from_address.parse::<Mailbox>().map_err(|e| {
            NotificationError::Message(format!("Invalid from address '{}': {e}", config.from_address))
        })?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

/// Build a plain-text message.
fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, NotificationError> {
    let to = to
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::Message(format!("Invalid to address '{to}': {e}")))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| NotificationError::Message(format!("Failed to build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let message = build_message(&self.from, to, subject, body)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| NotificationError::Transport(format!("SMTP task failed: {e}")))?
            .map_err(|e| NotificationError::Transport(format!("SMTP send failed: {e}")))?;

        info!(to, "Email sent");
        Ok(())
    }
}

// ── Test double ─────────────────────────────────────────────────────
