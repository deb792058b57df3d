//! Email delivery via SMTP.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport to send plain-text
//! notification emails. Configuration is loaded from environment variables;
//! if `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and the
//! API falls back to [`LogMailer`](crate::LogMailer).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::mailer::{EmailMessage, Mailer};
use crate::templates::{self, TemplateError};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The body template is unknown or failed to render.
    #[error("Email template error: {0}")]
    Template(#[from] TemplateError),

    /// A message with no recipients was handed to the mailer.
    #[error("Email has no recipients")]
    NoRecipients,
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Configuration for the SMTP transport.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that SMTP
    /// delivery is not configured.
    ///
    /// | Variable        | Required | Default |
    /// |-----------------|----------|---------|
    /// | `SMTP_HOST`     | yes      |         |
    /// | `SMTP_PORT`     | no       | `587`   |
    /// | `SMTP_USER`     | no       |         |
    /// | `SMTP_PASSWORD` | no       |         |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Message assembly
// ---------------------------------------------------------------------------

/// Render the body and build the MIME message. Shared by every mailer so
/// template problems surface the same way with or without SMTP.
pub fn build_message(message: &EmailMessage) -> Result<Message, EmailError> {
    if message.recipients.is_empty() {
        return Err(EmailError::NoRecipients);
    }
    let body = templates::render(&message.template, &message.context)?;

    let mut builder = Message::builder()
        .from(message.sender.parse::<Mailbox>()?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    for to in &message.recipients {
        builder = builder.to(to.parse::<Mailbox>()?);
    }
    for cc in &message.cc {
        builder = builder.cc(cc.parse::<Mailbox>()?);
    }

    builder.body(body).map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// SmtpMailer
// ---------------------------------------------------------------------------

/// Sends notification emails via SMTP.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the SMTP transport from configuration. No connection is made
    /// until the first send.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: transport_builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = build_message(message)?;
        self.transport.send(email).await?;

        tracing::info!(
            to = ?message.recipients,
            cc = ?message.cc,
            template = %message.template,
            "Notification email sent",
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn message(template: &str) -> EmailMessage {
        EmailMessage {
            subject: "Cluster Access Denied".into(),
            template: template.into(),
            context: json!({
                "user_first_name": "Ada",
                "user_last_name": "Lovelace",
                "center_name": "Research IT",
                "project_name": "fc_ada",
                "allocation_id": 7,
                "signature": "The Team",
            }),
            sender: "noreply@example.edu".into(),
            recipients: vec!["ada@example.edu".into()],
            cc: vec!["pi@example.edu".into()],
        }
    }

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn build_message_renders_and_addresses() {
        let built = build_message(&message(templates::ids::CLUSTER_ACCESS_DENIED)).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();
        assert!(raw.contains("To: ada@example.edu"));
        assert!(raw.contains("Cc: pi@example.edu"));
        assert!(raw.contains("Subject: Cluster Access Denied"));
    }

    #[test]
    fn build_message_rejects_unknown_template() {
        assert_matches!(
            build_message(&message("nope")),
            Err(EmailError::Template(TemplateError::Unknown(_)))
        );
    }

    #[test]
    fn build_message_requires_recipients() {
        let mut m = message(templates::ids::CLUSTER_ACCESS_DENIED);
        m.recipients.clear();
        assert_matches!(build_message(&m), Err(EmailError::NoRecipients));
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }
}
