//! Mailer used when SMTP is not configured.

use async_trait::async_trait;

use crate::delivery::email::{build_message, EmailError};
use crate::mailer::{EmailMessage, Mailer};

/// Renders each message and logs it instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = build_message(message)?;
        tracing::info!(
            to = ?message.recipients,
            cc = ?message.cc,
            subject = %message.subject,
            template = %message.template,
            bytes = email.formatted().len(),
            "SMTP not configured, email logged only",
        );
        Ok(())
    }
}
