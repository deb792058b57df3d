//! In-memory mailer for tests and local tooling.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::delivery::email::{build_message, EmailError};
use crate::mailer::{EmailMessage, Mailer};

/// Records every message it is asked to send. Messages are rendered first
/// so template errors fail the same way they would over SMTP.
///
/// Set `fail` to make every send return an error after recording the
/// attempt.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose sends always fail.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of all attempted sends, in order.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        if self.fail {
            return Err(EmailError::Build("memory mailer configured to fail".into()));
        }
        build_message(message)?;
        Ok(())
    }
}
