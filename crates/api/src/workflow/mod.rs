//! Transactional workflow runners.
//!
//! A runner owns one multi-step state change. It locks the rows involved,
//! collects every validation problem, writes all mutations and their
//! history in a single transaction, and only after commit sends
//! notification email. Email failure is logged and never undoes a commit.

pub mod allocation_status;
pub mod change_request;
pub mod cluster_access;

pub use allocation_status::AllocationStatusRunner;
pub use change_request::ChangeRequestRunner;
pub use cluster_access::{ClusterAccessOutcome, ClusterAccessRunner};

use rcalloc_core::config::WorkflowConfig;
use rcalloc_core::types::DbId;
use rcalloc_events::{EmailMessage, Mailer};

use crate::error::AppError;

/// Hand a message to the mailer. Returns whether delivery succeeded.
pub(crate) async fn send_safely(mailer: &dyn Mailer, message: &EmailMessage) -> bool {
    match mailer.send(message).await {
        Ok(()) => {
            tracing::info!(
                subject = %message.subject,
                template = %message.template,
                recipients = message.recipients.len(),
                cc = message.cc.len(),
                "Notification email sent"
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                subject = %message.subject,
                "Failed to send notification email"
            );
            false
        }
    }
}

/// Build a message from the configured sender, or `None` when email is
/// disabled or nobody would receive it.
pub(crate) fn compose(
    config: &WorkflowConfig,
    subject: &str,
    template: &str,
    context: serde_json::Value,
    recipients: Vec<String>,
    cc: Vec<String>,
) -> Option<EmailMessage> {
    if !config.email_enabled || recipients.is_empty() {
        return None;
    }
    Some(EmailMessage {
        subject: subject.to_string(),
        template: template.to_string(),
        context,
        sender: config.email_sender.clone(),
        recipients,
        cc,
    })
}

/// A row that a foreign key guarantees was not found.
pub(crate) fn dangling(entity: &str, id: DbId) -> AppError {
    AppError::InternalError(format!("{entity} {id} is referenced but does not exist"))
}
