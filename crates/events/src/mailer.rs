//! The mail collaborator used by workflow runners.

use async_trait::async_trait;
use serde::Serialize;

use crate::delivery::email::EmailError;

/// One notification to send. The body is rendered from `template` with
/// `context` by the mailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    /// Template id, one of the names in [`crate::templates::ids`].
    pub template: String,
    pub context: serde_json::Value,
    pub sender: String,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,
}

/// Sends an [`EmailMessage`].
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// from request handlers and background jobs at the same time.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}
