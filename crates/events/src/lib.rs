//! Notification delivery for rcalloc workflows.
//!
//! - [`Mailer`]: the transport-agnostic send interface workflow runners call.
//! - [`EmailMessage`]: subject, template id, context, sender and recipients.
//! - [`templates`]: embedded minijinja templates for every notification.
//! - [`delivery`]: the SMTP mailer plus log-only and in-memory mailers.

pub mod delivery;
pub mod mailer;
pub mod templates;

pub use delivery::email::{EmailConfig, EmailError, SmtpMailer};
pub use delivery::log::LogMailer;
pub use delivery::memory::MemoryMailer;
pub use mailer::{EmailMessage, Mailer};
pub use templates::TemplateError;
