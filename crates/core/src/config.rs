//! Workflow configuration.
//!
//! Values that influence workflow side effects (whether to send email, what
//! goes in it, which resource counts as the primary compute cluster) are
//! carried in a [`WorkflowConfig`] that callers pass in explicitly. The API
//! binary builds one from the environment at startup.

use crate::allocation::DEFAULT_EXTENSION_DAYS;

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Master switch for notification email.
    pub email_enabled: bool,
    /// `From` address on workflow notifications.
    pub email_sender: String,
    /// Short program name used in email subjects and bodies.
    pub program_name_short: String,
    pub center_name: String,
    pub center_help_email: String,
    pub center_user_guide: String,
    pub center_login_guide: String,
    pub email_signature: String,
    /// Name of the resource whose allocations carry per-user service units.
    /// `None` disables the service-unit copy on activation.
    pub primary_compute_resource: Option<String>,
    /// End-date extensions (days) a change request may ask for.
    pub allowed_extension_days: Vec<i32>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            email_enabled: false,
            email_sender: "noreply@rcalloc.local".to_string(),
            program_name_short: "RC".to_string(),
            center_name: "Research Computing".to_string(),
            center_help_email: "help@rcalloc.local".to_string(),
            center_user_guide: String::new(),
            center_login_guide: String::new(),
            email_signature: "Research Computing".to_string(),
            primary_compute_resource: None,
            allowed_extension_days: DEFAULT_EXTENSION_DAYS.to_vec(),
        }
    }
}
