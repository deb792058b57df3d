use std::sync::Arc;

use rcalloc_core::config::WorkflowConfig;
use rcalloc_events::Mailer;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: rcalloc_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Outbound notification email.
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn workflow(&self) -> &WorkflowConfig {
        &self.config.workflow
    }
}
