//! Historical record model. Rows are append-only; a database trigger
//! rejects updates and deletes.

use rcalloc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub history_type: String,
    pub history_date: Timestamp,
    pub history_user_id: Option<DbId>,
    pub change_reason: String,
    pub snapshot: serde_json::Value,
    pub changes: serde_json::Value,
}
