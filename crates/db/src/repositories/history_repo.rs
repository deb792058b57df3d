//! Repository for the append-only `history_records` table.
//!
//! [`HistoryRepo::record`] compares the new snapshot of an entity with the
//! most recent stored snapshot and appends a row only when something
//! changed.

use rcalloc_core::audit::{self, HistoryType};
use rcalloc_core::types::DbId;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgConnection;

use crate::models::history::HistoryRecord;

const COLUMNS: &str = "id, entity_type, entity_id, history_type, history_date, \
                       history_user_id, change_reason, snapshot, changes";

/// Who changed an entity and why.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryContext<'a> {
    /// Acting user; `None` for scheduled jobs.
    pub user_id: Option<DbId>,
    /// Explicit change reason. When absent one is computed from the diff.
    pub reason: Option<&'a str>,
}

pub struct HistoryRepo;

impl HistoryRepo {
    /// Append a snapshot of `entity` if it differs from the last one.
    ///
    /// The first record for an entity is a creation record. Returns `None`
    /// without writing when the snapshot matches the previous one.
    pub async fn record<T: Serialize>(
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: DbId,
        entity: &T,
        ctx: HistoryContext<'_>,
    ) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let next = serde_json::to_value(entity).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let next = audit::redact_sensitive_fields(&next);

        let prev = Self::latest_snapshot(&mut *conn, entity_type, entity_id).await?;
        let changes = audit::diff_snapshots(prev.as_ref(), &next);

        let history_type = if prev.is_some() {
            HistoryType::Changed
        } else {
            HistoryType::Created
        };
        if history_type == HistoryType::Changed && changes.is_empty() {
            return Ok(None);
        }

        let reason = audit::resolve_change_reason(ctx.reason, history_type, &changes);
        let changes_json =
            serde_json::to_value(&changes).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let query = format!(
            "INSERT INTO history_records
                (entity_type, entity_id, history_type, history_user_id, change_reason,
                 snapshot, changes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(history_type.as_str())
            .bind(ctx.user_id)
            .bind(&reason)
            .bind(&next)
            .bind(&changes_json)
            .fetch_one(&mut *conn)
            .await?;

        tracing::debug!(
            entity_type,
            entity_id,
            history_id = record.id,
            history_type = history_type.as_str(),
            "History recorded",
        );
        Ok(Some(record))
    }

    /// Most recent snapshot for an entity, if any.
    async fn latest_snapshot(
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: DbId,
    ) -> Result<Option<Value>, sqlx::Error> {
        sqlx::query_scalar::<_, Value>(
            "SELECT snapshot FROM history_records
             WHERE entity_type = $1 AND entity_id = $2
             ORDER BY id DESC LIMIT 1",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(conn)
        .await
    }

    /// All records for an entity, oldest first.
    pub async fn list_for_entity<'e, E: sqlx::PgExecutor<'e>>(
        executor: E,
        entity_type: &str,
        entity_id: DbId,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_records
             WHERE entity_type = $1 AND entity_id = $2
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(executor)
            .await
    }

    /// Number of records for an entity.
    pub async fn count_for_entity<'e, E: sqlx::PgExecutor<'e>>(
        executor: E,
        entity_type: &str,
        entity_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM history_records
             WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(executor)
        .await
    }
}
