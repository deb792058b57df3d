//! Repository for `allocation_change_requests` and their attribute line items.

use rcalloc_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::models::change_request::{AttributeChangeRequest, ChangeRequest, CreateChangeRequest};

const COLUMNS: &str = "id, allocation_id, status, end_date_extension, justification, notes, \
                       requested_by, created_at, updated_at";

const ITEM_SELECT: &str = "\
    SELECT acr.id, acr.change_request_id, acr.allocation_attribute_id, \
           aa.name AS attribute_name, aa.value AS current_value, acr.new_value \
    FROM allocation_attribute_change_requests acr \
    JOIN allocation_attributes aa ON aa.id = acr.allocation_attribute_id";

pub struct ChangeRequestRepo;

impl ChangeRequestRepo {
    /// Insert a pending change request and its attribute line items.
    pub async fn create(
        conn: &mut PgConnection,
        allocation_id: DbId,
        requested_by: DbId,
        input: &CreateChangeRequest,
    ) -> Result<ChangeRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO allocation_change_requests
                (allocation_id, end_date_extension, justification, notes, requested_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(allocation_id)
            .bind(input.end_date_extension)
            .bind(&input.justification)
            .bind(&input.notes)
            .bind(requested_by)
            .fetch_one(&mut *conn)
            .await?;

        for item in &input.attribute_changes {
            sqlx::query(
                "INSERT INTO allocation_attribute_change_requests
                    (change_request_id, allocation_attribute_id, new_value)
                 VALUES ($1, $2, $3)",
            )
            .bind(request.id)
            .bind(item.allocation_attribute_id)
            .bind(&item.new_value)
            .execute(&mut *conn)
            .await?;
        }

        Ok(request)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM allocation_change_requests WHERE id = $1");
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load and row-lock a change request for the rest of the transaction.
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM allocation_change_requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn has_pending<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM allocation_change_requests
                WHERE allocation_id = $1 AND status = 'Pending'
             )",
        )
        .bind(allocation_id)
        .fetch_one(executor)
        .await
    }

    /// Attribute line items of a change request, ordered by id.
    pub async fn list_items<'e, E: PgExecutor<'e>>(
        executor: E,
        change_request_id: DbId,
    ) -> Result<Vec<AttributeChangeRequest>, sqlx::Error> {
        let query = format!("{ITEM_SELECT} WHERE acr.change_request_id = $1 ORDER BY acr.id");
        sqlx::query_as::<_, AttributeChangeRequest>(&query)
            .bind(change_request_id)
            .fetch_all(executor)
            .await
    }

    /// Set status and, when given, replace the notes.
    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        status: &str,
        notes: Option<&str>,
    ) -> Result<ChangeRequest, sqlx::Error> {
        let query = format!(
            "UPDATE allocation_change_requests
             SET status = $2, notes = COALESCE($3, notes)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(status)
            .bind(notes)
            .fetch_one(executor)
            .await
    }
}
