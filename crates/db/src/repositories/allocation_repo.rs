//! Repository for `allocations`, `allocation_resources` and
//! `allocation_attributes`.

use rcalloc_core::types::{Date, DbId};
use sqlx::PgExecutor;

use crate::models::allocation::{Allocation, AllocationAttribute, CreateAllocation};

const COLUMNS: &str = "id, project_id, status, quantity, start_date, end_date, justification, \
                       description, is_locked, is_changeable, created_at, updated_at";

const ATTRIBUTE_COLUMNS: &str = "id, allocation_id, name, value, created_at, updated_at";

/// Provides queries for allocations and their attributes.
pub struct AllocationRepo;

impl AllocationRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateAllocation,
    ) -> Result<Allocation, sqlx::Error> {
        let query = format!(
            "INSERT INTO allocations
                (project_id, status, quantity, start_date, end_date, justification,
                 description, is_locked, is_changeable)
             VALUES ($1, COALESCE($2, 'New'), COALESCE($3, 1), $4, $5, COALESCE($6, ''),
                     $7, COALESCE($8, false), COALESCE($9, false))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Allocation>(&query)
            .bind(input.project_id)
            .bind(&input.status)
            .bind(input.quantity)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(&input.justification)
            .bind(&input.description)
            .bind(input.is_locked)
            .bind(input.is_changeable)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Allocation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM allocations WHERE id = $1");
        sqlx::query_as::<_, Allocation>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load and row-lock an allocation for the rest of the transaction.
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Allocation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM allocations WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Allocation>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn update_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        status: &str,
    ) -> Result<Allocation, sqlx::Error> {
        let query = format!("UPDATE allocations SET status = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Allocation>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await
    }

    pub async fn set_end_date<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        end_date: Option<Date>,
    ) -> Result<Allocation, sqlx::Error> {
        let query =
            format!("UPDATE allocations SET end_date = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Allocation>(&query)
            .bind(id)
            .bind(end_date)
            .fetch_one(executor)
            .await
    }

    /// Ids of Active allocations whose end date is before `today`.
    pub async fn list_expirable_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        today: Date,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM allocations
             WHERE status = 'Active' AND end_date IS NOT NULL AND end_date < $1
             ORDER BY id",
        )
        .bind(today)
        .fetch_all(executor)
        .await
    }

    /// Names of the resources an allocation covers, sorted.
    pub async fn resource_names<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM allocation_resources ar
             JOIN resources r ON r.id = ar.resource_id
             WHERE ar.allocation_id = $1
             ORDER BY r.name",
        )
        .bind(allocation_id)
        .fetch_all(executor)
        .await
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    pub async fn list_attributes<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
    ) -> Result<Vec<AllocationAttribute>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM allocation_attributes
             WHERE allocation_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, AllocationAttribute>(&query)
            .bind(allocation_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find_attribute<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
        name: &str,
    ) -> Result<Option<AllocationAttribute>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM allocation_attributes
             WHERE allocation_id = $1 AND name = $2"
        );
        sqlx::query_as::<_, AllocationAttribute>(&query)
            .bind(allocation_id)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_attribute_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<AllocationAttribute>, sqlx::Error> {
        let query = format!("SELECT {ATTRIBUTE_COLUMNS} FROM allocation_attributes WHERE id = $1");
        sqlx::query_as::<_, AllocationAttribute>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Insert or overwrite the named attribute.
    pub async fn upsert_attribute<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
        name: &str,
        value: &str,
    ) -> Result<AllocationAttribute, sqlx::Error> {
        let query = format!(
            "INSERT INTO allocation_attributes (allocation_id, name, value)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_allocation_attributes_name
             DO UPDATE SET value = EXCLUDED.value
             RETURNING {ATTRIBUTE_COLUMNS}"
        );
        sqlx::query_as::<_, AllocationAttribute>(&query)
            .bind(allocation_id)
            .bind(name)
            .bind(value)
            .fetch_one(executor)
            .await
    }

    pub async fn set_attribute_value<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        value: &str,
    ) -> Result<AllocationAttribute, sqlx::Error> {
        let query = format!(
            "UPDATE allocation_attributes SET value = $2 WHERE id = $1
             RETURNING {ATTRIBUTE_COLUMNS}"
        );
        sqlx::query_as::<_, AllocationAttribute>(&query)
            .bind(id)
            .bind(value)
            .fetch_one(executor)
            .await
    }
}
