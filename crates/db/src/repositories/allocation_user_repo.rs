//! Repository for `allocation_users` and `allocation_user_attributes`.

use rcalloc_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::allocation::{AllocationUser, AllocationUserAttribute};

const COLUMNS: &str = "id, allocation_id, user_id, status, usage_bytes, usage, unit, \
                       created_at, updated_at";

const ATTRIBUTE_COLUMNS: &str = "id, allocation_user_id, name, value, created_at, updated_at";

pub struct AllocationUserRepo;

impl AllocationUserRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
        user_id: DbId,
        status: &str,
    ) -> Result<AllocationUser, sqlx::Error> {
        let query = format!(
            "INSERT INTO allocation_users (allocation_id, user_id, status)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AllocationUser>(&query)
            .bind(allocation_id)
            .bind(user_id)
            .bind(status)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<AllocationUser>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM allocation_users WHERE id = $1");
        sqlx::query_as::<_, AllocationUser>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn update_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        status: &str,
    ) -> Result<AllocationUser, sqlx::Error> {
        let query =
            format!("UPDATE allocation_users SET status = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, AllocationUser>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await
    }

    pub async fn find_attribute<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_user_id: DbId,
        name: &str,
    ) -> Result<Option<AllocationUserAttribute>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM allocation_user_attributes
             WHERE allocation_user_id = $1 AND name = $2"
        );
        sqlx::query_as::<_, AllocationUserAttribute>(&query)
            .bind(allocation_user_id)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Insert or overwrite the named attribute.
    pub async fn upsert_attribute<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_user_id: DbId,
        name: &str,
        value: &str,
    ) -> Result<AllocationUserAttribute, sqlx::Error> {
        let query = format!(
            "INSERT INTO allocation_user_attributes (allocation_user_id, name, value)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_allocation_user_attributes_name
             DO UPDATE SET value = EXCLUDED.value
             RETURNING {ATTRIBUTE_COLUMNS}"
        );
        sqlx::query_as::<_, AllocationUserAttribute>(&query)
            .bind(allocation_user_id)
            .bind(name)
            .bind(value)
            .fetch_one(executor)
            .await
    }
}
