//! Repository for the `resources` table.

use rcalloc_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::resource::{CreateResource, Resource};

const COLUMNS: &str = "id, name, resource_type, is_allocatable, created_at, updated_at";

pub struct ResourceRepo;

impl ResourceRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateResource,
    ) -> Result<Resource, sqlx::Error> {
        let query = format!(
            "INSERT INTO resources (name, resource_type)
             VALUES ($1, COALESCE($2, 'Cluster'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(&input.name)
            .bind(&input.resource_type)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Option<Resource>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM resources WHERE name = $1");
        sqlx::query_as::<_, Resource>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Link a resource to an allocation. Linking twice is a no-op.
    pub async fn attach_to_allocation<'e, E: PgExecutor<'e>>(
        executor: E,
        allocation_id: DbId,
        resource_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO allocation_resources (allocation_id, resource_id) VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_allocation_resources_pair DO NOTHING",
        )
        .bind(allocation_id)
        .bind(resource_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
