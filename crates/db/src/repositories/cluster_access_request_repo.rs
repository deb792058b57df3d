//! Repository for the `cluster_access_requests` table.

use rcalloc_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::cluster_access_request::{
    ClusterAccessRequest, ClusterAccessRequestRow, CreateClusterAccessRequest,
};

const COLUMNS: &str = "id, allocation_user_id, status, request_time, completion_time, \
                       username, cluster_uid, host_user_id, created_at, updated_at";

/// Select list and joins producing a [`ClusterAccessRequestRow`].
const DETAIL_SELECT: &str = "\
    SELECT car.id, car.status, car.request_time, car.completion_time, \
           car.username, car.cluster_uid, hu.username AS host_username, \
           au.id AS allocation_user_id, au.allocation_id, \
           au.status AS allocation_user_status, \
           u.id AS user_id, u.username AS user_username, \
           p.id AS project_id, p.name AS project_name \
    FROM cluster_access_requests car \
    JOIN allocation_users au ON au.id = car.allocation_user_id \
    JOIN users u ON u.id = au.user_id \
    JOIN allocations a ON a.id = au.allocation_id \
    JOIN projects p ON p.id = a.project_id \
    LEFT JOIN users hu ON hu.id = car.host_user_id";

/// Field values written by a status transition.
#[derive(Debug, Clone)]
pub struct ClusterAccessUpdate<'a> {
    pub status: &'a str,
    pub completion_time: Option<Timestamp>,
    pub username: Option<&'a str>,
    pub cluster_uid: Option<&'a str>,
}

/// Provides queries for cluster access requests.
pub struct ClusterAccessRequestRepo;

impl ClusterAccessRequestRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateClusterAccessRequest,
    ) -> Result<ClusterAccessRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO cluster_access_requests (allocation_user_id, status, host_user_id)
             VALUES ($1, COALESCE($2, 'Pending - Add'), $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClusterAccessRequest>(&query)
            .bind(input.allocation_user_id)
            .bind(&input.status)
            .bind(input.host_user_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ClusterAccessRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cluster_access_requests WHERE id = $1");
        sqlx::query_as::<_, ClusterAccessRequest>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load and row-lock a request for the rest of the transaction.
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ClusterAccessRequest>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM cluster_access_requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ClusterAccessRequest>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a request together with its allocation user, user and project.
    pub async fn find_detail<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ClusterAccessRequestRow>, sqlx::Error> {
        let query = format!("{DETAIL_SELECT} WHERE car.id = $1");
        sqlx::query_as::<_, ClusterAccessRequestRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List requests ordered by id ascending, optionally filtered by status.
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ClusterAccessRequestRow>, sqlx::Error> {
        let query = format!(
            "{DETAIL_SELECT}
             WHERE ($1::TEXT IS NULL OR car.status = $1)
             ORDER BY car.id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ClusterAccessRequestRow>(&query)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Count requests matching the list filter.
    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        status: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM cluster_access_requests
             WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(executor)
        .await
    }

    /// Write the outcome of a transition. `None` fields keep their value.
    pub async fn apply_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        update: &ClusterAccessUpdate<'_>,
    ) -> Result<ClusterAccessRequest, sqlx::Error> {
        let query = format!(
            "UPDATE cluster_access_requests SET
                status = $2,
                completion_time = COALESCE($3, completion_time),
                username = COALESCE($4, username),
                cluster_uid = COALESCE($5, cluster_uid)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClusterAccessRequest>(&query)
            .bind(id)
            .bind(update.status)
            .bind(update.completion_time)
            .bind(update.username)
            .bind(update.cluster_uid)
            .fetch_one(executor)
            .await
    }
}
