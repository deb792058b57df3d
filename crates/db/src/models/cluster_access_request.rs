//! Cluster access request models.
//!
//! [`ClusterAccessRequest`] is the bare row, used for locking and history
//! snapshots. [`ClusterAccessRequestRow`] joins in the allocation user, user
//! and project so the API can render [`ClusterAccessRequestResponse`]
//! without further queries.

use rcalloc_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Bare row from `cluster_access_requests`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClusterAccessRequest {
    pub id: DbId,
    pub allocation_user_id: DbId,
    pub status: String,
    pub request_time: Timestamp,
    pub completion_time: Option<Timestamp>,
    pub username: Option<String>,
    pub cluster_uid: Option<String>,
    pub host_user_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for opening a new request against an allocation user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClusterAccessRequest {
    pub allocation_user_id: DbId,
    pub status: Option<String>,
    pub host_user_id: Option<DbId>,
}

/// Request row joined with its allocation user, user and project.
#[derive(Debug, Clone, FromRow)]
pub struct ClusterAccessRequestRow {
    pub id: DbId,
    pub status: String,
    pub request_time: Timestamp,
    pub completion_time: Option<Timestamp>,
    pub username: Option<String>,
    pub cluster_uid: Option<String>,
    pub host_username: Option<String>,
    pub allocation_user_id: DbId,
    pub allocation_id: DbId,
    pub allocation_user_status: String,
    pub user_id: DbId,
    pub user_username: String,
    pub project_id: DbId,
    pub project_name: String,
}

/// Nested allocation user block in the API representation.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationUserSummary {
    pub id: DbId,
    pub allocation: DbId,
    pub user: String,
    pub project: String,
    pub status: String,
}

/// External representation of a cluster access request.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterAccessRequestResponse {
    pub id: DbId,
    pub status: String,
    pub request_time: Timestamp,
    pub completion_time: Option<Timestamp>,
    pub username: Option<String>,
    pub cluster_uid: Option<String>,
    pub host_user: Option<String>,
    pub allocation_user: AllocationUserSummary,
}

impl From<ClusterAccessRequestRow> for ClusterAccessRequestResponse {
    fn from(row: ClusterAccessRequestRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            request_time: row.request_time,
            completion_time: row.completion_time,
            username: row.username,
            cluster_uid: row.cluster_uid,
            host_user: row.host_username,
            allocation_user: AllocationUserSummary {
                id: row.allocation_user_id,
                allocation: row.allocation_id,
                user: row.user_username,
                project: row.project_name,
                status: row.allocation_user_status,
            },
        }
    }
}

/// Filters and paging for the request list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterAccessRequestQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ClusterAccessRequestQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 50;
    pub const MAX_PAGE_SIZE: i64 = 500;

    /// `(limit, offset)` with pages starting at 1.
    pub fn limit_offset(&self) -> (i64, i64) {
        let size = self
            .page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);
        (size, (page - 1) * size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(ClusterAccessRequestQuery::default().limit_offset(), (50, 0));
        let q = ClusterAccessRequestQuery {
            page: Some(3),
            page_size: Some(10),
            ..Default::default()
        };
        assert_eq!(q.limit_offset(), (10, 20));
        let q = ClusterAccessRequestQuery {
            page: Some(0),
            page_size: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.limit_offset(), (500, 0));
    }
}
