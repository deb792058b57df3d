//! Repository for the `projects` and `project_users` tables.

use rcalloc_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::project::{
    roles, CreateProject, CreateProjectUser, Project, ProjectUser, ProjectUserTransaction,
    ACTIVE_MEMBER_STATUS,
};

const COLUMNS: &str = "id, name, title, status, created_at, updated_at";

const MEMBER_COLUMNS: &str = "id, project_id, user_id, role, status, enable_notifications, \
                              created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, project_user_id, date_time, allocation::TEXT AS allocation, created_at, updated_at";

/// Provides queries for projects and their members.
pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, title, status)
             VALUES ($1, COALESCE($2, ''), COALESCE($3, 'Active'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(&input.title)
            .bind(&input.status)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Add a user to a project with the given role.
    pub async fn add_user<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateProjectUser,
    ) -> Result<ProjectUser, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_users (project_id, user_id, role, enable_notifications)
             VALUES ($1, $2, $3, COALESCE($4, true))
             RETURNING {MEMBER_COLUMNS}"
        );
        sqlx::query_as::<_, ProjectUser>(&query)
            .bind(input.project_id)
            .bind(input.user_id)
            .bind(&input.role)
            .bind(input.enable_notifications)
            .fetch_one(executor)
            .await
    }

    /// Ids of the project's active PIs and managers.
    pub async fn manager_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT user_id FROM project_users
             WHERE project_id = $1 AND status = $2 AND role IN ($3, $4)
             ORDER BY user_id",
        )
        .bind(project_id)
        .bind(ACTIVE_MEMBER_STATUS)
        .bind(roles::MANAGER)
        .bind(roles::PRINCIPAL_INVESTIGATOR)
        .fetch_all(executor)
        .await
    }

    /// Email addresses of active PIs and managers who want notifications.
    pub async fn notification_emails<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT u.email FROM project_users pu
             JOIN users u ON u.id = pu.user_id
             WHERE pu.project_id = $1 AND pu.status = $2 AND pu.role IN ($3, $4)
               AND pu.enable_notifications AND u.is_active
             ORDER BY u.id",
        )
        .bind(project_id)
        .bind(ACTIVE_MEMBER_STATUS)
        .bind(roles::MANAGER)
        .bind(roles::PRINCIPAL_INVESTIGATOR)
        .fetch_all(executor)
        .await
    }

    pub async fn find_member<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<ProjectUser>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM project_users WHERE project_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ProjectUser>(&query)
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Record a service unit grant to a project member. `allocation` must
    /// parse as a non-negative decimal.
    pub async fn record_transaction<'e, E: PgExecutor<'e>>(
        executor: E,
        project_user_id: DbId,
        allocation: &str,
    ) -> Result<ProjectUserTransaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_user_transactions (project_user_id, allocation)
             VALUES ($1, $2::NUMERIC)
             RETURNING {TRANSACTION_COLUMNS}"
        );
        sqlx::query_as::<_, ProjectUserTransaction>(&query)
            .bind(project_user_id)
            .bind(allocation)
            .fetch_one(executor)
            .await
    }

    /// A member's service unit grants, oldest first.
    pub async fn list_transactions<'e, E: PgExecutor<'e>>(
        executor: E,
        project_user_id: DbId,
    ) -> Result<Vec<ProjectUserTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM project_user_transactions
             WHERE project_user_id = $1
             ORDER BY id"
        );
        sqlx::query_as::<_, ProjectUserTransaction>(&query)
            .bind(project_user_id)
            .fetch_all(executor)
            .await
    }
}
