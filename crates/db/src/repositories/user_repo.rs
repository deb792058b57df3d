//! Repository for the `users` and `user_profiles` tables.

use rcalloc_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::models::user::{CreateUser, User, UserProfile};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, first_name, last_name, is_active, \
                       is_staff, is_superuser, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, user_id, cluster_uid, is_pi, created_at, updated_at";

/// Provides queries for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user and its empty profile, returning the user row.
    pub async fn create(conn: &mut PgConnection, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, first_name, last_name, is_staff, is_superuser)
             VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, ''),
                     COALESCE($5, false), COALESCE($6, false))
             RETURNING {COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.is_staff)
            .bind(input.is_superuser)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *conn)
            .await?;

        Ok(user)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username<'e, E: PgExecutor<'e>>(
        executor: E,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(executor)
            .await
    }

    /// Whether `username` belongs to some user other than `user_id`.
    pub async fn username_taken_by_other<'e, E: PgExecutor<'e>>(
        executor: E,
        username: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)",
        )
        .bind(username)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Set a user's username, returning the updated row.
    pub async fn set_username<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("UPDATE users SET username = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(username)
            .fetch_optional(executor)
            .await
    }
}

/// Provides queries for user profiles.
pub struct UserProfileRepo;

impl UserProfileRepo {
    pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: DbId,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1");
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Whether `cluster_uid` is held by a profile of some user other than `user_id`.
    pub async fn cluster_uid_taken_by_other<'e, E: PgExecutor<'e>>(
        executor: E,
        cluster_uid: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM user_profiles WHERE cluster_uid = $1 AND user_id <> $2
             )",
        )
        .bind(cluster_uid)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Set the cluster uid on a user's profile, returning the updated row.
    pub async fn set_cluster_uid<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: DbId,
        cluster_uid: &str,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        let query = format!(
            "UPDATE user_profiles SET cluster_uid = $2 WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(user_id)
            .bind(cluster_uid)
            .fetch_optional(executor)
            .await
    }
}
