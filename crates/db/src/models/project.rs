//! Project and project membership models.

use rcalloc_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Project user role names, as stored in `project_users.role`.
pub mod roles {
    pub const USER: &str = "User";
    pub const MANAGER: &str = "Manager";
    pub const PRINCIPAL_INVESTIGATOR: &str = "Principal Investigator";
}

/// Membership status that counts as current.
pub const ACTIVE_MEMBER_STATUS: &str = "Active";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub title: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectUser {
    pub id: DbId,
    pub project_id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub status: String,
    pub enable_notifications: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A service unit grant to one project member. `allocation` is the decimal
/// amount rendered as text.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectUserTransaction {
    pub id: DbId,
    pub project_user_id: DbId,
    pub date_time: Timestamp,
    pub allocation: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub title: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectUser {
    pub project_id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub enable_notifications: Option<bool>,
}
