//! Allocation, allocation attribute, and allocation user models.

use rcalloc_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Allocation {
    pub id: DbId,
    pub project_id: DbId,
    pub status: String,
    pub quantity: i32,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub justification: String,
    pub description: Option<String>,
    pub is_locked: bool,
    pub is_changeable: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an allocation. Defaults to status `New`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAllocation {
    pub project_id: DbId,
    pub status: Option<String>,
    pub quantity: Option<i32>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub justification: Option<String>,
    pub description: Option<String>,
    pub is_locked: Option<bool>,
    pub is_changeable: Option<bool>,
}

/// Body of `PATCH /allocations/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAllocationStatus {
    pub status: String,
}

/// An allocation with its resource names and attributes, for API reads.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationDetail {
    #[serde(flatten)]
    pub allocation: Allocation,
    pub resources: Vec<String>,
    pub attributes: Vec<AllocationAttribute>,
}

// ---------------------------------------------------------------------------
// Allocation attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AllocationAttribute {
    pub id: DbId,
    pub allocation_id: DbId,
    pub name: String,
    pub value: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Allocation users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AllocationUser {
    pub id: DbId,
    pub allocation_id: DbId,
    pub user_id: DbId,
    pub status: String,
    pub usage_bytes: Option<i64>,
    pub usage: f64,
    pub unit: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AllocationUserAttribute {
    pub id: DbId,
    pub allocation_user_id: DbId,
    pub name: String,
    pub value: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
