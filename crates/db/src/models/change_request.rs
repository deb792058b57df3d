//! Allocation change request models.

use rcalloc_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChangeRequest {
    pub id: DbId,
    pub allocation_id: DbId,
    pub status: String,
    pub end_date_extension: Option<i32>,
    pub justification: String,
    pub notes: Option<String>,
    pub requested_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One attribute line item, joined with the attribute's name and current value.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttributeChangeRequest {
    pub id: DbId,
    pub change_request_id: DbId,
    pub allocation_attribute_id: DbId,
    pub attribute_name: String,
    pub current_value: String,
    pub new_value: String,
}

/// A change request with its attribute line items.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRequestDetail {
    #[serde(flatten)]
    pub change_request: ChangeRequest,
    pub attribute_changes: Vec<AttributeChangeRequest>,
}

/// Proposed new value for one allocation attribute.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAttributeChange {
    pub allocation_attribute_id: DbId,
    #[validate(length(max = 1000, message = "new_value must be at most 1000 characters."))]
    pub new_value: String,
}

/// Body of `POST /allocations/{id}/change-requests`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChangeRequest {
    pub end_date_extension: Option<i32>,
    #[validate(length(min = 1, max = 5000, message = "justification must be 1 to 5000 characters."))]
    pub justification: String,
    #[validate(length(max = 5000, message = "notes must be at most 5000 characters."))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub attribute_changes: Vec<CreateAttributeChange>,
}

/// Body of the approve / deny endpoints.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewChangeRequest {
    #[validate(length(max = 5000, message = "notes must be at most 5000 characters."))]
    pub notes: Option<String>,
}
