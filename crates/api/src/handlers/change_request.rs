//! Handlers for reviewing allocation change requests.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use rcalloc_core::error::CoreError;
use rcalloc_core::policy::{authorize, Action, Resource};
use rcalloc_core::types::DbId;
use rcalloc_core::validation::ValidationErrors;
use rcalloc_db::models::change_request::{ChangeRequestDetail, ReviewChangeRequest};
use rcalloc_db::repositories::{ChangeRequestRepo, ProjectRepo};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::handlers::allocation::ensure_allocation_exists;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireSuperuser;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::workflow::ChangeRequestRunner;

/// GET /api/v1/change-requests/{id}
pub async fn get_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let change_request = ChangeRequestRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ChangeRequest",
            id,
        })?;
    let allocation = ensure_allocation_exists(&state.pool, change_request.allocation_id).await?;
    let managers = ProjectRepo::manager_ids(&state.pool, allocation.project_id).await?;
    authorize(
        &auth.actor(),
        Action::View,
        &Resource::ChangeRequest {
            project_managers: &managers,
        },
    )?;

    let attribute_changes = ChangeRequestRepo::list_items(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: ChangeRequestDetail {
            change_request,
            attribute_changes,
        },
    }))
}

/// POST /api/v1/change-requests/{id}/approve
pub async fn approve_change_request(
    RequireSuperuser(auth): RequireSuperuser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(review): AppJson<ReviewChangeRequest>,
) -> AppResult<impl IntoResponse> {
    review
        .validate()
        .map_err(|e| ValidationErrors::from_field_errors(&e))?;

    let runner = ChangeRequestRunner::new(&state.pool, state.mailer.as_ref(), state.workflow());
    let detail = runner.approve(&auth.actor(), id, &review).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/change-requests/{id}/deny
pub async fn deny_change_request(
    RequireSuperuser(auth): RequireSuperuser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(review): AppJson<ReviewChangeRequest>,
) -> AppResult<impl IntoResponse> {
    review
        .validate()
        .map_err(|e| ValidationErrors::from_field_errors(&e))?;

    let runner = ChangeRequestRunner::new(&state.pool, state.mailer.as_ref(), state.workflow());
    let detail = runner.deny(&auth.actor(), id, &review).await?;
    Ok(Json(DataResponse { data: detail }))
}
