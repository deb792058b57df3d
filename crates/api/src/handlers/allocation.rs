//! Handlers for allocations: detail, status changes, history, and new
//! change requests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use rcalloc_core::audit::entity_types;
use rcalloc_core::error::CoreError;
use rcalloc_core::policy::{authorize, Action, Resource};
use rcalloc_core::types::DbId;
use rcalloc_db::models::allocation::{Allocation, AllocationDetail, UpdateAllocationStatus};
use rcalloc_db::models::change_request::CreateChangeRequest;
use rcalloc_db::repositories::{AllocationRepo, HistoryRepo, ProjectRepo};
use rcalloc_db::DbPool;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireStaff, RequireSuperuser};
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;
use crate::workflow::allocation_status::parse_status;
use crate::workflow::{AllocationStatusRunner, ChangeRequestRunner};

/// Load an allocation or fail with 404.
pub(crate) async fn ensure_allocation_exists(pool: &DbPool, id: DbId) -> AppResult<Allocation> {
    Ok(AllocationRepo::find_by_id(pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Allocation",
            id,
        })?)
}

/// GET /api/v1/allocations/{id}
///
/// Allocation with its resource names and attributes. Visible to staff and
/// to the project's PIs and managers.
pub async fn get_allocation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let allocation = ensure_allocation_exists(&state.pool, id).await?;
    let managers = ProjectRepo::manager_ids(&state.pool, allocation.project_id).await?;
    authorize(
        &auth.actor(),
        Action::View,
        &Resource::Allocation {
            project_managers: &managers,
        },
    )?;

    let resources = AllocationRepo::resource_names(&state.pool, id).await?;
    let attributes = AllocationRepo::list_attributes(&state.pool, id).await?;

    Ok(Json(DataResponse {
        data: AllocationDetail {
            allocation,
            resources,
            attributes,
        },
    }))
}

/// PATCH /api/v1/allocations/{id}/status
pub async fn update_allocation_status(
    RequireSuperuser(auth): RequireSuperuser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateAllocationStatus>,
) -> AppResult<impl IntoResponse> {
    let target = parse_status(&input.status)?;
    let actor = auth.actor();

    let runner = AllocationStatusRunner::new(&state.pool, state.mailer.as_ref(), state.workflow());
    let allocation = runner
        .change_status(Some(&actor), id, target, Utc::now().date_naive())
        .await?;

    Ok(Json(DataResponse { data: allocation }))
}

/// GET /api/v1/allocations/{id}/history
pub async fn allocation_history(
    RequireStaff(_auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_allocation_exists(&state.pool, id).await?;
    let records = HistoryRepo::list_for_entity(&state.pool, entity_types::ALLOCATION, id).await?;
    let count = records.len() as i64;
    Ok(Json(ListResponse {
        data: records,
        count,
    }))
}

/// POST /api/v1/allocations/{id}/change-requests
///
/// Open a change request. Superusers and the project's PIs and managers
/// only.
pub async fn create_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<CreateChangeRequest>,
) -> AppResult<impl IntoResponse> {
    let runner = ChangeRequestRunner::new(&state.pool, state.mailer.as_ref(), state.workflow());
    let detail = runner.create(&auth.actor(), id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}
