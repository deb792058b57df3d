//! Handlers for cluster access requests.
//!
//! Staff may read requests and their history. Only superusers may change
//! them, and every change goes through [`ClusterAccessRunner`].

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use rcalloc_core::audit::entity_types;
use rcalloc_core::cluster_access::{unknown_status_message, ClusterAccessPatch, ClusterAccessStatus};
use rcalloc_core::error::CoreError;
use rcalloc_core::policy::{authorize, Action, Resource};
use rcalloc_core::types::DbId;
use rcalloc_core::validation::ValidationErrors;
use rcalloc_db::models::cluster_access_request::{
    ClusterAccessRequestQuery, ClusterAccessRequestResponse, ClusterAccessRequestRow,
};
use rcalloc_db::repositories::{ClusterAccessRequestRepo, HistoryRepo};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;
use crate::workflow::ClusterAccessRunner;

/// GET /api/v1/cluster-access-requests
///
/// List requests ordered by id. `status` accepts the same names and
/// aliases as a PATCH body.
pub async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ClusterAccessRequestQuery>,
) -> AppResult<impl IntoResponse> {
    authorize(&auth.actor(), Action::View, &Resource::ClusterAccessRequest)?;

    let status = match params.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => Some(parse_status_filter(name)?),
        None => None,
    };
    let status = status.map(|s| s.as_str());
    let (limit, offset) = params.limit_offset();

    let count = ClusterAccessRequestRepo::count(&state.pool, status).await?;
    let rows = ClusterAccessRequestRepo::list(&state.pool, status, limit, offset).await?;

    Ok(Json(ListResponse {
        data: rows
            .into_iter()
            .map(ClusterAccessRequestResponse::from)
            .collect(),
        count,
    }))
}

/// GET /api/v1/cluster-access-requests/{id}
pub async fn get_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    authorize(&auth.actor(), Action::View, &Resource::ClusterAccessRequest)?;
    let row = find_detail(&state, id).await?;
    Ok(Json(DataResponse {
        data: ClusterAccessRequestResponse::from(row),
    }))
}

/// PATCH /api/v1/cluster-access-requests/{id}
///
/// Change status, completing or denying the request. Fields other than
/// `status`, `completion_time`, `username` and `cluster_uid` are ignored.
pub async fn update_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(patch): AppJson<ClusterAccessPatch>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor();
    authorize(&actor, Action::Update, &Resource::ClusterAccessRequest)?;

    let runner = ClusterAccessRunner::new(&state.pool, state.mailer.as_ref(), state.workflow());
    let outcome = runner.apply(&actor, id, &patch).await?;

    tracing::info!(
        user_id = auth.user_id,
        request_id = id,
        status = %outcome.request.status,
        changed = outcome.changed,
        email_sent = ?outcome.email_sent,
        "Cluster access request updated"
    );

    let row = find_detail(&state, id).await?;
    Ok(Json(DataResponse {
        data: ClusterAccessRequestResponse::from(row),
    }))
}

/// GET /api/v1/cluster-access-requests/{id}/history
pub async fn request_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    authorize(&auth.actor(), Action::View, &Resource::ClusterAccessRequest)?;
    ClusterAccessRequestRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ClusterAccessRequest",
            id,
        })?;

    let records =
        HistoryRepo::list_for_entity(&state.pool, entity_types::CLUSTER_ACCESS_REQUEST, id).await?;
    let count = records.len() as i64;
    Ok(Json(ListResponse {
        data: records,
        count,
    }))
}

async fn find_detail(state: &AppState, id: DbId) -> AppResult<ClusterAccessRequestRow> {
    ClusterAccessRequestRepo::find_detail(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "ClusterAccessRequest",
                id,
            })
        })
}

fn parse_status_filter(name: &str) -> Result<ClusterAccessStatus, ValidationErrors> {
    ClusterAccessStatus::from_name(name).ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.push_invalid(Some("status"), unknown_status_message(name));
        errors
    })
}
