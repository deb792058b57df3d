use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::allocation;
use crate::state::AppState;

/// Allocation routes, nested under `/allocations`.
///
/// ```text
/// GET    /{id}                    get_allocation
/// PATCH  /{id}/status             update_allocation_status
/// GET    /{id}/history            allocation_history
/// POST   /{id}/change-requests    create_change_request
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(allocation::get_allocation))
        .route("/{id}/status", patch(allocation::update_allocation_status))
        .route("/{id}/history", get(allocation::allocation_history))
        .route(
            "/{id}/change-requests",
            post(allocation::create_change_request),
        )
}
