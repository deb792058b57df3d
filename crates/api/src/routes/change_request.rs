use axum::routing::{get, post};
use axum::Router;

use crate::handlers::change_request;
use crate::state::AppState;

/// Change request routes, nested under `/change-requests`.
///
/// ```text
/// GET    /{id}            get_change_request
/// POST   /{id}/approve    approve_change_request
/// POST   /{id}/deny       deny_change_request
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(change_request::get_change_request))
        .route("/{id}/approve", post(change_request::approve_change_request))
        .route("/{id}/deny", post(change_request::deny_change_request))
}
