use axum::routing::get;
use axum::Router;

use crate::handlers::cluster_access_request;
use crate::state::AppState;

/// Cluster access request routes, nested under `/cluster-access-requests`.
///
/// ```text
/// GET    /                  list_requests
/// GET    /{id}              get_request
/// PATCH  /{id}              update_request
/// GET    /{id}/history      request_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cluster_access_request::list_requests))
        .route(
            "/{id}",
            get(cluster_access_request::get_request).patch(cluster_access_request::update_request),
        )
        .route("/{id}/history", get(cluster_access_request::request_history))
}
