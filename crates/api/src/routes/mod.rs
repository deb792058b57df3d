pub mod allocation;
pub mod change_request;
pub mod cluster_access_request;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /cluster-access-requests                         list (staff)
/// /cluster-access-requests/{id}                    get (staff), patch (superuser)
/// /cluster-access-requests/{id}/history            history (staff)
///
/// /allocations/{id}                                get (staff, PI/manager)
/// /allocations/{id}/status                         patch (superuser)
/// /allocations/{id}/history                        history (staff)
/// /allocations/{id}/change-requests                create (superuser, PI/manager)
///
/// /change-requests/{id}                            get (staff, PI/manager)
/// /change-requests/{id}/approve                    approve (superuser)
/// /change-requests/{id}/deny                       deny (superuser)
/// ```
///
/// Any other method on these paths is answered with 405.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/cluster-access-requests",
            cluster_access_request::router(),
        )
        .nest("/allocations", allocation::router())
        .nest("/change-requests", change_request::router())
}
