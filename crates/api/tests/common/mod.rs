#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use rcalloc_core::config::WorkflowConfig;
use rcalloc_db::models::allocation::CreateAllocation;
use rcalloc_db::models::cluster_access_request::CreateClusterAccessRequest;
use rcalloc_db::models::project::{roles, CreateProject, CreateProjectUser};
use rcalloc_db::models::resource::CreateResource;
use rcalloc_db::models::user::CreateUser;
use rcalloc_db::repositories::{
    AllocationRepo, AllocationUserRepo, ClusterAccessRequestRepo, ProjectRepo, ResourceRepo,
    UserRepo,
};
use rcalloc_events::MemoryMailer;
use sqlx::PgPool;
use tower::ServiceExt;

use rcalloc_api::auth::jwt::{generate_access_token, JwtConfig};
use rcalloc_api::config::ServerConfig;
use rcalloc_api::router::build_app_router;
use rcalloc_api::state::AppState;

pub const PRIMARY_COMPUTE: &str = "Savio Compute";
pub const SERVICE_UNITS: &str = "300000.00";

fn test_jwt() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        access_token_expiry_mins: 15,
    }
}

/// Build a test `ServerConfig` with safe defaults and email turned on.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        expiry_interval_secs: 86_400,
        jwt: test_jwt(),
        workflow: WorkflowConfig {
            email_enabled: true,
            primary_compute_resource: Some(PRIMARY_COMPUTE.to_string()),
            ..Default::default()
        },
    }
}

/// Build the full application router with a fresh in-memory mailer.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_mailer(pool, Arc::new(MemoryMailer::new()))
}

/// Build the full application router around the given mailer so tests can
/// inspect what was sent.
pub fn build_test_app_with_mailer(pool: PgPool, mailer: Arc<MemoryMailer>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        mailer,
    };
    build_app_router(state, &config)
}

/// Bearer token for a user with the given account flags.
pub fn token(user_id: i64, is_staff: bool, is_superuser: bool) -> String {
    generate_access_token(user_id, is_staff, is_superuser, &test_jwt()).unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn patch_json(app: Router, uri: &str, token: &str, body: serde_json::Value) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Ids of everything [`seed`] creates.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub superuser_id: i64,
    pub staff_id: i64,
    pub pi_id: i64,
    /// The user the cluster access request is for.
    pub member_id: i64,
    /// A user with no role in the project.
    pub outsider_id: i64,
    pub project_id: i64,
    pub allocation_id: i64,
    pub allocation_user_id: i64,
    pub request_id: i64,
}

impl Fixture {
    pub fn superuser_token(&self) -> String {
        token(self.superuser_id, true, true)
    }

    pub fn staff_token(&self) -> String {
        token(self.staff_id, true, false)
    }

    pub fn pi_token(&self) -> String {
        token(self.pi_id, false, false)
    }

    pub fn member_token(&self) -> String {
        token(self.member_id, false, false)
    }

    pub fn outsider_token(&self) -> String {
        token(self.outsider_id, false, false)
    }

    pub fn request_uri(&self) -> String {
        format!("/api/v1/cluster-access-requests/{}", self.request_id)
    }
}

pub async fn create_user(pool: &PgPool, username: &str, is_staff: bool, is_superuser: bool) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    UserRepo::create(
        &mut conn,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.edu"),
            first_name: Some(username.to_string()),
            last_name: Some("Tester".to_string()),
            is_staff: Some(is_staff),
            is_superuser: Some(is_superuser),
        },
    )
    .await
    .unwrap()
    .id
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create an allocation on `project_id` covering the primary compute
/// resource, with a service units attribute.
pub async fn create_allocation(
    pool: &PgPool,
    project_id: i64,
    status: &str,
    end_date: NaiveDate,
) -> i64 {
    let allocation = AllocationRepo::create(
        pool,
        &CreateAllocation {
            project_id,
            status: Some(status.to_string()),
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(end_date),
            justification: Some("Research".to_string()),
            is_changeable: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let resource = match ResourceRepo::find_by_name(pool, PRIMARY_COMPUTE).await.unwrap() {
        Some(r) => r,
        None => ResourceRepo::create(
            pool,
            &CreateResource {
                name: PRIMARY_COMPUTE.to_string(),
                resource_type: Some("Cluster".to_string()),
            },
        )
        .await
        .unwrap(),
    };
    ResourceRepo::attach_to_allocation(pool, allocation.id, resource.id)
        .await
        .unwrap();
    AllocationRepo::upsert_attribute(pool, allocation.id, "Service Units", SERVICE_UNITS)
        .await
        .unwrap();
    allocation.id
}

/// A superuser, a staff member, a project with a PI and a member, an
/// Active allocation, and a pending cluster access request for the member.
pub async fn seed(pool: &PgPool) -> Fixture {
    let superuser_id = create_user(pool, "admin", true, true).await;
    let staff_id = create_user(pool, "staff", true, false).await;
    let pi_id = create_user(pool, "pi", false, false).await;
    let member_id = create_user(pool, "member", false, false).await;
    let outsider_id = create_user(pool, "outsider", false, false).await;

    let project = ProjectRepo::create(
        pool,
        &CreateProject {
            name: "fc_research".to_string(),
            title: Some("Research".to_string()),
            status: None,
        },
    )
    .await
    .unwrap();
    for (user_id, role) in [
        (pi_id, roles::PRINCIPAL_INVESTIGATOR),
        (member_id, roles::USER),
    ] {
        ProjectRepo::add_user(
            pool,
            &CreateProjectUser {
                project_id: project.id,
                user_id,
                role: role.to_string(),
                enable_notifications: None,
            },
        )
        .await
        .unwrap();
    }

    let allocation_id = create_allocation(pool, project.id, "Active", date(2030, 1, 1)).await;
    let allocation_user = AllocationUserRepo::create(pool, allocation_id, member_id, "Active")
        .await
        .unwrap();
    let request = ClusterAccessRequestRepo::create(
        pool,
        &CreateClusterAccessRequest {
            allocation_user_id: allocation_user.id,
            status: None,
            host_user_id: None,
        },
    )
    .await
    .unwrap();

    Fixture {
        superuser_id,
        staff_id,
        pi_id,
        member_id,
        outsider_id,
        project_id: project.id,
        allocation_id,
        allocation_user_id: allocation_user.id,
        request_id: request.id,
    }
}
