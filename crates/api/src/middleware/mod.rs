//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireStaff`] -- Requires a staff or superuser account.
//! - [`rbac::RequireSuperuser`] -- Requires a superuser account.

pub mod auth;
pub mod rbac;
