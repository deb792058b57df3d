//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts where the API or tests create rows
//! - Response shapes for joined reads where the API needs them

pub mod allocation;
pub mod change_request;
pub mod cluster_access_request;
pub mod history;
pub mod project;
pub mod resource;
pub mod user;
