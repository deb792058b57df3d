//! Request handlers.
//!
//! Each submodule provides the async handler functions for one resource.
//! Reads go straight to the repositories in `rcalloc_db`; state changes go
//! through the runners in [`crate::workflow`].

pub mod allocation;
pub mod change_request;
pub mod cluster_access_request;
