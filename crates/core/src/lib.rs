//! Domain logic for research-computing allocations.
//!
//! Everything in this crate is pure: status enums, transition planning,
//! validation aggregation, audit diffing, and access policy. Persistence
//! lives in `rcalloc-db`; HTTP and side effects live in `rcalloc-api`.

pub mod allocation;
pub mod audit;
pub mod cluster_access;
pub mod config;
pub mod error;
pub mod policy;
pub mod types;
pub mod validation;
