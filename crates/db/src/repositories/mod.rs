//! Repository layer.
//!
//! Each repository is a zero-sized struct of async query functions. Functions
//! that issue a single statement accept any `PgExecutor`, so the same call
//! works on `&PgPool` or on `&mut *tx` inside a transaction.

pub mod allocation_repo;
pub mod allocation_user_repo;
pub mod change_request_repo;
pub mod cluster_access_request_repo;
pub mod history_repo;
pub mod project_repo;
pub mod resource_repo;
pub mod user_repo;

pub use allocation_repo::AllocationRepo;
pub use allocation_user_repo::AllocationUserRepo;
pub use change_request_repo::ChangeRequestRepo;
pub use cluster_access_request_repo::ClusterAccessRequestRepo;
pub use history_repo::HistoryRepo;
pub use project_repo::ProjectRepo;
pub use resource_repo::ResourceRepo;
pub use user_repo::{UserProfileRepo, UserRepo};
