//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All tasks accept a [`CancellationToken`]
//! for graceful shutdown and share nothing in-process with request
//! handlers; they coordinate through the database.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod allocation_expiry;
