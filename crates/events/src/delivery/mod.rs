//! Mailer implementations.

pub mod email;
pub mod log;
pub mod memory;
