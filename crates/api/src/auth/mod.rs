//! Authentication primitives.
//!
//! Access tokens are issued by the site's identity service; this server
//! only validates them. See [`jwt`].

pub mod jwt;
