//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (allow-list, bearer token, session token)
//!     → handler
//! Outgoing response:
//!     → headers.rs (HSTS, frame options, CSP, ...)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any authentication failure
//! - No trust in client input

pub mod auth;
pub mod headers;

pub use auth::{AllowList, AuthState, SessionStore};
