//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Subsystem registration
//!     → app.rs (route table, ownership, allow-list source)
//!     → app.rs into_router (auth, limits, headers, request ID, tracing)
//!     → server.rs (serve on the bound listener until shutdown)
//! ```

pub mod app;
pub mod request;
pub mod server;
pub mod websocket;

pub use app::{App, DuplicateRoute, RouteEntry, RouteKind};
pub use request::X_REQUEST_ID;
