//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → activation.rs (inherited socket or fallback port → ListenTarget)
//!     ... subsystems register ...
//!     → listener.rs (adopt or bind the ListenTarget)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - The target is resolved once, before any subsystem registers
//! - Binding is deferred until the router is complete

pub mod activation;
pub mod listener;

pub use activation::{resolve_listen_target, ActivationEnv, ListenTarget, SystemdActivation};
pub use listener::{Listener, ListenerError};
