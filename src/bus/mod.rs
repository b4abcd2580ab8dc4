//! Inter-process bus plumbing.
//!
//! # Data Flow
//! ```text
//! Subsystems / watches ── add_match(rule) ──► BusConnection ──► SignalStream
//! Subsystems ──────────── emit(signal) ─────►      │
//!                                                  └─► every stream whose rule matches
//! ```
//!
//! # Design Decisions
//! - One connection per process, owned by the runtime context
//! - Transport is behind the `BusConnection` trait

pub mod connection;
pub mod signal;

pub use connection::{BusConnection, BusError, LocalBus, SignalStream};
pub use signal::{MatchRule, Signal};
