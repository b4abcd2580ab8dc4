//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run (daemon.rs):
//!     Resolve listen target → Build context → Register steps (startup.rs)
//!     → Establish bus watches → Bind → Serve → Release bus
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: listen target, then context, then subsystems, then listener
//! - One context per run; the bus inside it is cleared on every exit path
//! - Failures are contained in `Daemon::run_until` and become exit codes

pub mod context;
pub mod daemon;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use context::RuntimeContext;
pub use daemon::{run, Daemon, DaemonError};
pub use shutdown::Shutdown;
pub use startup::{register_all, Registrar, StartupError};
