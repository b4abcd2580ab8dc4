//! Management daemon startup orchestrator.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                              mgmtd                               │
//!   │                                                                  │
//!   │  ┌────────────┐   ┌──────────────┐   ┌────────────────────────┐  │
//!   │  │    net     │──▶│  lifecycle   │──▶│       subsystems       │  │
//!   │  │ activation │   │ context +    │   │ assets, redfish, ibm,  │  │
//!   │  │ listener   │   │ step table   │   │ consoles, login, ...   │  │
//!   │  └────────────┘   └──────┬───────┘   └───────────┬────────────┘  │
//!   │                          │                       │               │
//!   │                          ▼                       ▼               │
//!   │                   ┌────────────┐          ┌────────────┐         │
//!   │                   │  monitors  │◀── bus ──│    http    │         │
//!   │                   │ bus watches│          │ app/server │         │
//!   │                   └────────────┘          └────────────┘         │
//!   │                                                                  │
//!   │  Cross-cutting: config, observability, security                  │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod monitors;
pub mod net;
pub mod observability;
pub mod security;
pub mod subsystems;

pub use config::{DaemonConfig, FeatureFlags};
pub use lifecycle::{run, Daemon, DaemonError, RuntimeContext, Shutdown};
pub use net::ListenTarget;
