//! Registrable subsystems.
//!
//! Each module exposes `register(&mut Registrar) -> Result<(), StartupError>`
//! and is wired into the ordered step table in `lifecycle::startup`. Managers
//! that other steps depend on are constructed explicitly by their step and
//! parked in [`Services`].
//!
//! # Data Flow
//! ```text
//! STEPS (ordered, flag-gated)
//!     → assets / consoles / redfish / dbus_rest / ibm / google / cors
//!     → login (auth allow-list from the routes above)
//!     → nbd proxy
//!     → listener target
//!     → event_log (background monitor, may fail with a status)
//! ```

use std::sync::Arc;

pub mod assets;
pub mod consoles;
pub mod cors;
pub mod dbus_rest;
pub mod event_log;
pub mod google;
pub mod ibm;
pub mod login;
pub mod redfish;
pub mod signal_socket;

use crate::security::SessionStore;

/// Long-lived managers built during registration.
#[derive(Clone, Default)]
pub struct Services {
    pub sessions: Option<Arc<SessionStore>>,
    pub redfish: Option<Arc<redfish::RedfishService>>,
    pub event_service: Option<Arc<redfish::event_service::EventServiceManager>>,
    pub aggregator: Option<Arc<redfish::aggregator::RedfishAggregator>>,
    pub locks: Option<Arc<ibm::LockManager>>,
}
