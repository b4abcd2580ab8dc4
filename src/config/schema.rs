//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port used when no activation socket is handed to the daemon.
pub const DEFAULT_PORT: u16 = 18080;

/// Root configuration for the management daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Listener configuration (fallback port, connection limits).
    pub listener: ListenerConfig,

    /// Which optional subsystems get registered.
    pub features: FeatureFlags,

    /// Static asset hosting.
    pub assets: AssetConfig,

    /// Event log monitor settings.
    pub event_log: EventLogConfig,

    /// Aggregation satellites.
    pub aggregation: AggregationConfig,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port bound when socket activation is absent or unusable.
    pub default_port: u16,

    /// Address bound together with `default_port`.
    pub bind_host: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            bind_host: "0.0.0.0".to_string(),
            max_connections: 100,
        }
    }
}

/// Named booleans gating the optional subsystems.
///
/// Resolved once before registration starts and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FeatureFlags {
    pub static_hosting: bool,
    pub kvm: bool,
    pub redfish: bool,
    pub redfish_aggregation: bool,
    pub dbus_rest: bool,
    pub event_subscription_websocket: bool,
    pub host_serial_websocket: bool,
    pub bmc_shell_websocket: bool,
    pub hypervisor_serial_websocket: bool,
    pub vm_websocket: bool,
    pub ibm_management_console: bool,
    pub google_api: bool,
    pub insecure_disable_xss_prevention: bool,
    pub vm_nbdproxy: bool,
    /// Watch the on-disk event log and forward new entries to the event service.
    pub event_log_monitor: bool,
    /// TLS is terminated by this daemon; enables the hostname monitor.
    pub ssl: bool,
}

impl FeatureFlags {
    /// Every optional subsystem switched on.
    pub fn all() -> Self {
        Self {
            static_hosting: true,
            kvm: true,
            redfish: true,
            redfish_aggregation: true,
            dbus_rest: true,
            event_subscription_websocket: true,
            host_serial_websocket: true,
            bmc_shell_websocket: true,
            hypervisor_serial_websocket: true,
            vm_websocket: true,
            ibm_management_console: true,
            google_api: true,
            insecure_disable_xss_prevention: true,
            vm_nbdproxy: true,
            event_log_monitor: true,
            ssl: true,
        }
    }
}

/// Static asset hosting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory whose files are published one route per file.
    pub root: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/usr/share/www"),
        }
    }
}

/// Event log monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Directory holding the event log; must exist for the monitor to start.
    pub directory: PathBuf,

    /// Log file name inside `directory`.
    pub file_name: String,

    /// Exit status reported when the monitor cannot attach.
    pub failure_status: i32,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/log"),
            file_name: "redfish".to_string(),
            failure_status: 2,
        }
    }
}

/// Aggregation satellite configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AggregationConfig {
    /// Satellite management endpoints, keyed by prefix.
    pub satellites: Vec<SatelliteConfig>,
}

/// A single satellite management controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SatelliteConfig {
    /// Prefix prepended to resource ids owned by this satellite.
    pub prefix: String,

    /// Base URL of the satellite.
    pub url: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token accepted as `Authorization: Bearer <token>`.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log everything at debug level instead of `log_level`.
    pub debug_logging: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl ObservabilityConfig {
    /// Level the log filter starts from when `RUST_LOG` is not set.
    pub fn effective_level(&self) -> &str {
        if self.debug_logging {
            "debug"
        } else {
            &self.log_level
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_level: "error".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
