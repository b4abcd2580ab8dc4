//! Declared bus watches.
//!
//! Each watch pairs a match rule with a handler run for every matching
//! signal. Handlers are plain functions over the signal and the services
//! built during registration.

use crate::bus::{MatchRule, Signal};
use crate::config::FeatureFlags;
use crate::subsystems::Services;

const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
const OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

/// One long-lived bus watch.
pub struct Watch {
    pub name: &'static str,
    pub enabled: fn(&FeatureFlags) -> bool,
    pub rule: fn() -> MatchRule,
    pub handler: fn(&Signal, &Services),
}

fn properties_changed() -> MatchRule {
    MatchRule::any().interface(PROPERTIES).member("PropertiesChanged")
}

fn interfaces_added() -> MatchRule {
    MatchRule::any().interface(OBJECT_MANAGER).member("InterfacesAdded")
}

/// Every watch the daemon knows about, in establishment order.
pub static WATCHES: &[Watch] = &[
    Watch {
        name: "state_change",
        enabled: |f| f.ibm_management_console,
        rule: || properties_changed().path_namespace("/xyz/openbmc_project/state"),
        handler: log_change,
    },
    Watch {
        name: "dump_created",
        enabled: |f| f.ibm_management_console,
        rule: || interfaces_added().path_namespace("/xyz/openbmc_project/dump"),
        handler: log_change,
    },
    Watch {
        name: "bios_attribute",
        enabled: |f| f.ibm_management_console,
        rule: || properties_changed().path("/xyz/openbmc_project/bios_config/manager"),
        handler: log_change,
    },
    Watch {
        name: "event_log_created",
        enabled: |f| f.ibm_management_console,
        rule: || interfaces_added().path_namespace("/xyz/openbmc_project/logging"),
        handler: forward_log_entry,
    },
    Watch {
        name: "post_code",
        enabled: |f| f.ibm_management_console,
        rule: || properties_changed().path("/xyz/openbmc_project/state/boot/raw0"),
        handler: log_change,
    },
    Watch {
        name: "hypervisor_network",
        enabled: |f| f.ibm_management_console,
        rule: || properties_changed().path_namespace("/xyz/openbmc_project/network/hypervisor"),
        handler: log_change,
    },
    Watch {
        name: "system_attention_indicator",
        enabled: |f| f.ibm_management_console,
        rule: || properties_changed().path_namespace("/xyz/openbmc_project/led/groups"),
        handler: log_change,
    },
    Watch {
        name: "hostname",
        enabled: |f| f.ssl,
        rule: || properties_changed().path("/xyz/openbmc_project/network/config"),
        handler: hostname_changed,
    },
    Watch {
        name: "user_removed",
        enabled: |_| true,
        rule: || {
            MatchRule::any()
                .interface(OBJECT_MANAGER)
                .member("InterfacesRemoved")
                .path_namespace("/xyz/openbmc_project/user")
        },
        handler: user_removed,
    },
];

fn log_change(signal: &Signal, _: &Services) {
    tracing::info!(path = %signal.path, member = %signal.member, body = %signal.body, "Bus change");
}

fn forward_log_entry(signal: &Signal, services: &Services) {
    let Some(events) = &services.event_service else {
        return log_change(signal, services);
    };
    let message_id = signal.body["MessageId"]
        .as_str()
        .unwrap_or("OpenBMC.0.1.EventLogEntryCreated")
        .to_string();
    let timestamp = signal.body["Timestamp"].as_str().unwrap_or_default().to_string();
    events.publish(timestamp, message_id, vec![signal.path.clone()]);
}

fn hostname_changed(signal: &Signal, _: &Services) {
    match signal.body["HostName"].as_str() {
        Some(hostname) => tracing::info!(hostname, "Hostname changed, certificate needs regeneration"),
        None => tracing::debug!(body = %signal.body, "Network config changed"),
    }
}

fn user_removed(signal: &Signal, services: &Services) {
    let Some(user) = signal.path.rsplit('/').next().filter(|u| !u.is_empty()) else {
        return;
    };
    let closed = services
        .sessions
        .as_ref()
        .map(|s| s.remove_user(user))
        .unwrap_or_default();
    let released: usize = services
        .locks
        .as_ref()
        .map(|locks| closed.iter().map(|token| locks.release_session(token)).sum())
        .unwrap_or(0);
    tracing::info!(user, sessions = closed.len(), locks = released, "User removed");
}
