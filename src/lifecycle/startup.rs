//! Startup orchestration.
//!
//! # Responsibilities
//! - Walk the fixed, ordered table of registration steps
//! - Skip steps whose feature flag is off
//! - Stop at the first failing step and report it
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is rolled back
//! - Subsystems initialize in order, not concurrently
//! - Static assets register before authentication, which snapshots them
//! - The protocol service registers before the managers that depend on it
//! - The listen target is applied after every route; binding happens later

use std::sync::Arc;

use axum::{routing::MethodRouter, Router};

use crate::bus::BusError;
use crate::config::{DaemonConfig, FeatureFlags};
use crate::http::{App, DuplicateRoute, RouteKind};
use crate::lifecycle::context::RuntimeContext;
use crate::net::ListenTarget;
use crate::observability::metrics;
use crate::subsystems::{self, Services};

/// A registration step failed; the daemon will not start serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    DuplicateRoute(#[from] DuplicateRoute),
    #[error("`{step}` requires `{requires}` to be registered first")]
    MissingDependency {
        step: &'static str,
        requires: &'static str,
    },
    #[error("`{step}` failed: {reason}")]
    Failed { step: &'static str, reason: String },
    #[error("{monitor} monitor failed to start (status {status})")]
    Monitor { monitor: &'static str, status: i32 },
    #[error("bus unavailable during startup: {0}")]
    Bus(#[from] BusError),
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Monitor { status, .. } if *status != 0 => *status,
            _ => 1,
        }
    }
}

/// One entry of the registration table.
pub struct Step {
    pub name: &'static str,
    pub enabled: fn(&FeatureFlags) -> bool,
    pub register: fn(&mut Registrar) -> Result<(), StartupError>,
}

fn always(_: &FeatureFlags) -> bool {
    true
}

/// Registration order. Position in this table is the dependency order.
pub static STEPS: &[Step] = &[
    Step {
        name: "static_assets",
        enabled: |f| f.static_hosting,
        register: subsystems::assets::register,
    },
    Step {
        name: "kvm",
        enabled: |f| f.kvm,
        register: subsystems::consoles::register_kvm,
    },
    Step {
        name: "redfish",
        enabled: |f| f.redfish,
        register: subsystems::redfish::register,
    },
    Step {
        name: "event_service",
        enabled: |f| f.redfish,
        register: subsystems::redfish::event_service::register,
    },
    Step {
        name: "aggregator",
        enabled: |f| f.redfish && f.redfish_aggregation,
        register: subsystems::redfish::aggregator::register,
    },
    Step {
        name: "dbus_rest",
        enabled: |f| f.dbus_rest,
        register: subsystems::dbus_rest::register,
    },
    Step {
        name: "signal_socket",
        enabled: |f| f.event_subscription_websocket,
        register: subsystems::signal_socket::register,
    },
    Step {
        name: "host_console",
        enabled: |f| f.host_serial_websocket,
        register: subsystems::consoles::register_host_console,
    },
    Step {
        name: "bmc_shell",
        enabled: |f| f.bmc_shell_websocket,
        register: subsystems::consoles::register_bmc_shell,
    },
    Step {
        name: "hypervisor_console",
        enabled: |f| f.hypervisor_serial_websocket,
        register: subsystems::consoles::register_hypervisor_console,
    },
    Step {
        name: "virtual_media",
        enabled: |f| f.vm_websocket,
        register: subsystems::consoles::register_virtual_media,
    },
    Step {
        name: "ibm_management_console",
        enabled: |f| f.ibm_management_console,
        register: subsystems::ibm::register,
    },
    Step {
        name: "google_api",
        enabled: |f| f.google_api,
        register: subsystems::google::register,
    },
    Step {
        name: "cors_preflight",
        enabled: |f| f.insecure_disable_xss_prevention,
        register: subsystems::cors::register,
    },
    Step {
        name: "authentication",
        enabled: always,
        register: subsystems::login::register,
    },
    Step {
        name: "nbd_proxy",
        enabled: |f| f.vm_nbdproxy,
        register: subsystems::consoles::register_nbd_proxy,
    },
    Step {
        name: "listener",
        enabled: always,
        register: |r| {
            r.apply_listen_target();
            Ok(())
        },
    },
    Step {
        name: "event_log_monitor",
        enabled: |f| f.event_log_monitor,
        register: subsystems::event_log::register,
    },
];

/// Shared context plus everything registered so far.
pub struct Registrar {
    context: Arc<RuntimeContext>,
    config: Arc<DaemonConfig>,
    app: App,
    services: Services,
    resolved_target: ListenTarget,
    listen_target: Option<ListenTarget>,
    completed: Vec<&'static str>,
}

impl Registrar {
    pub fn new(context: Arc<RuntimeContext>, config: Arc<DaemonConfig>, target: ListenTarget) -> Self {
        Self {
            context,
            config,
            app: App::new(),
            services: Services::default(),
            resolved_target: target,
            listen_target: None,
            completed: Vec::new(),
        }
    }

    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Register a route on behalf of `owner`.
    pub fn route(
        &mut self,
        owner: &'static str,
        path: &str,
        kind: RouteKind,
        method_router: MethodRouter,
    ) -> Result<(), StartupError> {
        self.app.route(owner, path, kind, method_router)?;
        Ok(())
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Point the listener at the target resolved before registration.
    pub fn apply_listen_target(&mut self) {
        tracing::info!(target = %self.resolved_target, "Listen target applied");
        self.listen_target = Some(self.resolved_target);
    }

    pub fn listen_target(&self) -> Option<ListenTarget> {
        self.listen_target
    }

    /// Names of the steps that completed, in order.
    pub fn completed(&self) -> &[&'static str] {
        &self.completed
    }

    /// Finished router plus the constructed services.
    pub fn finish(self) -> (Router, Services) {
        let router = self
            .app
            .into_router(&self.config.timeouts, &self.config.listener);
        (router, self.services)
    }
}

/// Run every enabled step in table order.
pub fn register_all(registrar: &mut Registrar, flags: &FeatureFlags) -> Result<(), StartupError> {
    register_steps(registrar, flags, STEPS)
}

/// Run every enabled step of `steps` in order; stops at the first error.
pub fn register_steps(
    registrar: &mut Registrar,
    flags: &FeatureFlags,
    steps: &[Step],
) -> Result<(), StartupError> {
    for step in steps {
        if !(step.enabled)(flags) {
            tracing::debug!(step = step.name, "Step disabled");
            continue;
        }
        if registrar.completed.contains(&step.name) {
            tracing::warn!(step = step.name, "Step already registered, skipping");
            continue;
        }

        if let Err(e) = (step.register)(registrar) {
            tracing::error!(step = step.name, error = %e, "Registration failed");
            return Err(e);
        }
        registrar.completed.push(step.name);
        metrics::record_registration(step.name);
        tracing::debug!(step = step.name, "Step registered");
    }

    tracing::info!(
        steps = registrar.completed.len(),
        routes = registrar.app.routes().len(),
        "Subsystems registered"
    );
    Ok(())
}
