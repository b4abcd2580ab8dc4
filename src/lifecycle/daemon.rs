//! Top-level run and failure containment.
//!
//! # Responsibilities
//! - Resolve the listen target and build the one runtime context
//! - Run the registration steps, then the bus watches
//! - Bind the listener on the completed router and serve until shutdown
//! - Release the bus on every exit path
//! - Turn whatever escapes into an exit code
//!
//! # Exit codes
//! - `0`: clean shutdown
//! - monitor status: a monitor failed to attach during startup
//! - `1`: any other registration failure
//! - `-1`: anything else, including panics

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::bus::{BusConnection, BusError, LocalBus};
use crate::config::DaemonConfig;
use crate::http::server;
use crate::lifecycle::context::RuntimeContext;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::startup::{register_all, Registrar, StartupError};
use crate::monitors;
use crate::net::{resolve_listen_target, ActivationEnv, Listener, ListenerError, SystemdActivation};

/// Opens the process-wide bus connection.
pub type BusConnector = Box<dyn Fn() -> Result<Box<dyn BusConnection>, BusError> + Send + Sync>;

/// Failure that ends a run.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("daemon has already been started")]
    AlreadyStarted,
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listen target was never applied")]
    ListenerNotApplied,
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Startup(e) => e.exit_code(),
            _ => -1,
        }
    }
}

/// One daemon run.
pub struct Daemon {
    config: Arc<DaemonConfig>,
    activation: Box<dyn ActivationEnv>,
    connect_bus: BusConnector,
    context: OnceLock<Arc<RuntimeContext>>,
    bound: watch::Sender<Option<SocketAddr>>,
}

impl Daemon {
    /// Daemon using systemd activation and an in-process bus.
    pub fn new(config: DaemonConfig) -> Self {
        let (bound, _) = watch::channel(None);
        Self {
            config: Arc::new(config),
            activation: Box::new(SystemdActivation),
            connect_bus: Box::new(|| Ok(Box::new(LocalBus::default()) as Box<dyn BusConnection>)),
            context: OnceLock::new(),
            bound,
        }
    }

    pub fn with_activation(mut self, activation: impl ActivationEnv + 'static) -> Self {
        self.activation = Box::new(activation);
        self
    }

    pub fn with_bus<F>(mut self, connect: F) -> Self
    where
        F: Fn() -> Result<Box<dyn BusConnection>, BusError> + Send + Sync + 'static,
    {
        self.connect_bus = Box::new(connect);
        self
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// The runtime context, once the run has built it.
    pub fn context(&self) -> Option<&Arc<RuntimeContext>> {
        self.context.get()
    }

    /// Address the listener is bound to, once bound.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound.borrow()
    }

    /// Watch for the listener being bound.
    pub fn bound(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.bound.subscribe()
    }

    /// Start everything and serve until `shutdown` resolves.
    ///
    /// Must be called from within the Tokio runtime. The bus is released
    /// when this returns, whatever the outcome.
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.context.get().is_some() {
            return Err(DaemonError::AlreadyStarted);
        }

        let target = resolve_listen_target(self.activation.as_ref(), self.config.listener.default_port);

        let bus = (self.connect_bus)()?;
        tracing::info!(name = bus.unique_name(), "Bus connected");
        let context = Arc::new(RuntimeContext::new(Handle::current(), bus));
        self.context
            .set(Arc::clone(&context))
            .map_err(|_| DaemonError::AlreadyStarted)?;
        let _release = context.release_on_drop();

        let mut registrar = Registrar::new(Arc::clone(&context), Arc::clone(&self.config), target);
        register_all(&mut registrar, &self.config.features)?;
        let listen_target = registrar
            .listen_target()
            .ok_or(DaemonError::ListenerNotApplied)?;
        let (router, services) = registrar.finish();

        monitors::establish_subscriptions(&context, &self.config.features, &services);

        let listener = Listener::bind(listen_target, &self.config.listener).await?;
        self.bound.send_replace(listener.local_addr().ok());

        server::serve(listener, router, shutdown).await?;
        Ok(())
    }

    /// Run until `shutdown` resolves and map the outcome to an exit code.
    pub async fn run_until<F>(&self, shutdown: F) -> i32
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let outcome = AssertUnwindSafe(self.serve_until(shutdown))
            .catch_unwind()
            .await;

        if let Some(context) = self.context.get() {
            context.release_bus();
        }

        match outcome {
            Ok(Ok(())) => {
                tracing::info!("Daemon stopped");
                0
            }
            Ok(Err(DaemonError::Startup(e))) => {
                tracing::error!(error = %e, "Startup failed");
                e.exit_code()
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "fatal");
                e.exit_code()
            }
            Err(panic) => {
                tracing::error!(panic = %panic_message(panic.as_ref()), "fatal");
                -1
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `daemon` on a single-threaded loop until a termination signal.
pub fn run(daemon: Daemon) -> i32 {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "fatal: failed to build runtime");
            return -1;
        }
    };

    let shutdown = Shutdown::new();
    runtime.block_on(async {
        tokio::spawn(signals::forward_to(shutdown.clone()));
        daemon.run_until(shutdown.wait()).await
    })
}
