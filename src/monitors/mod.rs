//! Long-lived bus subscriptions established after registration.
//!
//! ## Architecture
//! ```text
//! establish_subscriptions
//!     ├──► add_match(rule 1) ──► task 1 ──► handler 1
//!     ├──► add_match(rule 2) ──► task 2 ──► handler 2
//!     └──► add_match(rule N) ──► task N ──► handler N
//! ```
//!
//! ## Rules
//! - **Independent**: a watch that fails to install is logged and counted, the rest still start
//! - **Isolated**: a panicking handler loses that signal only
//! - **Lifetime**: tasks run until the bus closes or the loop exits

pub mod watches;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::FeatureFlags;
use crate::lifecycle::context::RuntimeContext;
use crate::observability::metrics;
use crate::subsystems::Services;

pub use watches::{Watch, WATCHES};

/// Outcome of establishing the watch set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub established: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// Install every enabled watch from [`WATCHES`].
pub fn establish_subscriptions(
    context: &Arc<RuntimeContext>,
    flags: &FeatureFlags,
    services: &Services,
) -> SubscriptionReport {
    establish(context, flags, services, WATCHES)
}

/// Install every enabled watch of `watches`.
pub fn establish(
    context: &Arc<RuntimeContext>,
    flags: &FeatureFlags,
    services: &Services,
    watches: &'static [Watch],
) -> SubscriptionReport {
    let mut report = SubscriptionReport::default();

    for watch in watches.iter().filter(|w| (w.enabled)(flags)) {
        let stream = context.bus().and_then(|bus| bus.add_match((watch.rule)()));
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(watch = watch.name, error = %e, "Failed to establish bus watch");
                metrics::record_subscription(watch.name, false);
                report.failed.push(watch.name);
                continue;
            }
        };

        metrics::record_subscription(watch.name, true);
        report.established.push(watch.name);
        tracing::debug!(watch = watch.name, rule = %stream.rule(), "Bus watch established");

        let services = services.clone();
        let name = watch.name;
        let handler = watch.handler;
        context.spawn(async move {
            while let Some(signal) = stream.next().await {
                metrics::record_signal(name);
                if catch_unwind(AssertUnwindSafe(|| handler(&signal, &services))).is_err() {
                    tracing::error!(watch = name, path = %signal.path, "Watch handler panicked");
                }
            }
            tracing::debug!(watch = name, "Bus watch ended");
        });
    }

    tracing::info!(
        established = report.established.len(),
        failed = report.failed.len(),
        "Bus watches established"
    );
    report
}
