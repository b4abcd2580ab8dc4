//! Bus connection handle shared by all subsystems.
//!
//! [`BusConnection`] is the seam to the inter-process bus client. The daemon
//! only needs two things from it: emit a signal and subscribe to signals that
//! match a rule. [`LocalBus`] is an in-process implementation over
//! [`tokio::sync::broadcast`].
//!
//! ## Rules
//! - **Non-blocking emit**: `emit()` never waits for subscribers.
//! - **Lag handling**: slow streams skip the oldest signals and log how many.
//! - **No persistence**: signals emitted with no matching subscriber are lost.

use tokio::sync::broadcast;

use crate::bus::signal::{MatchRule, Signal};

/// Default number of signals buffered for each stream.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Bus level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The connection was released or dropped.
    #[error("bus connection is not available")]
    Unavailable,
    /// The rule is malformed.
    #[error("invalid match rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
    /// The bus refused the rule.
    #[error("bus rejected match rule `{0}`")]
    Rejected(String),
    /// Connecting to the bus failed.
    #[error("failed to connect to bus: {0}")]
    Connect(String),
}

/// A connection to the inter-process bus.
pub trait BusConnection: Send + Sync + 'static {
    /// Unique name of this connection on the bus.
    fn unique_name(&self) -> &str;

    /// Install a match rule and return the stream of matching signals.
    fn add_match(&self, rule: MatchRule) -> Result<SignalStream, BusError>;

    /// Broadcast a signal to every matching stream.
    fn emit(&self, signal: Signal) -> Result<(), BusError>;
}

/// Signals delivered for one match rule.
#[derive(Debug)]
pub struct SignalStream {
    rule: MatchRule,
    rx: broadcast::Receiver<Signal>,
}

impl SignalStream {
    pub fn new(rule: MatchRule, rx: broadcast::Receiver<Signal>) -> Self {
        Self { rule, rx }
    }

    pub fn rule(&self) -> &MatchRule {
        &self.rule
    }

    /// Wait for the next matching signal; `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Signal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) if self.rule.matches(&signal) => return Some(signal),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(rule = %self.rule, skipped, "Signal stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process bus.
///
/// Cheap to clone; clones share the same channel.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<Signal>,
    unique_name: String,
}

impl LocalBus {
    /// Creates a new bus with the given channel capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            unique_name: format!(":1.{}", std::process::id()),
        }
    }

    /// Number of live signal streams.
    pub fn stream_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BusConnection for LocalBus {
    fn unique_name(&self) -> &str {
        &self.unique_name
    }

    fn add_match(&self, rule: MatchRule) -> Result<SignalStream, BusError> {
        rule.validate()?;
        tracing::debug!(rule = %rule, "Match rule added");
        Ok(SignalStream::new(rule, self.tx.subscribe()))
    }

    fn emit(&self, signal: Signal) -> Result<(), BusError> {
        // No receivers is not an error: the signal simply has no audience.
        let _ = self.tx.send(signal);
        Ok(())
    }
}
