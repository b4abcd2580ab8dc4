//! TCP listener construction from a resolved `ListenTarget`.
//!
//! # Responsibilities
//! - Adopt an inherited, already-bound socket
//! - Or bind the configured host and fallback port
//! - Hand a Tokio listener to the HTTP server

use std::net::SocketAddr;
use std::os::fd::FromRawFd;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;
use crate::net::activation::ListenTarget;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {target}: {source}")]
    Bind {
        target: ListenTarget,
        #[source]
        source: std::io::Error,
    },
    /// Failed to adopt the inherited descriptor.
    #[error("Failed to adopt inherited socket {fd}: {source}")]
    Adopt {
        fd: i32,
        #[source]
        source: std::io::Error,
    },
}

/// A bound listener together with the target it came from.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Where the socket came from.
    target: ListenTarget,
}

impl Listener {
    /// Bind (or adopt) the socket described by `target`.
    ///
    /// Must be called from within the Tokio runtime.
    pub async fn bind(target: ListenTarget, config: &ListenerConfig) -> Result<Self, ListenerError> {
        let inner = match target {
            ListenTarget::InheritedDescriptor(fd) => {
                // SAFETY: the descriptor was handed to this process by the service
                // manager and validated as a listening stream socket. Ownership
                // moves into the listener, which is the only user from here on.
                let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
                std_listener
                    .set_nonblocking(true)
                    .map_err(|source| ListenerError::Adopt { fd, source })?;
                TcpListener::from_std(std_listener)
                    .map_err(|source| ListenerError::Adopt { fd, source })?
            }
            ListenTarget::Port(port) => TcpListener::bind((config.bind_host.as_str(), port))
                .await
                .map_err(|source| ListenerError::Bind { target, source })?,
        };

        if let Ok(local_addr) = inner.local_addr() {
            tracing::info!(
                address = %local_addr,
                target = %target,
                "Listener bound"
            );
        }

        Ok(Self { inner, target })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Where this socket came from.
    pub fn target(&self) -> ListenTarget {
        self.target
    }

    /// Give up the wrapper and return the Tokio listener.
    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}
