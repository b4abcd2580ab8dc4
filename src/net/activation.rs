//! Socket activation and listen target resolution.
//!
//! # Responsibilities
//! - Ask the environment how many descriptors the service manager passed in
//! - Check that a single inherited descriptor is an internet stream socket
//! - Fall back to the fixed default port otherwise
//!
//! # Design Decisions
//! - Resolution never fails: a missing or unusable socket is an expected,
//!   logged branch that ends in `ListenTarget::Port`
//! - Inspection borrows the descriptor; nothing is bound or closed here

use std::os::fd::{BorrowedFd, RawFd};

use socket2::{Domain, SockRef, Type};

/// First descriptor handed over by the service manager.
pub const LISTEN_FDS_START: RawFd = 3;

/// Where the HTTP listener comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenTarget {
    /// A socket that was already opened (and bound) by the service manager.
    InheritedDescriptor(RawFd),
    /// A port the daemon binds itself.
    Port(u16),
}

impl std::fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenTarget::InheritedDescriptor(fd) => write!(f, "fd:{}", fd),
            ListenTarget::Port(port) => write!(f, "port:{}", port),
        }
    }
}

/// The activation protocol as seen by the daemon.
pub trait ActivationEnv: Send + Sync {
    /// Number of descriptors passed in by the service manager.
    fn listen_fds(&self) -> usize;

    /// Descriptor number of the first passed socket.
    fn first_descriptor(&self) -> RawFd {
        LISTEN_FDS_START
    }

    /// Whether `fd` is a stream socket of an internet address family.
    fn is_stream_socket(&self, fd: RawFd) -> bool {
        is_inet_stream_socket(fd)
    }
}

/// systemd style activation driven by `LISTEN_PID` / `LISTEN_FDS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdActivation;

impl ActivationEnv for SystemdActivation {
    fn listen_fds(&self) -> usize {
        listen_fds_from(
            std::env::var("LISTEN_PID").ok().as_deref(),
            std::env::var("LISTEN_FDS").ok().as_deref(),
            std::process::id(),
        )
    }
}

/// Interpret the activation variables for the process `pid`.
///
/// Descriptors addressed to another process (a stale `LISTEN_PID`) count as none.
pub fn listen_fds_from(listen_pid: Option<&str>, listen_fds: Option<&str>, pid: u32) -> usize {
    if let Some(target) = listen_pid {
        match target.trim().parse::<u32>() {
            Ok(target) if target == pid => {}
            _ => return 0,
        }
    }

    listen_fds
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

/// Check `fd` is an IPv4 or IPv6 stream socket.
///
/// On Linux the socket must also already be listening.
pub fn is_inet_stream_socket(fd: RawFd) -> bool {
    if fd < 0 {
        return false;
    }

    // SAFETY: the descriptor is only borrowed for the duration of this call and
    // is never closed through this handle. An fd that is not open makes the
    // socket calls below fail with EBADF.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let socket = SockRef::from(&borrowed);

    match socket.r#type() {
        Ok(ty) if ty == Type::STREAM => {}
        _ => return false,
    }

    let inet = match socket.local_addr() {
        Ok(addr) => addr.domain() == Domain::IPV4 || addr.domain() == Domain::IPV6,
        Err(_) => false,
    };
    if !inet {
        return false;
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        socket.is_listener().unwrap_or(false)
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        true
    }
}

/// Decide which listening socket the service uses.
pub fn resolve_listen_target(env: &dyn ActivationEnv, default_port: u16) -> ListenTarget {
    let count = env.listen_fds();
    if count != 1 {
        tracing::info!(
            listen_fds = count,
            port = default_port,
            "Starting webserver on port"
        );
        return ListenTarget::Port(default_port);
    }

    tracing::info!("Attempting socket activation");
    let fd = env.first_descriptor();
    if env.is_stream_socket(fd) {
        tracing::info!(fd, "Starting webserver on socket handle");
        ListenTarget::InheritedDescriptor(fd)
    } else {
        tracing::info!(
            fd,
            port = default_port,
            "Bad incoming socket, starting webserver on port"
        );
        ListenTarget::Port(default_port)
    }
}
