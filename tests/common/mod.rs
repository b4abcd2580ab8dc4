//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::path::Path;
use std::time::Duration;

use mgmtd::config::{DaemonConfig, FeatureFlags};
use mgmtd::net::ActivationEnv;
use mgmtd::{Daemon, Shutdown};

pub const API_KEY: &str = "integration-secret";

/// Activation environment with a fixed descriptor count.
pub struct FakeActivation {
    pub fds: usize,
    pub first: RawFd,
}

impl FakeActivation {
    pub fn none() -> Self {
        Self { fds: 0, first: 3 }
    }

    pub fn inherited(fd: RawFd) -> Self {
        Self { fds: 1, first: fd }
    }
}

impl ActivationEnv for FakeActivation {
    fn listen_fds(&self) -> usize {
        self.fds
    }

    fn first_descriptor(&self) -> RawFd {
        self.first
    }
}

/// Loopback config on an ephemeral port with the given features.
pub fn test_config(features: FeatureFlags) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.features = features;
    config.listener.bind_host = "127.0.0.1".into();
    config.listener.default_port = 0;
    config.auth.api_key = API_KEY.into();
    config
}

/// Asset directory with an index page and a script.
pub fn asset_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", "<html>mgmtd</html>");
    write(dir.path(), "js/app.js", "console.log('ok');");
    dir
}

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Run `daemon` while `client` talks to it, then shut down.
///
/// Returns the daemon's exit code.
pub async fn with_running<F, Fut>(daemon: &Daemon, client: F) -> i32
where
    F: FnOnce(SocketAddr) -> Fut,
    Fut: Future<Output = ()>,
{
    let shutdown = Shutdown::new();
    let mut bound = daemon.bound();

    let driver = async {
        let addr: Option<SocketAddr> =
            *tokio::time::timeout(Duration::from_secs(5), bound.wait_for(Option::is_some))
                .await
                .expect("daemon never bound")
                .expect("bound channel closed");
        let addr = addr.expect("bound address");
        client(addr).await;
        shutdown.trigger();
    };

    let (code, ()) = tokio::join!(daemon.run_until(shutdown.wait()), driver);
    code
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
