//! HTTP server loop.
//!
//! # Responsibilities
//! - Serve the finished router on the bound listener
//! - Stop accepting and drain when the shutdown future resolves

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;

use crate::net::Listener;

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: Listener, router: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener.into_inner(), app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
