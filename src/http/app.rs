//! Route table and router assembly.
//!
//! # Responsibilities
//! - Collect routes from every registered subsystem
//! - Remember who registered what (the auth allow-list is derived from it)
//! - Wrap the finished router in the shared middleware stack
//!
//! # Design Decisions
//! - Duplicate paths are a registration error, not a panic
//! - Authentication and CORS are applied once, to the whole router, when it is
//!   finalised; routes registered after authentication are still covered

use std::time::Duration;

use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::MethodRouter,
    Json, Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ListenerConfig, TimeoutConfig};
use crate::http::request;
use crate::observability::metrics;
use crate::security::{self, auth::AuthState};

/// How a route is treated by authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// A static asset; always reachable.
    Static,
    /// An API route reachable without credentials.
    Public,
    /// An API route that needs credentials.
    Protected,
    /// A websocket endpoint; needs credentials.
    WebSocket,
}

impl RouteKind {
    pub fn is_public(self) -> bool {
        matches!(self, RouteKind::Static | RouteKind::Public)
    }
}

/// A registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: String,
    pub kind: RouteKind,
    pub owner: &'static str,
}

/// Two subsystems asked for the same path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("route `{path}` requested by `{owner}` is already registered by `{existing}`")]
pub struct DuplicateRoute {
    pub path: String,
    pub owner: &'static str,
    pub existing: &'static str,
}

/// Router under construction.
pub struct App {
    router: Router,
    routes: Vec<RouteEntry>,
    auth: Option<AuthState>,
    cors: bool,
    xss_prevention: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            routes: Vec::new(),
            auth: None,
            cors: false,
            xss_prevention: true,
        }
    }

    /// Register `method_router` at `path` on behalf of `owner`.
    pub fn route(
        &mut self,
        owner: &'static str,
        path: &str,
        kind: RouteKind,
        method_router: MethodRouter,
    ) -> Result<(), DuplicateRoute> {
        if let Some(existing) = self.routes.iter().find(|r| r.path == path) {
            return Err(DuplicateRoute {
                path: path.to_string(),
                owner,
                existing: existing.owner,
            });
        }

        tracing::debug!(path, owner, ?kind, "Route registered");
        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, method_router);
        self.routes.push(RouteEntry {
            path: path.to_string(),
            kind,
            owner,
        });
        Ok(())
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r.path == path)
    }

    /// Paths that bypass authentication, as registered so far.
    pub fn public_paths(&self) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .filter(|r| r.kind.is_public())
            .map(|r| r.path.as_str())
    }

    /// Require credentials on every non-allow-listed request.
    pub fn require_auth(&mut self, state: AuthState) {
        self.auth = Some(state);
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth.is_some()
    }

    /// Answer cross-origin preflights and allow any origin.
    pub fn enable_cors(&mut self) {
        self.cors = true;
    }

    pub fn cors_enabled(&self) -> bool {
        self.cors
    }

    /// Toggle the Content-Security-Policy header.
    pub fn set_xss_prevention(&mut self, enabled: bool) {
        self.xss_prevention = enabled;
    }

    /// Finish the router with the shared middleware stack.
    #[allow(deprecated)]
    pub fn into_router(self, timeouts: &TimeoutConfig, listener: &ListenerConfig) -> Router {
        let mut router = self.router.fallback(not_found);

        if let Some(auth) = self.auth {
            router = router.layer(middleware::from_fn_with_state(auth, security::auth::require_auth));
        }

        router = router
            .layer(GlobalConcurrencyLimitLayer::new(listener.max_connections))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)));
        router = security::headers::apply(router, self.xss_prevention);
        router = router
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(request::propagate_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_layer());

        if self.cors {
            router = router.layer(CorsLayer::very_permissive());
        }
        router
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found", "path": uri.path() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut app = App::new();
        app.route("assets", "/index.html", RouteKind::Static, get(|| async { "x" }))
            .unwrap();
        let err = app
            .route("login", "/index.html", RouteKind::Public, get(|| async { "y" }))
            .unwrap_err();
        assert_eq!(err.existing, "assets");
        assert_eq!(app.routes().len(), 1);
    }

    #[test]
    fn public_paths_exclude_protected_routes() {
        let mut app = App::new();
        app.route("assets", "/app.js", RouteKind::Static, get(|| async { "" }))
            .unwrap();
        app.route("login", "/login", RouteKind::Public, get(|| async { "" }))
            .unwrap();
        app.route("kvm", "/kvm/0", RouteKind::WebSocket, get(|| async { "" }))
            .unwrap();
        app.route("mapper", "/bus/", RouteKind::Protected, get(|| async { "" }))
            .unwrap();

        let public: Vec<_> = app.public_paths().collect();
        assert_eq!(public, vec!["/app.js", "/login"]);
        assert!(app.has_route("/kvm/0"));
    }
}
