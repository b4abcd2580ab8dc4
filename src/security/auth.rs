//! Authentication middleware and session store.
//!
//! # Responsibilities
//! - Let allow-listed paths through untouched
//! - Accept `Authorization: Bearer <api key>` or a session `X-Auth-Token`
//! - Track login sessions and drop them when a user disappears
//!
//! # Design Decisions
//! - The allow-list is a snapshot of the routes registered before
//!   authentication, taken once at startup
//! - Fail closed: anything not allow-listed needs credentials

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Header carrying a session token.
pub const X_AUTH_TOKEN: &str = "x-auth-token";

/// Paths reachable without credentials.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    paths: HashSet<String>,
}

impl AllowList {
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            paths: paths.into_iter().map(str::to_string).collect(),
        }
    }

    /// Exact match; a trailing slash on the request is ignored.
    pub fn contains(&self, path: &str) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => self.paths.contains(trimmed),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A logged-in session.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub created: SystemTime,
}

/// Live sessions keyed by token.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its token.
    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created: SystemTime::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Close every session of `username`; returns the closed tokens.
    pub fn remove_user(&self, username: &str) -> Vec<String> {
        let mut closed = Vec::new();
        self.sessions.retain(|token, s| {
            if s.username == username {
                closed.push(token.clone());
                false
            } else {
                true
            }
        });
        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Compare a presented key against the configured one in constant time.
pub fn api_key_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

/// State for [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthState {
    pub allow: Arc<AllowList>,
    pub api_key: Arc<str>,
    pub sessions: Arc<SessionStore>,
}

impl AuthState {
    fn authorized(&self, request: &Request<Body>) -> bool {
        let headers = request.headers();

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if bearer.is_some_and(|given| api_key_matches(&self.api_key, given)) {
            return true;
        }

        headers
            .get(X_AUTH_TOKEN)
            .and_then(|h| h.to_str().ok())
            .map(|token| self.sessions.get(token).is_some())
            .unwrap_or(false)
    }
}

pub async fn require_auth(
    State(state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.allow.contains(request.uri().path()) || state.authorized(&request) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Unauthenticated request rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "authentication required" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_ignores_trailing_slash() {
        let allow = AllowList::from_paths(["/redfish/v1", "/"]);
        assert!(allow.contains("/redfish/v1"));
        assert!(allow.contains("/redfish/v1/"));
        assert!(allow.contains("/"));
        assert!(!allow.contains("/redfish/v1/Systems"));
        assert_eq!(allow.len(), 2);
    }

    #[test]
    fn api_key_comparison() {
        assert!(api_key_matches("s3cret", "s3cret"));
        assert!(!api_key_matches("s3cret", "s3cres"));
        assert!(!api_key_matches("s3cret", "s3cret-and-more"));
        assert!(!api_key_matches("s3cret", ""));
    }

    #[test]
    fn sessions_for_removed_user_are_dropped() {
        let store = SessionStore::new();
        let a = store.create("alice");
        let a2 = store.create("alice");
        let b = store.create("bob");

        let mut closed = store.remove_user("alice");
        closed.sort();
        let mut expected = vec![a.clone(), a2];
        expected.sort();
        assert_eq!(closed, expected);
        assert!(store.get(&a).is_none());
        assert_eq!(store.get(&b).unwrap().username, "bob");
        assert!(store.remove(&b));
        assert!(store.is_empty());
    }

    #[test]
    fn bearer_and_session_tokens_authorize() {
        let sessions = Arc::new(SessionStore::new());
        let token = sessions.create("root");
        let state = AuthState {
            allow: Arc::new(AllowList::default()),
            api_key: Arc::from("k3y"),
            sessions,
        };

        let bearer = Request::builder()
            .header("Authorization", "Bearer k3y")
            .body(Body::empty())
            .unwrap();
        assert!(state.authorized(&bearer));

        let session = Request::builder()
            .header(X_AUTH_TOKEN, token)
            .body(Body::empty())
            .unwrap();
        assert!(state.authorized(&session));

        let wrong = Request::builder()
            .header("Authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert!(!state.authorized(&wrong));
    }
}
