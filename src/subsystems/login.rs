//! Authentication: session login/logout and the request guard.
//!
//! The allow-list is a snapshot of the static and public routes registered by
//! the steps before this one. Routes registered afterwards are protected.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};
use crate::security::auth::{api_key_matches, X_AUTH_TOKEN};
use crate::security::{AllowList, AuthState, SessionStore};
use crate::subsystems::ibm::LockManager;

const OWNER: &str = "authentication";

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
struct LoginState {
    api_key: Arc<str>,
    sessions: Arc<SessionStore>,
    locks: Option<Arc<LockManager>>,
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let sessions = Arc::new(SessionStore::new());
    let api_key: Arc<str> = Arc::from(r.config().auth.api_key.as_str());
    let state = LoginState {
        api_key: Arc::clone(&api_key),
        sessions: Arc::clone(&sessions),
        locks: r.services().locks.clone(),
    };

    r.route(
        OWNER,
        "/login",
        RouteKind::Public,
        post(login).with_state(state.clone()),
    )?;
    r.route(
        OWNER,
        "/logout",
        RouteKind::Protected,
        post(logout).with_state(state),
    )?;

    let allow = AllowList::from_paths(r.app().public_paths());
    tracing::info!(allowed = allow.len(), "Authentication enabled");
    r.app_mut().require_auth(AuthState {
        allow: Arc::new(allow),
        api_key,
        sessions: Arc::clone(&sessions),
    });

    r.services_mut().sessions = Some(sessions);
    Ok(())
}

async fn login(State(state): State<LoginState>, Json(credentials): Json<Credentials>) -> impl IntoResponse {
    let valid = !credentials.username.is_empty()
        && api_key_matches(&state.api_key, &credentials.password);
    if !valid {
        tracing::info!(user = %credentials.username, "Login rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid credentials" })),
        );
    }

    let token = state.sessions.create(&credentials.username);
    tracing::info!(user = %credentials.username, "Session created");
    (StatusCode::OK, Json(json!({ "token": token })))
}

async fn logout(State(state): State<LoginState>, headers: HeaderMap) -> StatusCode {
    let Some(token) = headers.get(X_AUTH_TOKEN).and_then(|h| h.to_str().ok()) else {
        return StatusCode::BAD_REQUEST;
    };
    if !state.sessions.remove(token) {
        return StatusCode::BAD_REQUEST;
    }
    if let Some(locks) = &state.locks {
        let released = locks.release_session(token);
        if released > 0 {
            tracing::debug!(locks = released, "Released locks of closed session");
        }
    }
    StatusCode::NO_CONTENT
}
