//! IBM management console endpoints and the resource lock manager.
//!
//! Locks are held per session. A `Write` lock on a resource is exclusive: it
//! conflicts with any lock on the same resource held by another session.
//! `Read` locks only conflict with foreign `Write` locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};
use crate::security::auth::X_AUTH_TOKEN;

const OWNER: &str = "ibm_management_console";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockType {
    Read,
    Write,
}

/// A lock held on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lock {
    pub transaction_id: u64,
    pub session_id: String,
    pub resource_id: String,
    pub lock_type: LockType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("resource `{resource_id}` is locked by transaction {transaction_id}")]
    Conflict {
        resource_id: String,
        transaction_id: u64,
    },
    #[error("transaction {0} not found")]
    UnknownTransaction(u64),
    #[error("transaction {0} belongs to another session")]
    NotOwner(u64),
}

/// Resource lock table keyed by transaction id.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: DashMap<u64, Lock>,
    next_transaction: AtomicU64,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn conflict(&self, session_id: &str, resource_id: &str, lock_type: LockType) -> Option<u64> {
        self.locks
            .iter()
            .find(|l| {
                l.resource_id == resource_id
                    && l.session_id != session_id
                    && (lock_type == LockType::Write || l.lock_type == LockType::Write)
            })
            .map(|l| l.transaction_id)
    }

    pub fn acquire(
        &self,
        session_id: &str,
        resource_id: &str,
        lock_type: LockType,
    ) -> Result<Lock, LockError> {
        if let Some(transaction_id) = self.conflict(session_id, resource_id, lock_type) {
            return Err(LockError::Conflict {
                resource_id: resource_id.to_string(),
                transaction_id,
            });
        }

        let lock = Lock {
            transaction_id: self.next_transaction.fetch_add(1, Ordering::Relaxed) + 1,
            session_id: session_id.to_string(),
            resource_id: resource_id.to_string(),
            lock_type,
        };
        self.locks.insert(lock.transaction_id, lock.clone());
        tracing::debug!(transaction = lock.transaction_id, resource = resource_id, "Lock acquired");
        Ok(lock)
    }

    pub fn release(&self, session_id: &str, transaction_id: u64) -> Result<Lock, LockError> {
        match self.locks.get(&transaction_id) {
            None => return Err(LockError::UnknownTransaction(transaction_id)),
            Some(lock) if lock.session_id != session_id => {
                return Err(LockError::NotOwner(transaction_id))
            }
            Some(_) => {}
        }
        self.locks
            .remove(&transaction_id)
            .map(|(_, lock)| lock)
            .ok_or(LockError::UnknownTransaction(transaction_id))
    }

    /// Locks held by `session_id`, ordered by transaction.
    pub fn list(&self, session_id: &str) -> Vec<Lock> {
        let mut locks: Vec<_> = self
            .locks
            .iter()
            .filter(|l| l.session_id == session_id)
            .map(|l| l.clone())
            .collect();
        locks.sort_by_key(|l| l.transaction_id);
        locks
    }

    /// Drop every lock held by `session_id`.
    pub fn release_session(&self, session_id: &str) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, l| l.session_id != session_id);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AcquireRequest {
    resource_id: String,
    lock_type: LockType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReleaseRequest {
    transaction_ids: Vec<u64>,
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let locks = Arc::new(LockManager::new());

    r.route(
        OWNER,
        "/ibm/v1",
        RouteKind::Protected,
        get(|| async {
            Json(json!({
                "@odata.id": "/ibm/v1",
                "Id": "IBM Rest RootService",
                "Name": "IBM Service Root",
                "LockService": { "@odata.id": "/ibm/v1/HMC/LockService" },
            }))
        }),
    )?;
    r.route(
        OWNER,
        "/ibm/v1/HMC/LockService/Actions/LockService.AcquireLock",
        RouteKind::Protected,
        post(acquire_lock).with_state(Arc::clone(&locks)),
    )?;
    r.route(
        OWNER,
        "/ibm/v1/HMC/LockService/Actions/LockService.ReleaseLock",
        RouteKind::Protected,
        post(release_lock).with_state(Arc::clone(&locks)),
    )?;
    r.route(
        OWNER,
        "/ibm/v1/HMC/LockService/Actions/LockService.GetLockList",
        RouteKind::Protected,
        post(list_locks).with_state(Arc::clone(&locks)),
    )?;

    r.services_mut().locks = Some(locks);
    Ok(())
}

// Requests authorized by the API key carry no session token.
fn session_of(headers: &HeaderMap) -> String {
    headers
        .get(X_AUTH_TOKEN)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("api-key")
        .to_string()
}

async fn acquire_lock(
    State(locks): State<Arc<LockManager>>,
    headers: HeaderMap,
    Json(request): Json<AcquireRequest>,
) -> impl IntoResponse {
    match locks.acquire(&session_of(&headers), &request.resource_id, request.lock_type) {
        Ok(lock) => (
            StatusCode::OK,
            Json(json!({ "TransactionID": lock.transaction_id })),
        ),
        Err(e) => (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))),
    }
}

async fn release_lock(
    State(locks): State<Arc<LockManager>>,
    headers: HeaderMap,
    Json(request): Json<ReleaseRequest>,
) -> impl IntoResponse {
    let session = session_of(&headers);
    for id in request.transaction_ids {
        if let Err(e) = locks.release(&session, id) {
            let status = match e {
                LockError::NotOwner(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, Json(json!({ "error": e.to_string() })));
        }
    }
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn list_locks(State(locks): State<Arc<LockManager>>, headers: HeaderMap) -> impl IntoResponse {
    Json(json!({ "Records": locks.list(&session_of(&headers)) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_lock_is_exclusive_across_sessions() {
        let locks = LockManager::new();
        let held = locks.acquire("s1", "/res/a", LockType::Write).unwrap();

        let err = locks.acquire("s2", "/res/a", LockType::Read).unwrap_err();
        assert_eq!(
            err,
            LockError::Conflict {
                resource_id: "/res/a".into(),
                transaction_id: held.transaction_id
            }
        );
        assert!(locks.acquire("s1", "/res/a", LockType::Read).is_ok());
        assert!(locks.acquire("s2", "/res/b", LockType::Write).is_ok());
    }

    #[test]
    fn read_locks_share() {
        let locks = LockManager::new();
        locks.acquire("s1", "/res", LockType::Read).unwrap();
        locks.acquire("s2", "/res", LockType::Read).unwrap();
        assert!(locks.acquire("s3", "/res", LockType::Write).is_err());
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn only_owner_releases() {
        let locks = LockManager::new();
        let lock = locks.acquire("s1", "/res", LockType::Write).unwrap();

        assert_eq!(
            locks.release("s2", lock.transaction_id),
            Err(LockError::NotOwner(lock.transaction_id))
        );
        assert_eq!(locks.release("s1", lock.transaction_id).unwrap(), lock);
        assert_eq!(
            locks.release("s1", lock.transaction_id),
            Err(LockError::UnknownTransaction(lock.transaction_id))
        );
    }

    #[test]
    fn session_release_drops_all_its_locks() {
        let locks = LockManager::new();
        locks.acquire("s1", "/a", LockType::Read).unwrap();
        locks.acquire("s1", "/b", LockType::Write).unwrap();
        locks.acquire("s2", "/c", LockType::Write).unwrap();

        assert_eq!(locks.list("s1").len(), 2);
        assert_eq!(locks.release_session("s1"), 2);
        assert!(locks.list("s1").is_empty());
        assert_eq!(locks.len(), 1);
    }
}
