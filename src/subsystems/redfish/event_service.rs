//! Redfish event service manager.
//!
//! Built once by its registration step, after the Redfish service exists.
//! Keeps the subscriber registry and a bounded history of event records fed
//! by the event log monitor.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "event_service";

/// Records kept in memory for inspection.
pub const HISTORY: usize = 256;

/// One event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: u64,
    pub timestamp: String,
    pub message_id: String,
    pub args: Vec<String>,
}

/// A registered event destination.
#[derive(Debug, Clone, Serialize)]
pub struct EventSubscription {
    pub id: String,
    pub destination: String,
    pub context: String,
}

/// Body of a subscription request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionRequest {
    pub destination: String,
    #[serde(default)]
    pub context: String,
}

/// Subscriber registry and event history.
#[derive(Debug, Default)]
pub struct EventServiceManager {
    subscriptions: DashMap<String, EventSubscription>,
    history: Mutex<VecDeque<EventRecord>>,
    next_id: AtomicU64,
}

impl EventServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination; only http(s) URLs are accepted.
    pub fn subscribe(&self, request: SubscriptionRequest) -> Result<EventSubscription, String> {
        let url = Url::parse(&request.destination).map_err(|e| e.to_string())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme `{}`", url.scheme()));
        }

        let subscription = EventSubscription {
            id: Uuid::new_v4().simple().to_string(),
            destination: request.destination,
            context: request.context,
        };
        self.subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        tracing::info!(id = %subscription.id, destination = %subscription.destination, "Event subscription added");
        Ok(subscription)
    }

    pub fn unsubscribe(&self, id: &str) -> bool {
        self.subscriptions.remove(id).is_some()
    }

    pub fn subscriptions(&self) -> Vec<EventSubscription> {
        let mut subs: Vec<_> = self.subscriptions.iter().map(|s| s.clone()).collect();
        subs.sort_by(|a, b| a.id.cmp(&b.id));
        subs
    }

    /// Record a new event log entry.
    pub fn publish(&self, timestamp: String, message_id: String, args: Vec<String>) -> EventRecord {
        let record = EventRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp,
            message_id,
            args,
        };
        tracing::debug!(
            id = record.id,
            message_id = %record.message_id,
            subscribers = self.subscriptions.len(),
            "Event recorded"
        );

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == HISTORY {
            history.pop_front();
        }
        history.push_back(record.clone());
        record
    }

    /// Recorded events, oldest first.
    pub fn recent(&self) -> Vec<EventRecord> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    if r.services().redfish.is_none() {
        return Err(StartupError::MissingDependency {
            step: OWNER,
            requires: "redfish",
        });
    }

    let manager = Arc::new(EventServiceManager::new());

    r.route(
        OWNER,
        "/redfish/v1/EventService",
        RouteKind::Protected,
        get(|| async {
            Json(json!({
                "@odata.id": "/redfish/v1/EventService",
                "@odata.type": "#EventService.v1_5_0.EventService",
                "Id": "EventService",
                "Name": "Event Service",
                "ServiceEnabled": true,
                "Subscriptions": { "@odata.id": "/redfish/v1/EventService/Subscriptions" },
            }))
        }),
    )?;
    r.route(
        OWNER,
        "/redfish/v1/EventService/Subscriptions",
        RouteKind::Protected,
        get(list_subscriptions)
            .post(create_subscription)
            .with_state(Arc::clone(&manager)),
    )?;
    r.route(
        OWNER,
        "/redfish/v1/EventService/Subscriptions/{id}",
        RouteKind::Protected,
        delete(delete_subscription).with_state(Arc::clone(&manager)),
    )?;

    r.services_mut().event_service = Some(manager);
    Ok(())
}

async fn list_subscriptions(State(manager): State<Arc<EventServiceManager>>) -> impl IntoResponse {
    let members: Vec<_> = manager
        .subscriptions()
        .into_iter()
        .map(|s| json!({ "@odata.id": format!("/redfish/v1/EventService/Subscriptions/{}", s.id) }))
        .collect();
    Json(json!({
        "@odata.id": "/redfish/v1/EventService/Subscriptions",
        "Members@odata.count": members.len(),
        "Members": members,
    }))
}

async fn create_subscription(
    State(manager): State<Arc<EventServiceManager>>,
    Json(request): Json<SubscriptionRequest>,
) -> impl IntoResponse {
    match manager.subscribe(request) {
        Ok(sub) => (StatusCode::CREATED, Json(sub)).into_response(),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response(),
    }
}

async fn delete_subscription(
    State(manager): State<Arc<EventServiceManager>>,
    Path(id): Path<String>,
) -> StatusCode {
    if manager.unsubscribe(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_validates_destination() {
        let manager = EventServiceManager::new();
        let ok = manager
            .subscribe(SubscriptionRequest {
                destination: "https://10.0.0.9/events".into(),
                context: "rack1".into(),
            })
            .unwrap();
        assert!(manager
            .subscribe(SubscriptionRequest {
                destination: "mailto:ops@example.com".into(),
                context: String::new(),
            })
            .is_err());

        assert_eq!(manager.subscriptions().len(), 1);
        assert!(manager.unsubscribe(&ok.id));
        assert!(!manager.unsubscribe(&ok.id));
    }

    #[test]
    fn history_is_bounded() {
        let manager = EventServiceManager::new();
        for i in 0..(HISTORY + 10) {
            manager.publish("t".into(), format!("Msg{}", i), vec![]);
        }
        let recent = manager.recent();
        assert_eq!(recent.len(), HISTORY);
        assert_eq!(recent[0].message_id, "Msg10");
        assert_eq!(recent.last().unwrap().id, (HISTORY + 10) as u64);
    }
}
