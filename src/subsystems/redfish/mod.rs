//! Redfish protocol service.
//!
//! Registers the service root. The event service manager and the aggregator
//! hang off this service and are registered by their own steps afterwards.

pub mod aggregator;
pub mod event_service;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "redfish";

/// The Redfish service itself.
#[derive(Debug)]
pub struct RedfishService {
    uuid: Uuid,
    aggregation: bool,
}

impl RedfishService {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn service_root(&self) -> Value {
        let mut root = json!({
            "@odata.id": "/redfish/v1",
            "@odata.type": "#ServiceRoot.v1_11_0.ServiceRoot",
            "Id": "RootService",
            "Name": "Root Service",
            "RedfishVersion": "1.9.0",
            "UUID": self.uuid.to_string(),
            "EventService": { "@odata.id": "/redfish/v1/EventService" },
        });
        if self.aggregation {
            root["AggregationService"] = json!({ "@odata.id": "/redfish/v1/AggregationService" });
        }
        root
    }
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let features = r.config().features;
    let service = Arc::new(RedfishService {
        uuid: Uuid::new_v4(),
        aggregation: features.redfish_aggregation,
    });

    r.route(
        OWNER,
        "/redfish",
        RouteKind::Public,
        get(|| async { Json(json!({ "v1": "/redfish/v1/" })) }),
    )?;
    r.route(
        OWNER,
        "/redfish/v1",
        RouteKind::Public,
        get(service_root).with_state(Arc::clone(&service)),
    )?;

    tracing::info!(uuid = %service.uuid, "Redfish service created");
    r.services_mut().redfish = Some(service);
    Ok(())
}

async fn service_root(State(service): State<Arc<RedfishService>>) -> Json<Value> {
    Json(service.service_root())
}
