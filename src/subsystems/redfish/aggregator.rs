//! Redfish aggregation manager.
//!
//! Holds the satellite controllers whose resources are merged into this
//! service. Forwarding is done by the aggregation proxy; this manager only
//! owns the satellite table.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json};
use serde_json::{json, Value};
use url::Url;

use crate::config::SatelliteConfig;
use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "aggregator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Satellite {
    pub prefix: String,
    pub url: Url,
}

#[derive(Debug, Default)]
pub struct RedfishAggregator {
    satellites: Vec<Satellite>,
}

impl RedfishAggregator {
    /// Build from configuration; entries with unparsable URLs are skipped.
    pub fn from_config(satellites: &[SatelliteConfig]) -> Self {
        let satellites = satellites
            .iter()
            .filter_map(|s| match Url::parse(&s.url) {
                Ok(url) => Some(Satellite {
                    prefix: s.prefix.clone(),
                    url,
                }),
                Err(e) => {
                    tracing::warn!(prefix = %s.prefix, error = %e, "Ignoring satellite");
                    None
                }
            })
            .collect();
        Self { satellites }
    }

    pub fn satellites(&self) -> &[Satellite] {
        &self.satellites
    }

    /// Satellite owning `resource_id`, judged by its prefix.
    pub fn owner_of(&self, resource_id: &str) -> Option<&Satellite> {
        self.satellites
            .iter()
            .find(|s| resource_id.starts_with(&format!("{}_", s.prefix)))
    }
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    if r.services().redfish.is_none() {
        return Err(StartupError::MissingDependency {
            step: OWNER,
            requires: "redfish",
        });
    }

    let aggregator = Arc::new(RedfishAggregator::from_config(
        &r.config().aggregation.satellites,
    ));
    tracing::info!(satellites = aggregator.satellites().len(), "Aggregator created");

    r.route(
        OWNER,
        "/redfish/v1/AggregationService",
        RouteKind::Protected,
        get(aggregation_service).with_state(Arc::clone(&aggregator)),
    )?;

    r.services_mut().aggregator = Some(aggregator);
    Ok(())
}

async fn aggregation_service(State(aggregator): State<Arc<RedfishAggregator>>) -> Json<Value> {
    let sources: Vec<_> = aggregator
        .satellites()
        .iter()
        .map(|s| json!({ "Id": s.prefix, "HostName": s.url.as_str() }))
        .collect();
    Json(json!({
        "@odata.id": "/redfish/v1/AggregationService",
        "@odata.type": "#AggregationService.v1_0_1.AggregationService",
        "Id": "AggregationService",
        "Name": "Aggregation Service",
        "ServiceEnabled": true,
        "AggregationSources": sources,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_owner_by_prefix() {
        let aggregator = RedfishAggregator::from_config(&[
            SatelliteConfig {
                prefix: "5B247A".into(),
                url: "https://10.0.0.2".into(),
            },
            SatelliteConfig {
                prefix: "broken".into(),
                url: "::not a url".into(),
            },
        ]);

        assert_eq!(aggregator.satellites().len(), 1);
        assert_eq!(aggregator.owner_of("5B247A_chassis").unwrap().prefix, "5B247A");
        assert!(aggregator.owner_of("chassis").is_none());
    }
}
