use axum::{routing::get, Json};
use serde_json::json;

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "google_api";

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    r.route(
        OWNER,
        "/google/v1",
        RouteKind::Protected,
        get(|| async {
            Json(json!({
                "@odata.id": "/google/v1",
                "@odata.type": "#GoogleServiceRoot.v1_0_0.GoogleServiceRoot",
                "Id": "Google Rest RootService",
                "Name": "Google Service Root",
                "Version": "1.0.0",
                "RootOfTrustCollection": { "@odata.id": "/google/v1/RootOfTrustCollection" },
            }))
        }),
    )
}
