//! D-Bus REST surface: object mapper listing and image upload.
//!
//! Image upload is handled by the software manager service; the endpoint here
//! reports that nothing is attached.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use serde_json::json;

use crate::http::RouteKind;
use crate::lifecycle::context::RuntimeContext;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "dbus_rest";

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    r.route(
        OWNER,
        "/upload/image",
        RouteKind::Protected,
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": "image manager not attached" })),
            )
        }),
    )?;

    r.route(
        OWNER,
        "/bus/",
        RouteKind::Protected,
        get(|| async { Json(json!({ "status": "ok", "busses": [{ "name": "system" }] })) }),
    )?;

    let context = Arc::clone(r.context());
    r.route(
        OWNER,
        "/bus/system/",
        RouteKind::Protected,
        get(system_bus).with_state(context),
    )?;
    Ok(())
}

async fn system_bus(State(context): State<Arc<RuntimeContext>>) -> impl IntoResponse {
    match context.bus() {
        Ok(bus) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "data": { "unique_name": bus.unique_name() } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": e.to_string() })),
        ),
    }
}
