//! Websocket streaming bus signals to clients.
//!
//! The client opens `/subscribe` and sends one filter message:
//!
//! ```json
//! { "paths": ["/xyz/openbmc_project/sensors"], "interfaces": ["xyz.openbmc_project.Sensor.Value"] }
//! ```
//!
//! Every matching signal is then pushed as a JSON text frame until either
//! side closes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::bus::{MatchRule, Signal};
use crate::http::RouteKind;
use crate::lifecycle::context::RuntimeContext;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "signal_socket";

/// Upper bound on the number of paths a single client may watch.
pub const MAX_PATHS: usize = 64;

/// The filter a client sends after connecting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalFilter {
    pub paths: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl SignalFilter {
    pub fn accepts(&self, signal: &Signal) -> bool {
        let path_ok = self.paths.iter().any(|p| {
            MatchRule::any()
                .path_namespace(p.as_str())
                .matches(signal)
        });
        let interface_ok =
            self.interfaces.is_empty() || self.interfaces.iter().any(|i| *i == signal.interface);
        path_ok && interface_ok
    }
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let context = Arc::clone(r.context());
    r.route(
        OWNER,
        "/subscribe",
        RouteKind::WebSocket,
        get(upgrade).with_state(context),
    )
}

async fn upgrade(ws: WebSocketUpgrade, State(context): State<Arc<RuntimeContext>>) -> Response {
    ws.on_upgrade(move |socket| session(socket, context))
}

async fn close(mut socket: WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn session(mut socket: WebSocket, context: Arc<RuntimeContext>) {
    let filter = match socket.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<SignalFilter>(&text) {
            Ok(filter) if !filter.paths.is_empty() && filter.paths.len() <= MAX_PATHS => filter,
            Ok(_) => return close(socket, close_code::POLICY, "invalid path count").await,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed subscribe request");
                return close(socket, close_code::INVALID, "malformed filter").await;
            }
        },
        _ => return,
    };

    let mut stream = match context.bus().and_then(|bus| bus.add_match(MatchRule::any())) {
        Ok(stream) => stream,
        Err(e) => return close(socket, close_code::ERROR, &e.to_string()).await,
    };
    tracing::debug!(paths = filter.paths.len(), "Signal websocket subscribed");

    loop {
        tokio::select! {
            signal = stream.next() => match signal {
                Some(signal) if filter.accepts(&signal) => {
                    let frame = json!({
                        "event": signal.member,
                        "path": signal.path,
                        "interface": signal.interface,
                        "properties": signal.body,
                    });
                    if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Signal websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_needs_path_and_interface() {
        let filter = SignalFilter {
            paths: vec!["/xyz/openbmc_project/sensors".into()],
            interfaces: vec!["xyz.openbmc_project.Sensor.Value".into()],
        };

        let hit = Signal::new(
            "/xyz/openbmc_project/sensors/temperature/cpu0",
            "xyz.openbmc_project.Sensor.Value",
            "PropertiesChanged",
        );
        assert!(filter.accepts(&hit));

        let other_iface = Signal::new(hit.path.clone(), "a.b", "PropertiesChanged");
        assert!(!filter.accepts(&other_iface));

        let other_path = Signal::new("/xyz/openbmc_project/state", hit.interface.clone(), "X");
        assert!(!filter.accepts(&other_path));
    }

    #[test]
    fn empty_interfaces_accept_any() {
        let filter: SignalFilter = serde_json::from_str(r#"{"paths":["/"]}"#).unwrap();
        assert!(filter.accepts(&Signal::new("/anything", "a.b", "C")));
    }
}
