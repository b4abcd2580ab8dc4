//! WebSocket endpoints whose backend lives outside this process.
//!
//! The console, KVM and virtual media proxies are separate services. Until a
//! backend is attached the endpoint completes the upgrade and closes with
//! status 1011 so clients get a clean, explained close instead of a reset.

use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::{get, MethodRouter},
};

/// Route that upgrades and immediately closes, naming the missing backend.
pub fn unattached(name: &'static str) -> MethodRouter {
    get(move |ws: WebSocketUpgrade| async move { upgrade_and_close(ws, name) })
}

fn upgrade_and_close(ws: WebSocketUpgrade, name: &'static str) -> Response {
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        tracing::info!(endpoint = name, "Websocket opened without attached backend");
        let frame = CloseFrame {
            code: close_code::ERROR,
            reason: format!("{} backend not attached", name).into(),
        };
        let _ = socket.send(Message::Close(Some(frame))).await;
    })
}
