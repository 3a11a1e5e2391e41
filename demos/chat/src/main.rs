//! Chat-room demo: a WebSocket endpoint broadcasting to per-room clients,
//! plus a small HTTP status page, on one Hearth instance.
//!
//! Connect with any WebSocket client:
//!
//! ```text
//! ws://localhost:5001/chat/lobby
//! ```
//!
//! Every text frame is relayed to the other clients of the same room.

use std::sync::Arc;

use async_trait::async_trait;

use hearth::{
    EndpointCall, FramePayload, Handler, HandlerError, HearthBuilder, HttpExchange,
    RequestHandler, RouteSpec, SocketExchange, SocketHandler, telemetry,
};
use hearth_core::broadcast::SocketRooms;

struct ChatHandler {
    rooms: SocketRooms,
}

impl Handler for ChatHandler {
    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::socket_text("/chat/{room}", "relay")]
    }

    fn as_socket_handler(self: Arc<Self>) -> Option<Arc<dyn SocketHandler>> {
        Some(self)
    }
}

#[async_trait]
impl SocketHandler for ChatHandler {
    async fn handle_socket(
        &self,
        exchange: &SocketExchange,
        payload: &FramePayload,
        call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        let FramePayload::Text(text) = payload else {
            return Ok(());
        };
        let room_name = call.params.get("room").unwrap_or("lobby");
        let room = self.rooms.room(room_name);
        room.join(exchange);
        let reached = room.send_json(
            &serde_json::json!({"room": room_name, "message": text}),
            Some(exchange.id()),
        )?;
        tracing::debug!(room = room_name, reached, "frame relayed");
        Ok(())
    }
}

struct StatusHandler {
    rooms: SocketRooms,
}

impl Handler for StatusHandler {
    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::http("/status", "status")]
    }

    fn as_request_handler(self: Arc<Self>) -> Option<Arc<dyn RequestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RequestHandler for StatusHandler {
    async fn handle_http(
        &self,
        exchange: &mut HttpExchange,
        _call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        exchange.write_json(&serde_json::json!({
            "rooms": self.rooms.room_count(),
        }))
    }
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing(false);

    let rooms = SocketRooms::new();
    let hearth = Arc::new(
        HearthBuilder::new()
            .addons(false)
            .skip_version_check(true)
            .build(),
    );
    hearth
        .register(Arc::new(ChatHandler { rooms: rooms.clone() }))
        .expect("chat handler");
    hearth
        .register(Arc::new(StatusHandler { rooms }))
        .expect("status handler");

    if let Err(e) = hearth.start().await {
        eprintln!("startup failed: {e}");
        std::process::exit(1);
    }
    hearth.run_until_signal().await;
}
