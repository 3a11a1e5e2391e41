//! The WebSocket listener: upgrade gate plus the per-connection frame loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, StatusCode, Uri};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::dispatch::{Dispatcher, SocketDispatch};
use crate::exchange::{ExchangeHead, FramePayload, SocketExchange};
use crate::handler::EndpointCall;
use crate::server::ListenerConfig;

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct WsContext {
    dispatcher: Dispatcher,
    frame_timeout: Duration,
}

/// Build the catch-all router for the WebSocket listener.
pub fn ws_router(dispatcher: Dispatcher, config: &ListenerConfig) -> Router {
    let context = WsContext {
        dispatcher,
        frame_timeout: config.request_timeout,
    };
    Router::new().fallback(handle_upgrade).with_state(context)
}

async fn handle_upgrade(
    State(context): State<WsContext>,
    uri: Uri,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let head = ExchangeHead {
        method: http::Method::GET,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        peer: Some(peer),
        deadline: None,
    };
    // No socket pattern knows this path: refuse before the handshake.
    if !context.dispatcher.socket_path_known(&head) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| connection_loop(context, head, socket))
}

async fn connection_loop(context: WsContext, head: ExchangeHead, socket: WebSocket) {
    let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let exchange = SocketExchange::new(head.clone(), id, tx);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    debug!(socket = id, path = head.path, "websocket connected");
    while let Some(Ok(msg)) = stream.next().await {
        let payload = match &msg {
            Message::Close(_) => break,
            Message::Text(t) => FramePayload::Text(t.to_string()),
            Message::Binary(b) => FramePayload::Binary(b.to_vec()),
            other => FramePayload::Frame(other.clone()),
        };
        dispatch_frame(&context, &head, &exchange, payload).await;
    }
    debug!(socket = id, "websocket disconnected");
    exchange.close();
    let _ = writer.await;
}

async fn dispatch_frame(
    context: &WsContext,
    head: &ExchangeHead,
    exchange: &SocketExchange,
    payload: FramePayload,
) {
    let selection = match context.dispatcher.dispatch_socket(head, &payload) {
        SocketDispatch::Endpoints(selection) => selection,
        SocketDispatch::NotFound => {
            trace!(path = head.path, "frame matched no endpoint");
            return;
        }
    };
    let run = async {
        let primary = &selection.primary;
        if let Some(handler) = primary.endpoint.entry().socket() {
            let call = EndpointCall {
                method: primary.endpoint.method(),
                params: primary.params.clone(),
            };
            if let Err(e) = handler.handle_socket(exchange, &payload, &call).await {
                error!(path = head.path, error = %e, "socket endpoint failed");
            }
        }
        for monitor in &selection.monitors {
            if let Some(handler) = monitor.endpoint.entry().socket() {
                let call = EndpointCall {
                    method: monitor.endpoint.method(),
                    params: monitor.params.clone(),
                };
                if let Err(e) = handler.handle_socket(exchange, &payload, &call).await {
                    debug!(path = head.path, error = %e, "socket monitor failed");
                }
            }
        }
    };
    if tokio::time::timeout(context.frame_timeout, run).await.is_err() {
        error!(path = head.path, "DEADLINE: frame deadline elapsed, abandoning endpoint chain");
    }
}
