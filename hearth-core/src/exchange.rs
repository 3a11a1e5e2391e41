//! Exchange types handed to endpoints.
//!
//! [`HttpExchange`] wraps one HTTP request/response pair; [`SocketExchange`]
//! wraps one WebSocket connection. Both expose an [`ExchangeHead`], the
//! request attributes available before any handler runs, which is what
//! requirement predicates filter on.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::HandlerError;

/// Request attributes available to requirement predicates and handlers
/// before invocation.
#[derive(Debug, Clone)]
pub struct ExchangeHead {
    pub method: Method,
    /// Raw request path (canonicalised by the dispatcher before matching).
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
    /// Absolute deadline for the whole endpoint chain.
    pub deadline: Option<Instant>,
}

impl ExchangeHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Host header without the port, lower-cased.
    pub fn domain(&self) -> Option<String> {
        self.header("host")
            .map(|h| h.split(':').next().unwrap_or(h).to_ascii_lowercase())
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────────

/// The response under construction for an HTTP exchange.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseState {
    fn default() -> Self {
        ResponseState {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

/// One HTTP request/response pair.
pub struct HttpExchange {
    head: ExchangeHead,
    body: Bytes,
    response: ResponseState,
}

impl HttpExchange {
    pub fn new(head: ExchangeHead, body: Bytes) -> Self {
        HttpExchange {
            head,
            body,
            response: ResponseState::default(),
        }
    }

    pub fn head(&self) -> &ExchangeHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decoded query parameters, in order of appearance.
    pub fn query_params(&self) -> Vec<(String, String)> {
        match &self.head.query {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    // ── Response construction ──

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), HandlerError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HandlerError::internal(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| HandlerError::internal(e.to_string()))?;
        self.response.headers.insert(name, value);
        Ok(())
    }

    /// Append raw bytes to the response body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.response.body.extend_from_slice(bytes);
    }

    /// Append text to the response body.
    pub fn print(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Serialize a value as the JSON response body.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<(), HandlerError> {
        let body = serde_json::to_vec(value)?;
        self.response
            .headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.response.body.extend_from_slice(&body);
        Ok(())
    }

    /// Take the response built so far, leaving a fresh default in place.
    /// Writes performed afterwards (monitor observation) are discarded with it.
    pub fn take_response(&mut self) -> ResponseState {
        std::mem::take(&mut self.response)
    }
}

impl ResponseState {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_axum(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(axum::body::Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

// ── WebSocket ────────────────────────────────────────────────────────────

/// One inbound WebSocket frame, as consumed by socket entry points.
#[derive(Debug, Clone)]
pub enum FramePayload {
    Text(String),
    Binary(Vec<u8>),
    /// The raw frame, for `EntryKind::SocketFrame` endpoints.
    Frame(Message),
}

/// One WebSocket connection. Cheap to clone; all clones feed the same
/// outbound writer task.
#[derive(Clone)]
pub struct SocketExchange {
    head: Arc<ExchangeHead>,
    id: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

impl SocketExchange {
    pub fn new(head: ExchangeHead, id: u64, outbound: mpsc::UnboundedSender<Message>) -> Self {
        SocketExchange {
            head: Arc::new(head),
            id,
            outbound,
        }
    }

    pub fn head(&self) -> &ExchangeHead {
        &self.head
    }

    /// Connection identifier, unique per listener lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), HandlerError> {
        self.send(Message::Text(text.into().into()))
    }

    pub fn send_binary(&self, data: Vec<u8>) -> Result<(), HandlerError> {
        self.send(Message::Binary(data.into()))
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), HandlerError> {
        let json = serde_json::to_string(value)?;
        self.send_text(json)
    }

    pub fn send(&self, msg: Message) -> Result<(), HandlerError> {
        self.outbound
            .send(msg)
            .map_err(|_| HandlerError::internal("socket closed"))
    }

    /// Request an orderly close of the connection.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl std::fmt::Debug for SocketExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketExchange")
            .field("id", &self.id)
            .field("path", &self.head.path)
            .finish()
    }
}
