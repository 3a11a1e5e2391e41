//! Handler contracts and route declarations.
//!
//! A handler declares its endpoints as data ([`RouteSpec`]) and implements
//! the invocation contract for the server kinds it serves: [`RequestHandler`]
//! for HTTP, [`SocketHandler`] for WebSocket frames. One handler may carry
//! both contracts. Registering a route whose flavor the handler does not
//! implement fails with `CoreError::InvalidHandler`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::exchange::{FramePayload, HttpExchange, SocketExchange};
use crate::url::PathParams;

/// The two server kinds sharing the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    Http,
    WebSocket,
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerKind::Http => write!(f, "http"),
            ServerKind::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Endpoint priority. `Monitor` endpoints observe the exchange after the
/// primary handler has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Monitor,
}

/// The entry-point flavor of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// HTTP request entry point.
    Http,
    /// WebSocket entry point receiving text frames.
    SocketText,
    /// WebSocket entry point receiving binary frames.
    SocketBinary,
    /// WebSocket entry point receiving every frame.
    SocketFrame,
}

impl EntryKind {
    pub fn server_kind(&self) -> ServerKind {
        match self {
            EntryKind::Http => ServerKind::Http,
            _ => ServerKind::WebSocket,
        }
    }

    /// Whether an endpoint of this flavor consumes the given payload.
    pub fn accepts(&self, payload: &FramePayload) -> bool {
        match self {
            EntryKind::Http => false,
            EntryKind::SocketText => matches!(payload, FramePayload::Text(_)),
            EntryKind::SocketBinary => matches!(payload, FramePayload::Binary(_)),
            EntryKind::SocketFrame => true,
        }
    }
}

/// Requirement descriptor values declared on a handler or a route, keyed by
/// requirement kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSet(BTreeMap<String, Vec<String>>);

impl DescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values for a requirement kind.
    pub fn with(mut self, kind: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.0
            .entry(kind.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn values(&self, kind: &str) -> &[String] {
        self.0.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Combine two sets, keeping this set's values first per kind.
    pub fn merged(&self, other: &DescriptorSet) -> DescriptorSet {
        let mut out = self.clone();
        for (kind, values) in &other.0 {
            out.0
                .entry(kind.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
        out
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A declared endpoint on a handler: the per-route counterpart of the
/// class/method annotations of the source model.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Child template, merged under the handler's base template.
    pub template: String,
    /// Name of the target entry point on the handler.
    pub method: &'static str,
    pub kind: EntryKind,
    pub priority: Priority,
    pub descriptors: DescriptorSet,
}

impl RouteSpec {
    fn new(template: impl Into<String>, method: &'static str, kind: EntryKind) -> Self {
        RouteSpec {
            template: template.into(),
            method,
            kind,
            priority: Priority::default(),
            descriptors: DescriptorSet::new(),
        }
    }

    pub fn http(template: impl Into<String>, method: &'static str) -> Self {
        Self::new(template, method, EntryKind::Http)
    }

    pub fn socket_text(template: impl Into<String>, method: &'static str) -> Self {
        Self::new(template, method, EntryKind::SocketText)
    }

    pub fn socket_binary(template: impl Into<String>, method: &'static str) -> Self {
        Self::new(template, method, EntryKind::SocketBinary)
    }

    pub fn socket_frame(template: impl Into<String>, method: &'static str) -> Self {
        Self::new(template, method, EntryKind::SocketFrame)
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn descriptor(
        mut self,
        kind: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.descriptors = self.descriptors.with(kind, values);
        self
    }
}

/// Identifies the entry point selected for an invocation, together with the
/// values captured by the pattern's named groups.
#[derive(Debug, Clone)]
pub struct EndpointCall {
    pub method: &'static str,
    pub params: PathParams,
}

/// Base contract every handler implements: its route declarations plus
/// upcasts to the invocation contracts it supports.
pub trait Handler: Send + Sync + 'static {
    /// Handler-level parent template; route templates merge under it.
    fn base_template(&self) -> &str {
        "/"
    }

    /// The endpoints this handler declares.
    fn routes(&self) -> Vec<RouteSpec>;

    /// Handler-level requirement descriptor values, combined with each
    /// route's own.
    fn descriptors(&self) -> DescriptorSet {
        DescriptorSet::new()
    }

    /// Upcast to the HTTP invocation contract, if implemented.
    fn as_request_handler(self: Arc<Self>) -> Option<Arc<dyn RequestHandler>> {
        None
    }

    /// Upcast to the WebSocket invocation contract, if implemented.
    fn as_socket_handler(self: Arc<Self>) -> Option<Arc<dyn SocketHandler>> {
        None
    }
}

/// HTTP invocation contract.
#[async_trait]
pub trait RequestHandler: Handler {
    async fn handle_http(
        &self,
        exchange: &mut HttpExchange,
        call: &EndpointCall,
    ) -> Result<(), HandlerError>;
}

/// WebSocket invocation contract.
#[async_trait]
pub trait SocketHandler: Handler {
    async fn handle_socket(
        &self,
        exchange: &SocketExchange,
        payload: &FramePayload,
        call: &EndpointCall,
    ) -> Result<(), HandlerError>;
}

/// A registered handler together with its resolved invocation contracts.
#[derive(Clone)]
pub struct HandlerEntry {
    handler: Arc<dyn Handler>,
    request: Option<Arc<dyn RequestHandler>>,
    socket: Option<Arc<dyn SocketHandler>>,
}

impl HandlerEntry {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        let request = handler.clone().as_request_handler();
        let socket = handler.clone().as_socket_handler();
        HandlerEntry {
            handler,
            request,
            socket,
        }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn request(&self) -> Option<&Arc<dyn RequestHandler>> {
        self.request.as_ref()
    }

    pub fn socket(&self) -> Option<&Arc<dyn SocketHandler>> {
        self.socket.as_ref()
    }

    /// Identity comparison on the underlying handler instance.
    pub fn same_handler(&self, other: &Arc<dyn Handler>) -> bool {
        Arc::ptr_eq(&self.handler, other)
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("request", &self.request.is_some())
            .field("socket", &self.socket.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_total_order() {
        assert!(Priority::Lowest < Priority::Low);
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Highest);
        assert!(Priority::Highest < Priority::Monitor);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn descriptor_set_collects_by_kind() {
        let set = DescriptorSet::new()
            .with("domain", ["a.example", "b.example"])
            .with("domain", ["c.example"])
            .with("method", ["GET"]);
        assert_eq!(set.values("domain").len(), 3);
        assert_eq!(set.values("method"), ["GET"]);
        assert!(set.values("absent").is_empty());
    }
}
