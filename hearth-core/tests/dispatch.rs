use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::dispatch::{Dispatcher, HttpDispatch};
use hearth_core::endpoint::Endpoint;
use hearth_core::error::HandlerError;
use hearth_core::exchange::{ExchangeHead, FramePayload, HttpExchange, SocketExchange};
use hearth_core::handler::{
    EndpointCall, Handler, Priority, RequestHandler, RouteSpec, ServerKind, SocketHandler,
};
use hearth_core::registry::RouteRegistry;
use hearth_core::requirement::Requirement;

fn head(path: &str) -> ExchangeHead {
    ExchangeHead {
        method: http::Method::GET,
        path: path.to_string(),
        query: None,
        headers: http::HeaderMap::new(),
        peer: None,
        deadline: None,
    }
}

struct Route {
    template: &'static str,
    priority: Priority,
}

impl Handler for Route {
    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::http(self.template, "handle").priority(self.priority)]
    }

    fn as_request_handler(self: Arc<Self>) -> Option<Arc<dyn RequestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RequestHandler for Route {
    async fn handle_http(
        &self,
        _exchange: &mut HttpExchange,
        _call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn setup(routes: Vec<Route>) -> Dispatcher {
    let registry = RouteRegistry::new(true);
    for route in routes {
        registry.register(Arc::new(route)).unwrap();
    }
    Dispatcher::new(registry)
}

#[test]
fn highest_priority_wins() {
    let dispatcher = setup(vec![
        Route { template: "/x", priority: Priority::Low },
        Route { template: "/x", priority: Priority::Highest },
        Route { template: "/x", priority: Priority::Normal },
    ]);
    match dispatcher.dispatch_http(&head("/x")) {
        HttpDispatch::Endpoints(selection) => {
            assert_eq!(selection.primary.endpoint.priority(), Priority::Highest);
            assert!(selection.monitors.is_empty());
        }
        other => panic!("expected endpoints, got {other:?}"),
    }
}

#[test]
fn ties_break_by_registration_order() {
    let dispatcher = setup(vec![
        Route { template: "/x", priority: Priority::Normal },
        Route { template: "/x", priority: Priority::Normal },
    ]);
    let candidates = dispatcher.candidates(ServerKind::Http, &head("/x"));
    match dispatcher.dispatch_http(&head("/x")) {
        HttpDispatch::Endpoints(selection) => {
            let min_id = candidates.iter().map(|c| c.endpoint.id()).min().unwrap();
            assert_eq!(selection.primary.endpoint.id(), min_id);
        }
        other => panic!("expected endpoints, got {other:?}"),
    }
}

#[test]
fn monitors_trail_the_primary() {
    let dispatcher = setup(vec![
        Route { template: "/x", priority: Priority::Normal },
        Route { template: "/x", priority: Priority::Monitor },
        Route { template: "/x", priority: Priority::Monitor },
    ]);
    match dispatcher.dispatch_http(&head("/x")) {
        HttpDispatch::Endpoints(selection) => {
            assert_eq!(selection.primary.endpoint.priority(), Priority::Normal);
            assert_eq!(selection.monitors.len(), 2);
        }
        other => panic!("expected endpoints, got {other:?}"),
    }
}

#[test]
fn monitor_answers_only_when_nothing_else_matches() {
    let dispatcher = setup(vec![Route { template: "/x", priority: Priority::Monitor }]);
    match dispatcher.dispatch_http(&head("/x")) {
        HttpDispatch::Endpoints(selection) => {
            assert_eq!(selection.primary.endpoint.priority(), Priority::Monitor);
            assert!(selection.monitors.is_empty());
        }
        other => panic!("expected endpoints, got {other:?}"),
    }
}

#[test]
fn candidate_list_is_deterministic() {
    let dispatcher = setup(vec![
        Route { template: "/a/{id}", priority: Priority::Normal },
        Route { template: "/{seg}/7", priority: Priority::High },
    ]);
    let first: Vec<u64> = dispatcher
        .candidates(ServerKind::Http, &head("/a/7"))
        .iter()
        .map(|c| c.endpoint.id())
        .collect();
    for _ in 0..16 {
        let again: Vec<u64> = dispatcher
            .candidates(ServerKind::Http, &head("/a/7"))
            .iter()
            .map(|c| c.endpoint.id())
            .collect();
        assert_eq!(first, again);
    }
    assert_eq!(first.len(), 2);
}

#[test]
fn path_params_are_captured_per_pattern() {
    let dispatcher = setup(vec![Route { template: "/users/{id}", priority: Priority::Normal }]);
    let candidates = dispatcher.candidates(ServerKind::Http, &head("/USERS/42/"));
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].params.get("id"), Some("42"));
}

// ── Requirement filtering ───────────────────────────────────────────────

struct HeaderRequirement;

impl Requirement for HeaderRequirement {
    fn kind(&self) -> &str {
        "require-header"
    }

    fn normalise(&self, values: Vec<String>) -> Vec<String> {
        values.into_iter().map(|v| v.to_ascii_lowercase()).collect()
    }

    fn applies(&self, head: &ExchangeHead, endpoint: &Endpoint) -> bool {
        let wanted = endpoint.requirement_values("require-header");
        wanted.is_empty() || wanted.iter().all(|name| head.headers.contains_key(name.as_str()))
    }
}

struct Guarded;

impl Handler for Guarded {
    fn descriptors(&self) -> hearth_core::handler::DescriptorSet {
        hearth_core::handler::DescriptorSet::new().with("require-header", ["X-Token"])
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::http("/guarded", "guarded")]
    }

    fn as_request_handler(self: Arc<Self>) -> Option<Arc<dyn RequestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RequestHandler for Guarded {
    async fn handle_http(
        &self,
        _exchange: &mut HttpExchange,
        _call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn requirement_filters_candidates() {
    let registry = RouteRegistry::new(true);
    registry.register_requirement(ServerKind::Http, Arc::new(HeaderRequirement), false);
    registry.register(Arc::new(Guarded)).unwrap();
    let dispatcher = Dispatcher::new(registry);

    assert!(dispatcher
        .candidates(ServerKind::Http, &head("/guarded"))
        .is_empty());

    let mut with_header = head("/guarded");
    with_header
        .headers
        .insert("x-token", http::HeaderValue::from_static("1"));
    assert_eq!(
        dispatcher
            .candidates(ServerKind::Http, &with_header)
            .len(),
        1
    );
}

#[test]
fn reprocess_applies_to_existing_endpoints() {
    let registry = RouteRegistry::new(true);
    registry.register(Arc::new(Guarded)).unwrap();

    // Registered without reprocess: the existing endpoint keeps its empty
    // requirement map and stays in the candidate set.
    registry.register_requirement(ServerKind::Http, Arc::new(HeaderRequirement), false);
    let dispatcher = Dispatcher::new(registry);
    assert_eq!(
        dispatcher
            .candidates(ServerKind::Http, &head("/guarded"))
            .len(),
        1
    );

    // Reprocess harvests the declared values (normalised) into the endpoint.
    let registry = dispatcher.registry();
    registry.register_requirement(ServerKind::Http, Arc::new(HeaderRequirement), true);
    let table = registry.snapshot();
    let bucket = table.buckets(ServerKind::Http).get("/guarded").unwrap();
    assert_eq!(
        bucket.endpoints[0].requirement_values("require-header"),
        ["x-token"]
    );
    assert!(dispatcher
        .candidates(ServerKind::Http, &head("/guarded"))
        .is_empty());
}

// ── Socket payload flavors ──────────────────────────────────────────────

struct Echo;

impl Handler for Echo {
    fn routes(&self) -> Vec<RouteSpec> {
        vec![
            RouteSpec::socket_text("/chat", "text"),
            RouteSpec::socket_binary("/chat", "binary"),
        ]
    }

    fn as_socket_handler(self: Arc<Self>) -> Option<Arc<dyn SocketHandler>> {
        Some(self)
    }
}

#[async_trait]
impl SocketHandler for Echo {
    async fn handle_socket(
        &self,
        _exchange: &SocketExchange,
        _payload: &FramePayload,
        _call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn socket_dispatch_filters_by_payload_flavor() {
    let registry = RouteRegistry::new(true);
    registry.register(Arc::new(Echo)).unwrap();
    let dispatcher = Dispatcher::new(registry);

    let text = FramePayload::Text("hi".into());
    match dispatcher.dispatch_socket(&head("/chat"), &text) {
        hearth_core::dispatch::SocketDispatch::Endpoints(selection) => {
            assert_eq!(selection.primary.endpoint.method(), "text");
        }
        other => panic!("expected endpoints, got {other:?}"),
    }

    let binary = FramePayload::Binary(vec![1, 2]);
    match dispatcher.dispatch_socket(&head("/chat"), &binary) {
        hearth_core::dispatch::SocketDispatch::Endpoints(selection) => {
            assert_eq!(selection.primary.endpoint.method(), "binary");
        }
        other => panic!("expected endpoints, got {other:?}"),
    }
}

#[test]
fn http_and_socket_buckets_are_independent() {
    let registry = RouteRegistry::new(true);
    registry.register(Arc::new(Echo)).unwrap();
    registry
        .register(Arc::new(Route { template: "/chat", priority: Priority::Normal }))
        .unwrap();
    let dispatcher = Dispatcher::new(registry);

    assert_eq!(dispatcher.candidates(ServerKind::Http, &head("/chat")).len(), 1);
    assert_eq!(
        dispatcher
            .candidates(ServerKind::WebSocket, &head("/chat"))
            .len(),
        2
    );
}
