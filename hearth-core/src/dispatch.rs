//! Endpoint selection for inbound exchanges.
//!
//! Matching walks the pattern buckets of the requested server kind, filters
//! survivors through the requirement chain in registration order, and leaves
//! the priority decision to the caller-facing [`Selection`]: the primary is
//! the highest-priority survivor (ties broken by registration order), and
//! `Monitor` survivors observe the exchange after the primary completes.

use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::exchange::{ExchangeHead, FramePayload};
use crate::handler::{Priority, ServerKind};
use crate::registry::{RouteRegistry, ShareMount};
use crate::url::PathParams;

/// One matched endpoint with its captured path parameters.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub endpoint: Arc<Endpoint>,
    pub params: PathParams,
}

/// The invocation plan for a dispatched exchange.
#[derive(Debug)]
pub struct Selection {
    /// Highest-priority survivor; invoked first.
    pub primary: Candidate,
    /// `Monitor` survivors, invoked after the primary returns.
    pub monitors: Vec<Candidate>,
}

/// Dispatch result for an HTTP exchange.
#[derive(Debug)]
pub enum HttpDispatch {
    Endpoints(Selection),
    /// A share mount matched; `tail` names the file relative to its root.
    Share {
        mount: Arc<ShareMount>,
        tail: String,
    },
    /// A share matched but its only-get flag refuses the request method.
    ShareMethodRefused,
    NotFound,
}

/// Dispatch result for one WebSocket frame.
#[derive(Debug)]
pub enum SocketDispatch {
    Endpoints(Selection),
    NotFound,
}

/// Matches and selects endpoints for inbound exchanges.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// The ordered, requirement-filtered candidate list for an exchange.
    ///
    /// Order is the bucket iteration order (canonical pattern, ascending)
    /// with registration order inside each bucket; deterministic for any
    /// registry state.
    pub fn candidates(&self, kind: ServerKind, head: &ExchangeHead) -> Vec<Candidate> {
        let table = self.registry.snapshot();
        let requirements = self.registry.requirements().snapshot(kind);
        let mut out = Vec::new();
        for bucket in table.buckets(kind).values() {
            let Some(params) = bucket.pattern.matches(&head.path) else {
                continue;
            };
            for endpoint in &bucket.endpoints {
                if requirements.iter().any(|r| !r.applies(head, endpoint)) {
                    continue;
                }
                out.push(Candidate {
                    endpoint: endpoint.clone(),
                    params: params.clone(),
                });
            }
        }
        out
    }

    /// Dispatch an HTTP exchange: endpoints first, then share mounts, then
    /// NOT-FOUND.
    pub fn dispatch_http(&self, head: &ExchangeHead) -> HttpDispatch {
        let candidates = self.candidates(ServerKind::Http, head);
        if let Some(selection) = select(candidates) {
            return HttpDispatch::Endpoints(selection);
        }
        let table = self.registry.snapshot();
        let mut refused = false;
        for mount in table.shares() {
            if let Some((_, tail)) = mount.pattern().matches_share(&head.path) {
                if mount.only_get() && head.method != http::Method::GET {
                    refused = true;
                    continue;
                }
                return HttpDispatch::Share {
                    mount: mount.clone(),
                    tail,
                };
            }
        }
        if refused {
            HttpDispatch::ShareMethodRefused
        } else {
            HttpDispatch::NotFound
        }
    }

    /// Dispatch one WebSocket frame against the socket bucket, keeping only
    /// endpoints whose entry flavor consumes this payload.
    pub fn dispatch_socket(&self, head: &ExchangeHead, payload: &FramePayload) -> SocketDispatch {
        let mut candidates = self.candidates(ServerKind::WebSocket, head);
        candidates.retain(|c| c.endpoint.kind().accepts(payload));
        match select(candidates) {
            Some(selection) => SocketDispatch::Endpoints(selection),
            None => SocketDispatch::NotFound,
        }
    }

    /// Whether any socket pattern matches this path at all, before payload
    /// filtering; gates the upgrade handshake.
    pub fn socket_path_known(&self, head: &ExchangeHead) -> bool {
        !self.candidates(ServerKind::WebSocket, head).is_empty()
    }
}

/// Choose the primary (priority descending, registration order ascending)
/// and the trailing `Monitor` observers.
///
/// `Monitor` survivors never answer the exchange while a non-monitor
/// survivor exists; they observe after it completes. When only monitors
/// match, the first of them is invoked as the primary.
fn select(candidates: Vec<Candidate>) -> Option<Selection> {
    if candidates.is_empty() {
        return None;
    }
    let mut ordered = candidates;
    ordered.sort_by(|a, b| {
        b.endpoint
            .priority()
            .cmp(&a.endpoint.priority())
            .then(a.endpoint.id().cmp(&b.endpoint.id()))
    });
    let (mut monitors, rest): (Vec<_>, Vec<_>) = ordered
        .into_iter()
        .partition(|c| c.endpoint.priority() == Priority::Monitor);
    let primary = match rest.into_iter().next() {
        Some(primary) => primary,
        None => monitors.remove(0),
    };
    Some(Selection { primary, monitors })
}
