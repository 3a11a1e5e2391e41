//! Requirement predicates and their per-server-kind registry.
//!
//! A requirement is an externally supplied predicate bound to one server
//! kind. It declares the descriptor kind it consumes from endpoints and an
//! `applies` check evaluated at dispatch. Requirements run in registration
//! order; the first `false` short-circuits the endpoint out of the candidate
//! set.

use std::sync::Arc;
use std::sync::RwLock;

use crate::endpoint::Endpoint;
use crate::exchange::ExchangeHead;
use crate::handler::ServerKind;

/// An endpoint filter predicate.
pub trait Requirement: Send + Sync + 'static {
    /// The descriptor kind this requirement consumes from handlers/routes.
    fn kind(&self) -> &str;

    /// Normalise harvested descriptor values before they are stored on an
    /// endpoint (lower-casing, trimming, whatever the predicate expects).
    fn normalise(&self, values: Vec<String>) -> Vec<String> {
        values
    }

    /// Whether the endpoint stays in the candidate set for this exchange.
    fn applies(&self, head: &ExchangeHead, endpoint: &Endpoint) -> bool;
}

/// Ordered requirement buckets, one per server kind.
#[derive(Default)]
pub struct RequirementRegistry {
    http: RwLock<Vec<Arc<dyn Requirement>>>,
    websocket: RwLock<Vec<Arc<dyn Requirement>>>,
}

impl RequirementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, kind: ServerKind) -> &RwLock<Vec<Arc<dyn Requirement>>> {
        match kind {
            ServerKind::Http => &self.http,
            ServerKind::WebSocket => &self.websocket,
        }
    }

    /// Append a requirement to its bucket, FIFO.
    pub fn register(&self, kind: ServerKind, requirement: Arc<dyn Requirement>) {
        self.bucket(kind)
            .write()
            .expect("requirement bucket poisoned")
            .push(requirement);
    }

    /// Snapshot of the ordered bucket.
    pub fn snapshot(&self, kind: ServerKind) -> Vec<Arc<dyn Requirement>> {
        self.bucket(kind)
            .read()
            .expect("requirement bucket poisoned")
            .clone()
    }

    /// Apply every requirement of the bucket in registration order.
    pub fn passes(&self, kind: ServerKind, head: &ExchangeHead, endpoint: &Endpoint) -> bool {
        self.snapshot(kind)
            .iter()
            .all(|req| req.applies(head, endpoint))
    }
}
