//! The route registry: endpoint store, share mounts, and the fallback rule.
//!
//! The registry keeps one pattern → endpoints bucket map per server kind.
//! Readers take an `Arc` snapshot of the whole table; mutations clone the
//! table, apply the change, and swap the `Arc` under a write lock, so
//! concurrent dispatch never observes half-applied state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::CoreError;
use crate::fallback::DefaultRouteHandler;
use crate::handler::{DescriptorSet, Handler, HandlerEntry, RouteSpec, ServerKind};
use crate::requirement::{Requirement, RequirementRegistry};
use crate::server::ServerControl;
use crate::url::{merge, CompiledPattern};

/// A static-file tree exposed under a URL prefix pattern.
#[derive(Debug)]
pub struct ShareMount {
    pattern: Arc<CompiledPattern>,
    root: PathBuf,
    only_get: bool,
}

impl ShareMount {
    pub fn pattern(&self) -> &Arc<CompiledPattern> {
        &self.pattern
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn only_get(&self) -> bool {
        self.only_get
    }
}

/// One pattern key with every endpoint registered under it.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub pattern: Arc<CompiledPattern>,
    pub endpoints: Vec<Arc<Endpoint>>,
}

/// Immutable snapshot of the registry state.
#[derive(Clone, Default)]
pub struct RouteTable {
    http: BTreeMap<String, Bucket>,
    websocket: BTreeMap<String, Bucket>,
    shares: Vec<Arc<ShareMount>>,
    fallback: Option<Arc<dyn Handler>>,
}

impl RouteTable {
    pub fn buckets(&self, kind: ServerKind) -> &BTreeMap<String, Bucket> {
        match kind {
            ServerKind::Http => &self.http,
            ServerKind::WebSocket => &self.websocket,
        }
    }

    fn buckets_mut(&mut self, kind: ServerKind) -> &mut BTreeMap<String, Bucket> {
        match kind {
            ServerKind::Http => &mut self.http,
            ServerKind::WebSocket => &mut self.websocket,
        }
    }

    pub fn shares(&self) -> &[Arc<ShareMount>] {
        &self.shares
    }

    /// Whether the fallback default handler is currently registered.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Endpoints registered by users (the fallback excluded).
    fn has_user_endpoints(&self) -> bool {
        let is_user = |bucket: &Bucket| {
            bucket.endpoints.iter().any(|e| match &self.fallback {
                Some(fb) => !e.entry().same_handler(fb),
                None => true,
            })
        };
        self.http.values().any(is_user) || self.websocket.values().any(is_user)
    }

    /// Whether a listener of this kind has anything to serve.
    pub fn needs(&self, kind: ServerKind) -> bool {
        match kind {
            ServerKind::Http => {
                self.http.values().any(|b| !b.endpoints.is_empty()) || !self.shares.is_empty()
            }
            ServerKind::WebSocket => self.websocket.values().any(|b| !b.endpoints.is_empty()),
        }
    }
}

/// The pattern-based endpoint store shared by both servers.
pub struct RouteRegistry {
    table: RwLock<Arc<RouteTable>>,
    requirements: RequirementRegistry,
    next_id: AtomicU64,
    skip_default_route: bool,
    default_handler: Arc<dyn Handler>,
    control: RwLock<Option<Arc<dyn ServerControl>>>,
}

impl RouteRegistry {
    pub fn new(skip_default_route: bool) -> Arc<Self> {
        let registry = Arc::new(RouteRegistry {
            table: RwLock::new(Arc::new(RouteTable::default())),
            requirements: RequirementRegistry::new(),
            next_id: AtomicU64::new(1),
            skip_default_route,
            default_handler: Arc::new(DefaultRouteHandler),
            control: RwLock::new(None),
        });
        registry.mutate(|reg, table| reg.ensure_fallback(table));
        registry
    }

    /// Wire the server supervisor in; registrations from now on wake or warn
    /// the owning listener.
    pub fn set_control(&self, control: Arc<dyn ServerControl>) {
        *self.control.write().expect("control lock poisoned") = Some(control);
    }

    /// Current table snapshot; cheap, lock held only for the clone.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.read().expect("route table poisoned").clone()
    }

    pub fn requirements(&self) -> &RequirementRegistry {
        &self.requirements
    }

    fn mutate(&self, f: impl FnOnce(&Self, &mut RouteTable)) {
        let mut guard = self.table.write().expect("route table poisoned");
        let mut table = (**guard).clone();
        f(self, &mut table);
        *guard = Arc::new(table);
    }

    fn notify_awake(&self, kinds: &[ServerKind]) {
        if let Some(control) = self.control.read().expect("control lock poisoned").clone() {
            for kind in kinds {
                control.awake_or_warn(*kind);
            }
        }
    }

    fn notify_sleep(&self, kinds: &[ServerKind]) {
        if let Some(control) = self.control.read().expect("control lock poisoned").clone() {
            for kind in kinds {
                control.sleep_if_not_needed(*kind);
            }
        }
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register every route a handler declares.
    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), CoreError> {
        let entry = HandlerEntry::new(handler.clone());
        let routes = handler.routes();
        if routes.is_empty() {
            return Err(CoreError::InvalidHandler(
                "handler declares no routes".to_string(),
            ));
        }

        // Validate flavors and compile patterns before touching the table.
        let mut prepared = Vec::with_capacity(routes.len());
        for spec in routes {
            match spec.kind.server_kind() {
                ServerKind::Http if entry.request().is_none() => {
                    return Err(CoreError::InvalidHandler(format!(
                        "route '{}' is an HTTP entry point but the handler \
                         does not implement the request contract",
                        spec.template
                    )));
                }
                ServerKind::WebSocket if entry.socket().is_none() => {
                    return Err(CoreError::InvalidHandler(format!(
                        "route '{}' is a socket entry point but the handler \
                         does not implement the socket contract",
                        spec.template
                    )));
                }
                _ => {}
            }
            let template = merge(handler.base_template(), &spec.template);
            let pattern = CompiledPattern::compile(&template)?;
            prepared.push((spec, pattern));
        }

        let class_descriptors = handler.descriptors();
        let mut touched = Vec::new();
        self.mutate(|reg, table| {
            for (spec, pattern) in prepared {
                let server_kind = spec.kind.server_kind();
                let declared = class_descriptors.merged(&spec.descriptors);
                let requirements =
                    harvest(&declared, &reg.requirements.snapshot(server_kind));
                let buckets = table.buckets_mut(server_kind);
                let bucket = buckets
                    .entry(pattern.canonical().to_string())
                    .or_insert_with(|| Bucket {
                        pattern: pattern.clone(),
                        endpoints: Vec::new(),
                    });
                let endpoint = Endpoint::new(
                    reg.next_id.fetch_add(1, Ordering::Relaxed),
                    spec.kind,
                    spec.priority,
                    spec.method,
                    bucket.pattern.clone(),
                    requirements,
                    declared,
                    entry.clone(),
                );
                debug!(
                    pattern = bucket.pattern.canonical(),
                    kind = %server_kind,
                    priority = ?endpoint.priority(),
                    "endpoint registered"
                );
                bucket.endpoints.push(Arc::new(endpoint));
                if !touched.contains(&server_kind) {
                    touched.push(server_kind);
                }
            }
            reg.remove_fallback(table);
        });
        self.notify_awake(&touched);
        Ok(())
    }

    /// Unregister a handler: remove every entry in buckets matching the
    /// handler's declared templates.
    pub fn unregister(&self, handler: &Arc<dyn Handler>) {
        let templates: Vec<String> = handler
            .routes()
            .iter()
            .map(|spec| merge(handler.base_template(), &spec.template))
            .collect();
        let mut touched = Vec::new();
        self.mutate(|reg, table| {
            for kind in [ServerKind::Http, ServerKind::WebSocket] {
                let buckets = table.buckets_mut(kind);
                let mut removed = false;
                for template in &templates {
                    if let Some(bucket) = buckets.get_mut(template.as_str()) {
                        let before = bucket.endpoints.len();
                        bucket.endpoints.retain(|e| !e.entry().same_handler(handler));
                        removed |= bucket.endpoints.len() != before;
                    }
                }
                buckets.retain(|_, b| !b.endpoints.is_empty());
                if removed {
                    touched.push(kind);
                }
            }
            reg.ensure_fallback(table);
        });
        self.notify_sleep(&touched);
    }

    /// Mount a static-file tree under a URL prefix.
    pub fn share(
        &self,
        template: &str,
        root: impl Into<PathBuf>,
        only_get: bool,
    ) -> Result<(), CoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::InvalidShare(root));
        }
        let pattern = CompiledPattern::compile_share(template)?;
        self.mutate(|reg, table| {
            table.shares.push(Arc::new(ShareMount {
                pattern,
                root,
                only_get,
            }));
            reg.remove_fallback(table);
        });
        self.notify_awake(&[ServerKind::Http]);
        Ok(())
    }

    // ── Requirements ────────────────────────────────────────────────────

    /// Append a requirement to its server-kind bucket. With `reprocess`,
    /// every endpoint already in that bucket is re-scanned: the predicate's
    /// descriptor kind is harvested from the endpoint's declared values,
    /// normalised, and merged into its requirement map.
    pub fn register_requirement(
        &self,
        kind: ServerKind,
        requirement: Arc<dyn Requirement>,
        reprocess: bool,
    ) {
        self.requirements.register(kind, requirement.clone());
        if !reprocess {
            return;
        }
        self.mutate(|_, table| {
            let buckets = table.buckets_mut(kind);
            for bucket in buckets.values_mut() {
                for slot in bucket.endpoints.iter_mut() {
                    let mut requirements = slot.requirements().clone();
                    let values = dedup(slot.declared().values(requirement.kind()).to_vec());
                    let values = requirement.normalise(values);
                    if values.is_empty() {
                        requirements.remove(requirement.kind());
                    } else {
                        requirements.insert(requirement.kind().to_string(), values);
                    }
                    *slot = Arc::new(slot.with_requirements(requirements));
                }
            }
        });
    }

    // ── Fallback rule ───────────────────────────────────────────────────

    /// The default handler is present iff no user endpoint, share, or
    /// WebSocket endpoint is registered.
    fn ensure_fallback(&self, table: &mut RouteTable) {
        if self.skip_default_route
            || table.fallback.is_some()
            || table.has_user_endpoints()
            || !table.shares.is_empty()
        {
            return;
        }
        let handler = self.default_handler.clone();
        let entry = HandlerEntry::new(handler.clone());
        for spec in handler.routes() {
            let template = merge(handler.base_template(), &spec.template);
            let pattern = CompiledPattern::compile(&template)
                .expect("default route template is static and valid");
            let endpoint = Endpoint::new(
                self.next_id.fetch_add(1, Ordering::Relaxed),
                spec.kind,
                spec.priority,
                spec.method,
                pattern.clone(),
                BTreeMap::new(),
                DescriptorSet::new(),
                entry.clone(),
            );
            table
                .buckets_mut(ServerKind::Http)
                .entry(pattern.canonical().to_string())
                .or_insert_with(|| Bucket {
                    pattern,
                    endpoints: Vec::new(),
                })
                .endpoints
                .push(Arc::new(endpoint));
        }
        table.fallback = Some(handler);
        debug!("default route installed");
    }

    fn remove_fallback(&self, table: &mut RouteTable) {
        let Some(fallback) = table.fallback.take() else {
            return;
        };
        let buckets = table.buckets_mut(ServerKind::Http);
        for bucket in buckets.values_mut() {
            bucket.endpoints.retain(|e| !e.entry().same_handler(&fallback));
        }
        buckets.retain(|_, b| !b.endpoints.is_empty());
        debug!("default route removed");
    }
}

/// Harvest every registered requirement's descriptor kind from the declared
/// values, normalised; empty entries are dropped.
fn harvest(
    declared: &DescriptorSet,
    requirements: &[Arc<dyn Requirement>],
) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for req in requirements {
        let values = req.normalise(dedup(declared.values(req.kind()).to_vec()));
        if !values.is_empty() {
            out.insert(req.kind().to_string(), values);
        }
    }
    out
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}
