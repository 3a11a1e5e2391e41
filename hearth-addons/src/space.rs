//! Per-addon isolation spaces.
//!
//! A code space resolves component names for one addon: its parent is the
//! host's base space, its self-scope is the addon archive plus every resolved
//! dependency bundle, and names it cannot resolve locally are searched in the
//! other addons' spaces in registration order. Cross-space hits against an
//! undeclared provider are diagnosed once per (consumer, provider) pair.
//! Names rooted at the engine's internal prefix never resolve through a
//! space's own lookup.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::archive::AddonArchive;
use crate::component::{ComponentDef, SUPPORTED_FORMAT};
use crate::manifest::AddonManifest;
use crate::AddonError;

/// Names under this prefix are internal to the engine and hidden from addon
/// lookup; only host-registered (already linked) components resolve.
pub const ENGINE_PREFIX: &str = "hearth.";

/// Where a resolution found its component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// The host's base space.
    Host,
    /// The addon's own archive.
    Own,
    /// One of the addon's dependency bundles, by URI.
    Dependency(String),
    /// Another addon's space.
    Addon(String),
}

/// A successful component resolution.
#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    pub def: ComponentDef,
    pub provenance: Provenance,
}

// ── Host space ──────────────────────────────────────────────────────────

/// The system base space: components linked into the host and visible to
/// every addon.
#[derive(Default)]
pub struct HostSpace {
    components: DashMap<String, ComponentDef>,
}

impl HostSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a host component under the given name.
    pub fn publish(&self, name: impl Into<String>) {
        let name = name.into();
        self.components.insert(
            name.clone(),
            ComponentDef {
                name,
                format: SUPPORTED_FORMAT,
                auto_register: None,
            },
        );
    }

    fn component(&self, name: &str) -> Option<ComponentDef> {
        self.components.get(name).map(|def| def.clone())
    }
}

// ── Dependency spaces ───────────────────────────────────────────────────

/// A resolved dependency bundle wrapped in its own space. Artifacts that are
/// not readable bundles contribute nothing; the wrapper stays as a negative
/// entry so the open is attempted once per URI.
#[derive(Debug)]
pub struct DependencySpace {
    uri: String,
    archive: Option<AddonArchive>,
}

impl DependencySpace {
    pub fn open(uri: impl Into<String>, path: &Path) -> Self {
        let uri = uri.into();
        let archive = match AddonArchive::open(path) {
            Ok(archive) => Some(archive),
            Err(e) => {
                debug!(uri, "dependency artifact is not a component bundle: {e}");
                None
            }
        };
        DependencySpace { uri, archive }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn archive(&self) -> Option<&AddonArchive> {
        self.archive.as_ref()
    }

    fn component(&self, name: &str) -> Option<&ComponentDef> {
        self.archive.as_ref().and_then(|a| a.component(name))
    }
}

// ── Code spaces ─────────────────────────────────────────────────────────

/// One addon's name-resolution domain.
pub struct CodeSpace {
    addon: String,
    manifest: Arc<AddonManifest>,
    archive: Arc<AddonArchive>,
    dependencies: Vec<Arc<DependencySpace>>,
}

impl CodeSpace {
    pub fn new(
        manifest: Arc<AddonManifest>,
        archive: Arc<AddonArchive>,
        dependencies: Vec<Arc<DependencySpace>>,
    ) -> Arc<Self> {
        // Dependency spaces are deduplicated by URI.
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.uri().to_string()))
            .collect();
        Arc::new(CodeSpace {
            addon: manifest.name.clone(),
            manifest,
            archive,
            dependencies,
        })
    }

    pub fn addon(&self) -> &str {
        &self.addon
    }

    pub fn dependencies(&self) -> &[Arc<DependencySpace>] {
        &self.dependencies
    }

    /// Self-scope lookup: own archive first, then dependency bundles.
    fn find_local(&self, name: &str) -> Option<ResolvedComponent> {
        if let Some(def) = self.archive.component(name) {
            return Some(ResolvedComponent {
                def: def.clone(),
                provenance: Provenance::Own,
            });
        }
        for dep in &self.dependencies {
            if let Some(def) = dep.component(name) {
                return Some(ResolvedComponent {
                    def: def.clone(),
                    provenance: Provenance::Dependency(dep.uri().to_string()),
                });
            }
        }
        None
    }
}

// ── Space registry ──────────────────────────────────────────────────────

/// All live code spaces, in registration order, plus the cross-space
/// diagnostic state.
pub struct SpaceRegistry {
    host: Arc<HostSpace>,
    spaces: RwLock<Vec<Arc<CodeSpace>>>,
    warned: Mutex<HashSet<(String, String)>>,
}

impl SpaceRegistry {
    pub fn new(host: Arc<HostSpace>) -> Self {
        SpaceRegistry {
            host,
            spaces: RwLock::new(Vec::new()),
            warned: Mutex::new(HashSet::new()),
        }
    }

    pub fn host(&self) -> &Arc<HostSpace> {
        &self.host
    }

    pub fn register(&self, space: Arc<CodeSpace>) {
        self.spaces
            .write()
            .expect("space list poisoned")
            .push(space);
    }

    /// Drop an addon's space; called when the addon is fully disabled.
    pub fn remove(&self, addon: &str) {
        self.spaces
            .write()
            .expect("space list poisoned")
            .retain(|s| !s.addon().eq_ignore_ascii_case(addon));
    }

    /// (consumer, provider) pairs that resolved across spaces without a
    /// declared dependency.
    pub fn undeclared_uses(&self) -> Vec<(String, String)> {
        self.warned
            .lock()
            .expect("warn set poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Resolve a component name for the given space: parent base space,
    /// then self-scope, then the other addons' spaces in registration order.
    pub fn resolve(&self, space: &CodeSpace, name: &str) -> Result<ResolvedComponent, AddonError> {
        if let Some(def) = self.host.component(name) {
            return Ok(ResolvedComponent {
                def,
                provenance: Provenance::Host,
            });
        }

        // Engine internals are never resolvable through a space's own find.
        if name.starts_with(ENGINE_PREFIX) {
            return Err(AddonError::ClassNotFound(name.to_string()));
        }

        if let Some(resolved) = space.find_local(name) {
            return Ok(resolved);
        }

        let spaces = self.spaces.read().expect("space list poisoned").clone();
        for other in &spaces {
            if other.addon().eq_ignore_ascii_case(space.addon()) {
                continue;
            }
            if let Some(found) = other.find_local(name) {
                if !space.manifest.declares_dependency(other.addon()) {
                    self.warn_undeclared(space.addon(), name, other.addon());
                }
                return Ok(ResolvedComponent {
                    def: found.def,
                    provenance: Provenance::Addon(other.addon().to_string()),
                });
            }
        }

        Err(AddonError::ClassNotFound(name.to_string()))
    }

    fn warn_undeclared(&self, consumer: &str, class: &str, provider: &str) {
        let key = (consumer.to_string(), provider.to_string());
        let mut warned = self.warned.lock().expect("warn set poisoned");
        if warned.insert(key) {
            warn!("{consumer} loaded {class} from {provider} which is not marked as dependent");
        }
    }
}
