//! The addon contract, its context handle, and per-addon records.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use hearth_core::error::CoreError;
use hearth_core::handler::{Handler, ServerKind};
use hearth_core::registry::RouteRegistry;
use hearth_core::requirement::Requirement;

use crate::archive::AddonArchive;
use crate::autoregister::AutoRegisterDescriptor;
use crate::manifest::AddonManifest;
use crate::scanner::ServiceDescriptor;
use crate::space::CodeSpace;
use crate::AddonError;

/// Lifecycle callbacks an addon entry point implements. All callbacks are
/// optional; errors are isolated to the addon (FAIL-SLOW) and never stop the
/// engine.
#[allow(unused_variables)]
#[async_trait]
pub trait Addon: Send + Sync + 'static {
    async fn on_load(&self, ctx: &AddonContext) -> Result<(), AddonError> {
        Ok(())
    }

    async fn on_enable(&self, ctx: &AddonContext) -> Result<(), AddonError> {
        Ok(())
    }

    async fn on_disable(&self, ctx: &AddonContext) -> Result<(), AddonError> {
        Ok(())
    }
}

/// Placeholder instance for addons whose manifest declares no `main`.
pub struct HollowAddon;

#[async_trait]
impl Addon for HollowAddon {}

/// Loader state of an addon record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Discovered,
    Instantiated,
    Loaded,
    Enabled,
    Disabled,
}

/// Logger scoped to one addon's name.
#[derive(Debug, Clone)]
pub struct AddonLogger {
    addon: String,
}

impl AddonLogger {
    pub fn new(addon: impl Into<String>) -> Self {
        AddonLogger { addon: addon.into() }
    }

    pub fn info(&self, message: &str) {
        tracing::info!(addon = %self.addon, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(addon = %self.addon, "{message}");
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(addon = %self.addon, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(addon = %self.addon, "{message}");
    }
}

/// The engine handle injected into an addon instance. Registrations made
/// through the context are recorded so shutdown can unwind exactly what the
/// addon contributed.
pub struct AddonContext {
    name: String,
    manifest: Arc<AddonManifest>,
    registry: Arc<RouteRegistry>,
    logger: AddonLogger,
    data_dir: PathBuf,
    registered: Mutex<Vec<Arc<dyn Handler>>>,
}

impl AddonContext {
    pub(crate) fn new(
        manifest: Arc<AddonManifest>,
        registry: Arc<RouteRegistry>,
        data_dir: PathBuf,
    ) -> Self {
        let name = manifest.name.clone();
        AddonContext {
            logger: AddonLogger::new(&name),
            name,
            manifest,
            registry,
            data_dir,
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest(&self) -> &AddonManifest {
        &self.manifest
    }

    pub fn logger(&self) -> &AddonLogger {
        &self.logger
    }

    /// Directory the addon may persist its own files under.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Register a handler's routes; recorded for unwinding at shutdown.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> Result<(), CoreError> {
        self.registry.register(handler.clone())?;
        self.registered
            .lock()
            .expect("handler list poisoned")
            .push(handler);
        Ok(())
    }

    pub fn unregister_handler(&self, handler: &Arc<dyn Handler>) {
        self.registry.unregister(handler);
        self.registered
            .lock()
            .expect("handler list poisoned")
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub fn register_requirement(
        &self,
        kind: ServerKind,
        requirement: Arc<dyn Requirement>,
        reprocess: bool,
    ) {
        self.registry.register_requirement(kind, requirement, reprocess);
    }

    pub fn share(
        &self,
        template: &str,
        root: impl Into<PathBuf>,
        only_get: bool,
    ) -> Result<(), CoreError> {
        self.registry.share(template, root, only_get)
    }

    /// Unregister everything this addon registered. Called by the engine on
    /// shutdown.
    pub(crate) fn unwind(&self) {
        let handlers: Vec<_> = self
            .registered
            .lock()
            .expect("handler list poisoned")
            .drain(..)
            .collect();
        for handler in handlers {
            self.registry.unregister(&handler);
        }
    }
}

/// Everything the engine tracks about one addon.
pub struct AddonRecord {
    pub(crate) manifest: Arc<AddonManifest>,
    pub(crate) archive: Arc<AddonArchive>,
    pub(crate) discovery_index: usize,
    pub(crate) space: RwLock<Option<Arc<CodeSpace>>>,
    pub(crate) instance: RwLock<Option<Arc<dyn Addon>>>,
    pub(crate) context: RwLock<Option<Arc<AddonContext>>>,
    pub(crate) state: RwLock<LoaderState>,
    pub(crate) services: RwLock<Vec<ServiceDescriptor>>,
    pub(crate) auto_register: RwLock<Vec<AutoRegisterDescriptor>>,
}

impl AddonRecord {
    pub(crate) fn new(
        manifest: AddonManifest,
        archive: AddonArchive,
        discovery_index: usize,
    ) -> Self {
        AddonRecord {
            manifest: Arc::new(manifest),
            archive: Arc::new(archive),
            discovery_index,
            space: RwLock::new(None),
            instance: RwLock::new(None),
            context: RwLock::new(None),
            state: RwLock::new(LoaderState::Discovered),
            services: RwLock::new(Vec::new()),
            auto_register: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &AddonManifest {
        &self.manifest
    }

    pub fn state(&self) -> LoaderState {
        *self.state.read().expect("state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: LoaderState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.services.read().expect("services lock poisoned").clone()
    }

    pub fn auto_register(&self) -> Vec<AutoRegisterDescriptor> {
        self.auto_register
            .read()
            .expect("descriptor lock poisoned")
            .clone()
    }
}
