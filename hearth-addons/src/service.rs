//! Service wiring: loaders registered per service interface receive the
//! providers harvested from addon archives and their dependency bundles.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::space::ResolvedComponent;

/// Receives providers of one service interface.
pub trait ServiceLoader: Send + Sync {
    /// Fully qualified service-interface name this loader consumes.
    fn interface(&self) -> &str;

    /// Called once per provider entry, with the provider resolved through
    /// the owning addon's code space.
    fn load(&self, addon: &str, provider: ResolvedComponent);
}

/// Loader registry, keyed by service-interface name.
#[derive(Default)]
pub struct ServiceLoaderRegistry {
    loaders: DashMap<String, Arc<dyn ServiceLoader>>,
}

impl ServiceLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, loader: Arc<dyn ServiceLoader>) {
        self.loaders.insert(loader.interface().to_string(), loader);
    }

    /// Loader for an interface, if one is registered. Unknown interfaces are
    /// a debug-level event at the call sites, never an error.
    pub fn get(&self, interface: &str) -> Option<Arc<dyn ServiceLoader>> {
        let loader = self.loaders.get(interface).map(|l| l.clone());
        if loader.is_none() {
            debug!(interface, "no service loader registered, provider skipped");
        }
        loader
    }
}
