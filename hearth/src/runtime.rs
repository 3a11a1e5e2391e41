//! The `Hearth` runtime: one handle owning the registries, the listeners,
//! and the addon engine. No process-wide singleton; everything flows from
//! this handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use hearth_addons::engine::AddonEngine;
use hearth_core::dispatch::Dispatcher;
use hearth_core::dump::ErrorDump;
use hearth_core::error::CoreError;
use hearth_core::handler::{Handler, ServerKind};
use hearth_core::registry::RouteRegistry;
use hearth_core::requirement::Requirement;
use hearth_core::server::ServerSupervisor;
use hearth_resolver::ArtifactResolver;

use crate::builder::Settings;
use crate::version;

/// Errors fatal to `start`.
#[derive(Debug)]
pub enum StartError {
    Addons(hearth_addons::AddonError),
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Addons(e) => write!(f, "addon engine refused to start: {e}"),
        }
    }
}

impl std::error::Error for StartError {}

type RestartHook = Box<dyn Fn() + Send + Sync>;

pub struct Hearth {
    settings: Settings,
    registry: Arc<RouteRegistry>,
    dispatcher: Dispatcher,
    supervisor: Arc<ServerSupervisor>,
    resolver: Arc<ArtifactResolver>,
    engine: Option<Arc<AddonEngine>>,
    dump: Arc<ErrorDump>,
    started: AtomicBool,
    restart_hook: Mutex<Option<RestartHook>>,
}

impl Hearth {
    pub(crate) fn from_settings(settings: Settings) -> Hearth {
        let registry = RouteRegistry::new(settings.skip_default_route);
        let dispatcher = Dispatcher::new(registry.clone());
        let dump = Arc::new(ErrorDump::new(settings.log_directory.join("errors")));
        let supervisor = ServerSupervisor::new(
            dispatcher.clone(),
            settings.listener_config(),
            dump.clone(),
        );
        registry.set_control(Arc::new(supervisor.clone()));

        let resolver = Arc::new(ArtifactResolver::new(&settings.library_directory));
        let engine = settings.addons.then(|| {
            AddonEngine::new(
                &settings.addon_directory,
                registry.clone(),
                resolver.clone(),
            )
        });

        Hearth {
            settings,
            registry,
            dispatcher,
            supervisor,
            resolver,
            engine,
            dump,
            started: AtomicBool::new(false),
            restart_hook: Mutex::new(None),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn supervisor(&self) -> &Arc<ServerSupervisor> {
        &self.supervisor
    }

    pub fn resolver(&self) -> &Arc<ArtifactResolver> {
        &self.resolver
    }

    /// The addon engine, unless addons were disabled at build time.
    pub fn addons(&self) -> Option<&Arc<AddonEngine>> {
        self.engine.as_ref()
    }

    pub fn dump(&self) -> &Arc<ErrorDump> {
        &self.dump
    }

    // ── Registrations (pass-through to the route registry) ──────────────

    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), CoreError> {
        self.registry.register(handler)
    }

    pub fn unregister(&self, handler: &Arc<dyn Handler>) {
        self.registry.unregister(handler)
    }

    pub fn share(
        &self,
        template: &str,
        root: impl Into<std::path::PathBuf>,
        only_get: bool,
    ) -> Result<(), CoreError> {
        self.registry.share(template, root, only_get)
    }

    pub fn register_requirement(
        &self,
        kind: ServerKind,
        requirement: Arc<dyn Requirement>,
        reprocess: bool,
    ) {
        self.registry.register_requirement(kind, requirement, reprocess)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Bring listeners up and run the addon lifecycle. The listeners come
    /// first so a refused addon set leaves the other subsystems serving.
    pub async fn start(self: &Arc<Self>) -> Result<(), StartError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(version = env!("CARGO_PKG_VERSION"), "hearth starting");

        if !self.settings.skip_version_check {
            tokio::spawn(version::poll_latest());
        }

        self.supervisor.sync().await;

        if let Some(engine) = &self.engine {
            match engine.start().await {
                Ok(report) => {
                    for failure in &report.failures {
                        warn!("{failure}");
                    }
                    for skipped in &report.skipped_archives {
                        warn!("{skipped}");
                    }
                    if !report.resolver_failures.is_empty() {
                        warn!(
                            failures = report.resolver_failures.len(),
                            "artifact resolution finished with failures: {}",
                            report.resolver_failures.join("; ")
                        );
                    }
                }
                Err(e) => {
                    error!("{e}");
                    self.started.store(false, Ordering::SeqCst);
                    return Err(StartError::Addons(e));
                }
            }
        }

        info!("hearth started");
        Ok(())
    }

    /// Orderly stop: addons unwind in reverse load order, then the
    /// listeners. Safe to call repeatedly; a second call is a no-op.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("hearth stopping");
        if let Some(engine) = &self.engine {
            engine.stop().await;
        }
        self.supervisor.shutdown().await;
        info!("hearth stopped");
    }

    /// Hook invoked between stop and start of a [`restart`](Self::restart).
    pub fn on_restart(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.restart_hook.lock().expect("restart hook poisoned") = Some(Box::new(hook));
    }

    /// Clean stop → optional hook → start, on a dedicated task.
    pub fn restart(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.stop().await;
            if let Some(hook) = &*this.restart_hook.lock().expect("restart hook poisoned") {
                hook();
            }
            if let Err(e) = this.start().await {
                error!("restart failed: {e}");
            }
        })
    }

    /// Park until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(self: &Arc<Self>) {
        wait_for_signal().await;
        self.stop().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("cannot install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
