//! The addon lifecycle engine.
//!
//! `start` ingests the archives under the addon directory (plus directly
//! submitted manifests), resolves their declared artifacts, orders them by
//! dependency, builds the isolation spaces, instantiates each `main`, wires
//! services, and drives `on_load` / `on_enable` with their auto-register
//! phases. `stop` unwinds in reverse order. Callback failures never stop the
//! engine; graph failures and name conflicts do.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use url::Url;

use hearth_core::registry::RouteRegistry;
use hearth_resolver::{ArtifactCoordinate, ArtifactResolver, Repository};

use crate::addon::{Addon, AddonContext, AddonRecord, HollowAddon, LoaderState};
use crate::archive::AddonArchive;
use crate::autoregister::ProcessorRegistry;
use crate::component::{ComponentFactories, Constructed, Phase};
use crate::graph::{load_order, GraphNode};
use crate::manifest::AddonManifest;
use crate::scanner::scan;
use crate::space::{CodeSpace, DependencySpace, HostSpace, SpaceRegistry};
use crate::AddonError;

/// Outcome of an engine start: what loaded, what was skipped, what failed
/// slow. Fatal conditions surface as the `Err` of [`AddonEngine::start`]
/// instead.
#[derive(Debug, Default)]
pub struct StartReport {
    pub loaded: Vec<String>,
    /// Archives rejected during discovery (missing/malformed manifest,
    /// incompatible component format, unreadable file).
    pub skipped_archives: Vec<AddonError>,
    /// Aggregated per-coordinate resolver failures.
    pub resolver_failures: Vec<String>,
    /// FAIL-SLOW callback and auto-register failures.
    pub failures: Vec<AddonError>,
}

pub struct AddonEngine {
    directory: PathBuf,
    registry: Arc<RouteRegistry>,
    resolver: Arc<ArtifactResolver>,
    factories: Arc<ComponentFactories>,
    spaces: Arc<SpaceRegistry>,
    services: Arc<crate::service::ServiceLoaderRegistry>,
    processors: Arc<ProcessorRegistry>,
    records: RwLock<Vec<Arc<AddonRecord>>>,
    /// Topological order, as indexes into `records`.
    order: RwLock<Vec<usize>>,
    /// Dependency spaces deduplicated engine-wide by URI.
    dependency_spaces: DashMap<String, Arc<DependencySpace>>,
    submitted: Mutex<Vec<AddonManifest>>,
    running: AtomicBool,
}

impl AddonEngine {
    pub fn new(
        directory: impl Into<PathBuf>,
        registry: Arc<RouteRegistry>,
        resolver: Arc<ArtifactResolver>,
    ) -> Arc<Self> {
        Arc::new(AddonEngine {
            directory: directory.into(),
            registry,
            resolver,
            factories: Arc::new(ComponentFactories::new()),
            spaces: Arc::new(SpaceRegistry::new(Arc::new(HostSpace::new()))),
            services: Arc::new(crate::service::ServiceLoaderRegistry::new()),
            processors: Arc::new(ProcessorRegistry::new()),
            records: RwLock::new(Vec::new()),
            order: RwLock::new(Vec::new()),
            dependency_spaces: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Host factory registry: component name → constructor.
    pub fn factories(&self) -> &Arc<ComponentFactories> {
        &self.factories
    }

    /// The space registry, including the host base space.
    pub fn spaces(&self) -> &Arc<SpaceRegistry> {
        &self.spaces
    }

    pub fn services(&self) -> &Arc<crate::service::ServiceLoaderRegistry> {
        &self.services
    }

    pub fn processors(&self) -> &Arc<ProcessorRegistry> {
        &self.processors
    }

    /// Queue a manifest without an archive for the next start.
    pub fn submit_manifest(&self, manifest: AddonManifest) {
        self.submitted
            .lock()
            .expect("submitted list poisoned")
            .push(manifest);
    }

    pub fn addon_names(&self) -> Vec<String> {
        self.records
            .read()
            .expect("records poisoned")
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    pub fn addon_state(&self, name: &str) -> Option<LoaderState> {
        self.records
            .read()
            .expect("records poisoned")
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .map(|r| r.state())
    }

    pub fn record(&self, name: &str) -> Option<Arc<AddonRecord>> {
        self.records
            .read()
            .expect("records poisoned")
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    // ── Start ───────────────────────────────────────────────────────────

    pub async fn start(self: &Arc<Self>) -> Result<StartReport, AddonError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(StartReport::default());
        }
        match self.start_inner().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn start_inner(self: &Arc<Self>) -> Result<StartReport, AddonError> {
        let mut report = StartReport::default();

        self.discover(&mut report)?;
        self.resolve_dependencies(&mut report).await;
        self.compute_order()?;
        self.instantiate(&mut report);
        self.wire_services();
        self.run_phase(Phase::Load, &mut report).await;
        self.run_phase(Phase::Enable, &mut report).await;

        let records = self.records.read().expect("records poisoned");
        report.loaded = records.iter().map(|r| r.name().to_string()).collect();
        info!(addons = report.loaded.len(), "addon engine started");
        Ok(report)
    }

    /// Read the addon directory and the submitted manifests into records.
    fn discover(&self, report: &mut StartReport) -> Result<(), AddonError> {
        let mut records = Vec::new();
        let mut index = 0usize;

        for path in discover_archives(&self.directory) {
            match open_record(&path, index) {
                Ok(record) => {
                    records.push(Arc::new(record));
                    index += 1;
                }
                Err(e) => {
                    warn!(archive = %path.display(), "archive skipped: {e}");
                    report.skipped_archives.push(e);
                }
            }
        }

        for manifest in self.submitted.lock().expect("submitted list poisoned").drain(..) {
            records.push(Arc::new(AddonRecord::new(
                manifest,
                AddonArchive::empty(),
                index,
            )));
            index += 1;
        }

        // Two addons must not share a name, compared case-insensitively.
        for (i, record) in records.iter().enumerate() {
            if records[..i]
                .iter()
                .any(|other| other.name().eq_ignore_ascii_case(record.name()))
            {
                return Err(AddonError::NameConflict(record.name().to_string()));
            }
        }

        *self.records.write().expect("records poisoned") = records;
        Ok(())
    }

    /// Register declared repositories and pull every declared coordinate,
    /// wrapping resolved artifacts in dependency spaces and harvesting their
    /// service descriptors.
    async fn resolve_dependencies(&self, report: &mut StartReport) {
        let records: Vec<_> = self.records.read().expect("records poisoned").clone();
        for record in &records {
            for repo in &record.manifest().repositories {
                match Url::parse(repo) {
                    Ok(url) => {
                        let name = url.host_str().unwrap_or("repository").to_string();
                        self.resolver.add_repository(Repository::new(name, url));
                    }
                    Err(e) => warn!(addon = record.name(), repo, "invalid repository url: {e}"),
                }
            }

            let mut coordinates = Vec::new();
            for coord in &record.manifest().dependencies {
                match ArtifactCoordinate::parse(coord) {
                    Ok(parsed) => coordinates.push(parsed),
                    Err(e) => report.resolver_failures.push(e.to_string()),
                }
            }
            if coordinates.is_empty() {
                self.attach_scan(record, Vec::new());
                continue;
            }

            let resolution = self.resolver.resolve(&coordinates).await;
            for failure in &resolution.failures {
                report
                    .resolver_failures
                    .push(format!("{}: {failure}", record.name()));
            }
            let mut spaces = Vec::new();
            for artifact in &resolution.artifacts {
                let uri = artifact.uri.to_string();
                let space = self
                    .dependency_spaces
                    .entry(uri.clone())
                    .or_insert_with(|| {
                        Arc::new(DependencySpace::open(uri.clone(), &artifact.path))
                    })
                    .clone();
                spaces.push(space);
            }
            self.attach_scan(record, spaces);
        }
    }

    /// Scan the addon's own archive and its dependency bundles; attach the
    /// harvested descriptors and remember the dependency spaces on the
    /// record's code space inputs.
    fn attach_scan(&self, record: &Arc<AddonRecord>, dependencies: Vec<Arc<DependencySpace>>) {
        let own = scan(&record.archive);
        let mut services = own.services;
        for dep in &dependencies {
            if let Some(archive) = dep.archive() {
                services.extend(scan(archive).services);
            }
        }
        *record.services.write().expect("services lock poisoned") = services;
        *record
            .auto_register
            .write()
            .expect("descriptor lock poisoned") = own.descriptors;

        let space = CodeSpace::new(record.manifest.clone(), record.archive.clone(), dependencies);
        *record.space.write().expect("space lock poisoned") = Some(space);
    }

    fn compute_order(&self) -> Result<(), AddonError> {
        let records = self.records.read().expect("records poisoned");
        let nodes: Vec<GraphNode> = records
            .iter()
            .map(|r| GraphNode {
                name: r.name().to_string(),
                depends: r.manifest().depends.clone(),
                soft_depends: r.manifest().soft_depends.clone(),
                discovery_index: r.discovery_index,
            })
            .collect();
        let order = load_order(&nodes)?;
        *self.order.write().expect("order poisoned") = order;
        Ok(())
    }

    /// Build contexts and instances in topological order; register the code
    /// spaces with the space registry as we go.
    fn instantiate(&self, report: &mut StartReport) {
        let records: Vec<_> = self.records.read().expect("records poisoned").clone();
        let order: Vec<_> = self.order.read().expect("order poisoned").clone();
        for &idx in &order {
            let record = &records[idx];
            let space = record
                .space
                .read()
                .expect("space lock poisoned")
                .clone()
                .expect("space built during dependency resolution");
            self.spaces.register(space.clone());

            let context = Arc::new(AddonContext::new(
                record.manifest.clone(),
                self.registry.clone(),
                self.directory.join(record.name()),
            ));

            let instance: Arc<dyn Addon> = if record.manifest().main.trim().is_empty() {
                Arc::new(HollowAddon)
            } else {
                match self.construct_main(record, &space) {
                    Ok(instance) => instance,
                    Err(e) => {
                        // INVALID-MAIN is fatal for this addon, slow for the
                        // engine: the record stays DISCOVERED and is skipped.
                        warn!(addon = record.name(), "{e}");
                        report.failures.push(e);
                        continue;
                    }
                }
            };
            *record.instance.write().expect("instance lock poisoned") = Some(instance);
            *record.context.write().expect("context lock poisoned") = Some(context);
            record.set_state(LoaderState::Instantiated);
            debug!(addon = record.name(), "addon instantiated");
        }
    }

    fn construct_main(
        &self,
        record: &AddonRecord,
        space: &CodeSpace,
    ) -> Result<Arc<dyn Addon>, AddonError> {
        let main = record.manifest().main.trim();
        let resolved =
            self.spaces
                .resolve(space, main)
                .map_err(|e| AddonError::InvalidMain {
                    addon: record.name().to_string(),
                    main: main.to_string(),
                    reason: e.to_string(),
                })?;
        match self.factories.construct(&resolved.def.name) {
            Ok(Constructed::Addon(instance)) => Ok(instance),
            Ok(other) => Err(AddonError::InvalidMain {
                addon: record.name().to_string(),
                main: main.to_string(),
                reason: format!("constructed {other:?}, expected an addon"),
            }),
            Err(e) => Err(AddonError::InvalidMain {
                addon: record.name().to_string(),
                main: main.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Offer every harvested service provider to its loader, resolving the
    /// provider through the owning addon's space. Unknown interfaces and
    /// unresolvable providers are debug-level skips.
    fn wire_services(&self) {
        let records: Vec<_> = self.records.read().expect("records poisoned").clone();
        let order: Vec<_> = self.order.read().expect("order poisoned").clone();
        for &idx in &order {
            let record = &records[idx];
            if record.state() != LoaderState::Instantiated {
                continue;
            }
            let space = record
                .space
                .read()
                .expect("space lock poisoned")
                .clone()
                .expect("space built during dependency resolution");
            for descriptor in record.services() {
                let Some(loader) = self.services.get(&descriptor.interface) else {
                    continue;
                };
                for provider in descriptor.provider_names() {
                    match self.spaces.resolve(&space, provider) {
                        Ok(resolved) => loader.load(record.name(), resolved),
                        Err(e) => {
                            debug!(
                                addon = record.name(),
                                provider, "service provider skipped: {e}"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Run one lifecycle phase over every instantiated addon in topological
    /// order: the callback, then that phase's auto-register descriptors.
    async fn run_phase(&self, phase: Phase, report: &mut StartReport) {
        let records: Vec<_> = self.records.read().expect("records poisoned").clone();
        let order: Vec<_> = self.order.read().expect("order poisoned").clone();
        for &idx in &order {
            let record = &records[idx];
            let expected = match phase {
                Phase::Load => LoaderState::Instantiated,
                Phase::Enable => LoaderState::Loaded,
            };
            if record.state() != expected {
                continue;
            }
            let phase_name = match phase {
                Phase::Load => "load",
                Phase::Enable => "enable",
            };

            if let Err(e) = self.run_callback(record, phase_name).await {
                warn!(addon = record.name(), "{e}");
                report.failures.push(e);
            }
            for descriptor in record.auto_register() {
                if descriptor.phase != phase {
                    continue;
                }
                if let Err(e) = self.apply_descriptor(record, &descriptor) {
                    warn!(addon = record.name(), "{e}");
                    report.failures.push(e);
                }
            }

            record.set_state(match phase {
                Phase::Load => LoaderState::Loaded,
                Phase::Enable => LoaderState::Enabled,
            });
            debug!(addon = record.name(), phase = phase_name, "phase complete");
        }
    }

    /// Invoke one lifecycle callback on its own task so a panic is isolated
    /// to the addon (FAIL-SLOW).
    async fn run_callback(
        &self,
        record: &Arc<AddonRecord>,
        phase: &'static str,
    ) -> Result<(), AddonError> {
        let instance = record
            .instance
            .read()
            .expect("instance lock poisoned")
            .clone();
        let context = record
            .context
            .read()
            .expect("context lock poisoned")
            .clone();
        let (Some(instance), Some(context)) = (instance, context) else {
            return Ok(());
        };
        let outcome = tokio::spawn(async move {
            match phase {
                "load" => instance.on_load(&context).await,
                "enable" => instance.on_enable(&context).await,
                _ => instance.on_disable(&context).await,
            }
        })
        .await;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AddonError::Callback {
                addon: record.name().to_string(),
                phase,
                reason: e.to_string(),
            }),
            Err(join) => Err(AddonError::Callback {
                addon: record.name().to_string(),
                phase,
                reason: if join.is_panic() {
                    "callback panicked".to_string()
                } else {
                    join.to_string()
                },
            }),
        }
    }

    fn apply_descriptor(
        &self,
        record: &Arc<AddonRecord>,
        descriptor: &crate::autoregister::AutoRegisterDescriptor,
    ) -> Result<(), AddonError> {
        let Some(processor) = self.processors.get(&descriptor.kind) else {
            return Ok(());
        };
        let space = record
            .space
            .read()
            .expect("space lock poisoned")
            .clone()
            .expect("space built during dependency resolution");
        let context = record
            .context
            .read()
            .expect("context lock poisoned")
            .clone()
            .ok_or_else(|| AddonError::AutoRegister {
                addon: record.name().to_string(),
                reason: "addon has no context".to_string(),
            })?;
        let resolved = self.spaces.resolve(&space, &descriptor.target)?;
        let constructed = self.factories.construct(&resolved.def.name)?;
        processor.process(&context, constructed, &descriptor.data)
    }

    // ── Stop ────────────────────────────────────────────────────────────

    /// Disable every addon in reverse topological order, unregister what it
    /// contributed, and release its space. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let records: Vec<_> = self.records.read().expect("records poisoned").clone();
        let order: Vec<_> = self.order.read().expect("order poisoned").clone();
        for &idx in order.iter().rev() {
            let record = &records[idx];
            if matches!(record.state(), LoaderState::Discovered | LoaderState::Disabled) {
                continue;
            }
            if record.state() == LoaderState::Enabled {
                if let Err(e) = self.run_callback(record, "disable").await {
                    warn!(addon = record.name(), "{e}");
                }
            }
            if let Some(context) = record
                .context
                .read()
                .expect("context lock poisoned")
                .clone()
            {
                context.unwind();
            }
            self.spaces.remove(record.name());
            record.set_state(LoaderState::Disabled);
            info!(addon = record.name(), "addon disabled");
        }
    }
}

/// Archive files under the addon directory, in deterministic (name) order.
fn discover_archives(directory: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut archives: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file() && {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                name.ends_with(".addon") || name.ends_with(".tar.gz")
            }
        })
        .collect();
    archives.sort();
    archives
}

fn open_record(path: &Path, index: usize) -> Result<AddonRecord, AddonError> {
    let archive = AddonArchive::open(path)?;
    let manifest = AddonManifest::parse(&path.display().to_string(), archive.manifest_text()?)?;
    Ok(AddonRecord::new(manifest, archive, index))
}
