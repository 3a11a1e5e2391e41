//! The Hearth addon subsystem: manifests, isolation spaces, archive
//! scanning, dependency ordering, and the `load → enable → disable`
//! lifecycle engine.

pub mod addon;
pub mod archive;
pub mod autoregister;
pub mod component;
pub mod engine;
pub mod graph;
pub mod manifest;
pub mod scanner;
pub mod service;
pub mod space;

pub use addon::{Addon, AddonContext, AddonLogger, AddonRecord, HollowAddon, LoaderState};
pub use archive::AddonArchive;
pub use autoregister::{AutoRegisterDescriptor, AutoRegisterProcessor, ProcessorRegistry};
pub use component::{
    AutoRegisterMarker, ComponentDef, ComponentFactories, Constructed, FormatVersion, Phase,
    SUPPORTED_FORMAT,
};
pub use engine::{AddonEngine, StartReport};
pub use manifest::AddonManifest;
pub use scanner::{scan, ScanResult, ServiceDescriptor};
pub use service::{ServiceLoader, ServiceLoaderRegistry};
pub use space::{
    CodeSpace, DependencySpace, HostSpace, Provenance, ResolvedComponent, SpaceRegistry,
    ENGINE_PREFIX,
};

use component::FormatVersion as Format;

/// Errors surfaced by the addon subsystem.
///
/// Graph and conflict errors are fatal to engine start; archive errors skip
/// the archive; lifecycle callback errors are FAIL-SLOW and recorded against
/// the originating addon.
#[derive(Debug)]
pub enum AddonError {
    /// The archive has no `addon.json` at its root.
    ManifestMissing(String),
    ManifestMalformed { source: String, reason: String },
    /// A component entry targets a newer format than this host supports.
    IncompatibleVersion {
        source: String,
        entry: String,
        found: Format,
    },
    /// Two addons share a name (case-insensitive).
    NameConflict(String),
    RequiredDependencyMissing { addon: String, dependency: String },
    SelfDependency(String),
    DependencyCycle(Vec<String>),
    /// `main` does not resolve or does not satisfy the addon contract.
    InvalidMain {
        addon: String,
        main: String,
        reason: String,
    },
    /// A component name resolved nowhere.
    ClassNotFound(String),
    /// The archive itself could not be read.
    Archive { source: String, reason: String },
    /// An auto-register descriptor could not be applied.
    AutoRegister { addon: String, reason: String },
    /// A lifecycle callback failed or panicked.
    Callback {
        addon: String,
        phase: &'static str,
        reason: String,
    },
    /// Error raised by addon code itself.
    Failed(String),
}

impl std::fmt::Display for AddonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddonError::ManifestMissing(source) => {
                write!(f, "{source}: no addon.json at the archive root")
            }
            AddonError::ManifestMalformed { source, reason } => {
                write!(f, "{source}: malformed manifest: {reason}")
            }
            AddonError::IncompatibleVersion {
                source,
                entry,
                found,
            } => write!(
                f,
                "{source}: component '{entry}' targets format {found}, host supports up to {}",
                SUPPORTED_FORMAT
            ),
            AddonError::NameConflict(name) => {
                write!(f, "two addons share the name '{name}'")
            }
            AddonError::RequiredDependencyMissing { addon, dependency } => {
                write!(f, "addon '{addon}' requires '{dependency}', which is not present")
            }
            AddonError::SelfDependency(name) => {
                write!(f, "addon '{name}' depends on itself")
            }
            AddonError::DependencyCycle(members) => {
                write!(f, "addon dependency cycle: {}", members.join(" -> "))
            }
            AddonError::InvalidMain {
                addon,
                main,
                reason,
            } => write!(f, "addon '{addon}': main '{main}' is invalid: {reason}"),
            AddonError::ClassNotFound(name) => write!(f, "component not found: {name}"),
            AddonError::Archive { source, reason } => {
                write!(f, "cannot read archive {source}: {reason}")
            }
            AddonError::AutoRegister { addon, reason } => {
                write!(f, "addon '{addon}': auto-register failed: {reason}")
            }
            AddonError::Callback {
                addon,
                phase,
                reason,
            } => write!(f, "addon '{addon}': {phase} callback failed: {reason}"),
            AddonError::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for AddonError {}
