//! Component definitions and the host factory registry.
//!
//! An addon archive carries *definitions*: named components with a format
//! version and optional auto-register marker. The code behind a component is
//! statically linked and registered with the host as a factory keyed by the
//! component name; activation is entirely data-driven.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;

use hearth_core::handler::{Handler, ServerKind};
use hearth_core::requirement::Requirement;

use crate::addon::Addon;
use crate::AddonError;

/// Highest component format (major, minor) this host can load.
pub const SUPPORTED_FORMAT: FormatVersion = FormatVersion { major: 1, minor: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    /// Compatible when not newer than the supported format.
    pub fn is_supported(&self) -> bool {
        self.major < SUPPORTED_FORMAT.major
            || (self.major == SUPPORTED_FORMAT.major && self.minor <= SUPPORTED_FORMAT.minor)
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Lifecycle phase an auto-register descriptor is processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Load,
    #[default]
    Enable,
}

/// The auto-register marker carried by a component definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRegisterMarker {
    pub kind: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One `*.component.json` entry of an archive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    /// Dotted component name, e.g. `com.example.chat.ChatHandler`.
    pub name: String,
    pub format: FormatVersion,
    #[serde(default)]
    pub auto_register: Option<AutoRegisterMarker>,
}

/// What a component factory produces.
pub enum Constructed {
    Addon(Arc<dyn Addon>),
    Handler(Arc<dyn Handler>),
    Requirement {
        server_kind: ServerKind,
        requirement: Arc<dyn Requirement>,
    },
}

impl std::fmt::Debug for Constructed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constructed::Addon(_) => write!(f, "Constructed::Addon"),
            Constructed::Handler(_) => write!(f, "Constructed::Handler"),
            Constructed::Requirement { server_kind, .. } => {
                write!(f, "Constructed::Requirement({server_kind})")
            }
        }
    }
}

type Factory = Arc<dyn Fn() -> Constructed + Send + Sync>;

/// Host registry of component constructors, keyed by component name.
#[derive(Default)]
pub struct ComponentFactories {
    factories: DashMap<String, Factory>,
}

impl ComponentFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a component name. Last registration wins.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: impl Fn() -> Constructed + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct an instance of the named component.
    pub fn construct(&self, name: &str) -> Result<Constructed, AddonError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AddonError::ClassNotFound(name.to_string()))?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_support_is_major_then_minor() {
        assert!(FormatVersion { major: 0, minor: 9 }.is_supported());
        assert!(FormatVersion { major: 1, minor: 0 }.is_supported());
        assert!(!FormatVersion { major: 1, minor: 1 }.is_supported());
        assert!(!FormatVersion { major: 2, minor: 0 }.is_supported());
    }

    #[test]
    fn component_def_parses_marker_with_default_phase() {
        let def: ComponentDef = serde_json::from_str(
            r#"{
                "name": "com.example.Widget",
                "format": {"major": 1, "minor": 0},
                "autoRegister": {"kind": "handler"}
            }"#,
        )
        .unwrap();
        let marker = def.auto_register.unwrap();
        assert_eq!(marker.kind, "handler");
        assert_eq!(marker.phase, Phase::Enable);
    }

    #[test]
    fn phase_parses_uppercase_names() {
        let def: ComponentDef = serde_json::from_str(
            r#"{
                "name": "c",
                "format": {"major": 1, "minor": 0},
                "autoRegister": {"kind": "handler", "phase": "LOAD"}
            }"#,
        )
        .unwrap();
        assert_eq!(def.auto_register.unwrap().phase, Phase::Load);
    }
}
