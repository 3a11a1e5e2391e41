//! Addon archives: gzipped tar bundles carrying the manifest, component
//! definitions, and service descriptor files.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::warn;

use crate::component::ComponentDef;
use crate::AddonError;

/// Path of the manifest inside an archive.
pub const MANIFEST_ENTRY: &str = "addon.json";

/// Prefix of service descriptor entries.
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// An opened archive with its entries indexed in memory. Archives are read
/// once; every later scan works off this index.
#[derive(Debug)]
pub struct AddonArchive {
    path: PathBuf,
    manifest_text: Option<String>,
    components: BTreeMap<String, ComponentDef>,
    /// Service descriptor files: interface name → raw file content.
    services: BTreeMap<String, String>,
}

impl AddonArchive {
    /// Open and index a gzipped tar archive.
    ///
    /// Component entries that fail to parse are skipped (a bad entry must not
    /// take down unrelated ones); entries targeting a newer component format
    /// than this host supports reject the whole archive.
    pub fn open(path: &Path) -> Result<Self, AddonError> {
        let file = std::fs::File::open(path).map_err(|e| AddonError::Archive {
            source: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));

        let mut manifest_text = None;
        let mut components = BTreeMap::new();
        let mut services = BTreeMap::new();

        let entries = tar.entries().map_err(|e| AddonError::Archive {
            source: path.display().to_string(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let mut entry = entry.map_err(|e| AddonError::Archive {
                source: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let Ok(entry_path) = entry.path().map(|p| p.to_string_lossy().to_string()) else {
                continue;
            };
            let name = entry_path.trim_start_matches("./").to_string();

            if name == MANIFEST_ENTRY {
                manifest_text = Some(read_text(&mut entry)?);
            } else if let Some(interface) = name.strip_prefix(SERVICES_PREFIX) {
                if !interface.is_empty() {
                    services.insert(interface.to_string(), read_text(&mut entry)?);
                }
            } else if name.ends_with(".component.json") {
                let text = read_text(&mut entry)?;
                let def: ComponentDef = match serde_json::from_str(&text) {
                    Ok(def) => def,
                    Err(e) => {
                        warn!(entry = name, "skipping unreadable component entry: {e}");
                        continue;
                    }
                };
                if !def.format.is_supported() {
                    return Err(AddonError::IncompatibleVersion {
                        source: path.display().to_string(),
                        entry: def.name,
                        found: def.format,
                    });
                }
                components.insert(def.name.clone(), def);
            }
        }

        Ok(AddonArchive {
            path: path.to_path_buf(),
            manifest_text,
            components,
            services,
        })
    }

    /// An empty archive standing in for a directly submitted manifest.
    pub fn empty() -> Self {
        AddonArchive {
            path: PathBuf::new(),
            manifest_text: None,
            components: BTreeMap::new(),
            services: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw manifest text; MANIFEST-MISSING when the archive has none.
    pub fn manifest_text(&self) -> Result<&str, AddonError> {
        self.manifest_text
            .as_deref()
            .ok_or_else(|| AddonError::ManifestMissing(self.path.display().to_string()))
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDef> {
        self.components.get(name)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentDef> {
        self.components.values()
    }

    /// Service descriptor files as (interface, raw content).
    pub fn services(&self) -> impl Iterator<Item = (&str, &str)> {
        self.services.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn read_text(entry: &mut tar::Entry<'_, GzDecoder<std::fs::File>>) -> Result<String, AddonError> {
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| AddonError::Archive {
            source: "archive entry".to_string(),
            reason: e.to_string(),
        })?;
    Ok(text)
}
