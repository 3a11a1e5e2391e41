//! The auto-register scanner: harvests service descriptors and marked
//! components from an opened archive.

use tracing::trace;

use crate::archive::AddonArchive;
use crate::autoregister::AutoRegisterDescriptor;

/// One `META-INF/services/<iface>` file, providers joined by `;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub interface: String,
    pub providers: String,
}

impl ServiceDescriptor {
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.split(';').filter(|p| !p.is_empty())
    }
}

/// Output of one archive scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub services: Vec<ServiceDescriptor>,
    pub descriptors: Vec<AutoRegisterDescriptor>,
}

/// Walk every entry of the archive: service files become
/// [`ServiceDescriptor`]s, components carrying the auto-register marker
/// become [`AutoRegisterDescriptor`]s. Entries that refused to parse were
/// already dropped at archive open; a scan never fails.
pub fn scan(archive: &AddonArchive) -> ScanResult {
    let mut result = ScanResult::default();

    for (interface, content) in archive.services() {
        let providers: Vec<&str> = content
            .lines()
            .map(strip_comment)
            .filter(|line| !line.is_empty())
            .collect();
        if providers.is_empty() {
            continue;
        }
        result.services.push(ServiceDescriptor {
            interface: interface.to_string(),
            providers: providers.join(";"),
        });
    }

    for def in archive.components() {
        let Some(marker) = &def.auto_register else {
            continue;
        };
        trace!(component = def.name, kind = marker.kind, "auto-register descriptor harvested");
        result.descriptors.push(AutoRegisterDescriptor {
            kind: marker.kind.clone(),
            target: def.name.clone(),
            phase: marker.phase,
            data: marker.data.clone(),
        });
    }

    result
}

/// Trim a service-file line, dropping `#` and `//` comments.
fn strip_comment(line: &str) -> &str {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let line = match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    };
    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_stripping_handles_both_styles() {
        assert_eq!(strip_comment("com.example.Impl # trailing"), "com.example.Impl");
        assert_eq!(strip_comment("com.example.Impl // trailing"), "com.example.Impl");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("// whole line"), "");
        assert_eq!(strip_comment("   "), "");
        assert_eq!(strip_comment("  plain  "), "plain");
    }
}
