//! Test fixtures: builds addon archives (gzipped tarballs) on disk.

use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

pub struct ArchiveBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder { files: Vec::new() }
    }

    pub fn manifest(self, json: &str) -> Self {
        self.file("addon.json", json)
    }

    /// Add a component definition entry.
    pub fn component(
        self,
        name: &str,
        format: (u32, u32),
        marker: Option<serde_json::Value>,
    ) -> Self {
        let mut def = serde_json::json!({
            "name": name,
            "format": {"major": format.0, "minor": format.1},
        });
        if let Some(marker) = marker {
            def["autoRegister"] = marker;
        }
        let path = format!("{name}.component.json");
        self.file(&path, &def.to_string())
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.as_bytes().to_vec()));
        self
    }

    pub fn write(self, path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut tar = tar::Builder::new(encoder);
        for (name, content) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, name, content.as_slice()).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap();
    }
}
