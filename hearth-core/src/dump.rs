//! Error-dump files for uncaught failures.
//!
//! Anything that escapes the normal result paths (handler panics, listener
//! crashes) is captured here: the detail is written to
//! `<dir>/error_<id>.log` and the dump identifier is logged so operators can
//! correlate.

use std::path::PathBuf;

use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ErrorDump {
    dir: PathBuf,
}

impl ErrorDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ErrorDump { dir: dir.into() }
    }

    /// Write a dump file and log its identifier. Best-effort: failures to
    /// write fall back to logging the detail itself.
    pub fn capture(&self, context: &str, detail: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("error_{id}.log"));
        let body = format!("context: {context}\n\n{detail}\n");
        let written = std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, body))
            .is_ok();
        if written {
            error!(dump = %id, context, "uncaught failure captured to {}", path.display());
        } else {
            error!(dump = %id, context, detail, "uncaught failure (dump file could not be written)");
        }
        id
    }
}
