//! The shared on-disk artifact cache.
//!
//! Layout mirrors the repository layout under the cache root
//! (`<group path>/<artifact>/<version>/<file>`). The cache is shared across
//! addons; writers hold an exclusive per-artifact lock, readers a shared one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::coordinate::ArtifactCoordinate;

pub struct ArtifactCache {
    root: PathBuf,
    locks: DashMap<PathBuf, Arc<RwLock<()>>>,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactCache {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache path of a coordinate's file.
    pub fn path_of(&self, coordinate: &ArtifactCoordinate, file: &str) -> PathBuf {
        self.root.join(coordinate.repo_dir()).join(file)
    }

    fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Return the cached file if present, taking the shared lock for the
    /// existence check.
    pub async fn lookup(&self, coordinate: &ArtifactCoordinate, file: &str) -> Option<PathBuf> {
        let path = self.path_of(coordinate, file);
        let lock = self.lock_for(&path);
        let _shared = lock.read().await;
        path.is_file().then_some(path)
    }

    /// Store bytes for a coordinate's file under the exclusive lock. Another
    /// writer may have won the race; the existing file is kept in that case.
    pub async fn store(
        &self,
        coordinate: &ArtifactCoordinate,
        file: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.path_of(coordinate, file);
        let lock = self.lock_for(&path);
        let _exclusive = lock.write().await;
        if path.is_file() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("part");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(file = %path.display(), "artifact cached");
        Ok(path)
    }
}
