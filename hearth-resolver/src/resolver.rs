//! Transitive artifact resolution against the repository working set.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use bytes::Bytes;
use futures_util::future::join_all;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};
use url::Url;

use crate::cache::ArtifactCache;
use crate::coordinate::ArtifactCoordinate;
use crate::metadata::ArtifactMetadata;
use crate::repository::Repository;
use crate::ResolverError;

/// One artifact materialised into the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: ArtifactCoordinate,
    /// Local cache file.
    pub path: PathBuf,
    /// Remote origin the bytes came from (or the cached file itself when the
    /// download was skipped).
    pub uri: Url,
}

/// Outcome of a `resolve` call: per-coordinate failures do not abort the
/// others, so successes and errors travel together.
#[derive(Debug, Default)]
pub struct Resolution {
    pub artifacts: Vec<ResolvedArtifact>,
    pub failures: Vec<ResolverError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ArtifactResolver {
    repositories: RwLock<Vec<Repository>>,
    cache: ArtifactCache,
    client: reqwest::Client,
}

impl ArtifactResolver {
    /// A resolver over the default repositories with a cache at `root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        ArtifactResolver {
            repositories: RwLock::new(Repository::default_set()),
            cache: ArtifactCache::new(cache_root),
            client: reqwest::Client::new(),
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Add a repository to the working set; idempotent on URL.
    pub fn add_repository(&self, repository: Repository) {
        let mut repos = self.repositories.write().expect("repository set poisoned");
        if repos.iter().any(|r| r.url() == repository.url()) {
            return;
        }
        debug!(name = repository.name(), url = %repository.url(), "repository added");
        repos.push(repository);
    }

    /// Drop every non-default repository from the working set.
    pub fn cleanup(&self) {
        self.repositories
            .write()
            .expect("repository set poisoned")
            .retain(Repository::is_default);
    }

    pub fn repositories(&self) -> Vec<Repository> {
        self.repositories
            .read()
            .expect("repository set poisoned")
            .clone()
    }

    /// Resolve every coordinate transitively. Coordinates resolve
    /// independently (and concurrently); the union of their artifacts is
    /// deduplicated by URI.
    pub async fn resolve(&self, coordinates: &[ArtifactCoordinate]) -> Resolution {
        let results = join_all(
            coordinates
                .iter()
                .map(|coordinate| self.resolve_one(coordinate.clone())),
        )
        .await;

        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();
        for result in results {
            match result {
                Ok(artifacts) => {
                    for artifact in artifacts {
                        if seen.insert(artifact.uri.clone()) {
                            resolution.artifacts.push(artifact);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "coordinate failed to resolve");
                    resolution.failures.push(e);
                }
            }
        }
        resolution
    }

    /// Resolve one coordinate and its transitive dependency closure.
    async fn resolve_one(
        &self,
        root: ArtifactCoordinate,
    ) -> Result<Vec<ResolvedArtifact>, ResolverError> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = vec![root];
        while let Some(coordinate) = queue.pop() {
            if !visited.insert(coordinate.base_key()) {
                continue;
            }
            let (artifact, metadata) = self.materialise(&coordinate).await?;
            out.push(artifact);
            for dependency in metadata.dependencies() {
                queue.push(dependency.clone());
            }
        }
        Ok(out)
    }

    /// Fetch one coordinate's metadata and main artifact into the cache.
    async fn materialise(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<(ResolvedArtifact, ArtifactMetadata), ResolverError> {
        let repositories = self.repositories();
        let mut last_reason = "no repositories in the working set".to_string();
        for repository in &repositories {
            let pom_url = match repository.file_url(coordinate, &coordinate.pom_name()) {
                Ok(url) => url,
                Err(e) => {
                    last_reason = e.to_string();
                    continue;
                }
            };
            let pom = match self.fetch(&pom_url).await {
                Ok(bytes) => bytes,
                Err(reason) => {
                    last_reason = reason;
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&pom);
            let metadata = ArtifactMetadata::parse(coordinate, &text)?;
            let file = coordinate.file_name(metadata.extension());

            if let Some(path) = self.cache.lookup(coordinate, &file).await {
                debug!(coordinate = %coordinate, "artifact served from cache");
                let uri = Url::from_file_path(&path)
                    .unwrap_or_else(|_| repository.url().clone());
                return Ok((
                    ResolvedArtifact {
                        coordinate: coordinate.clone(),
                        path,
                        uri,
                    },
                    metadata,
                ));
            }

            let file_url = repository
                .file_url(coordinate, &file)
                .map_err(|e| ResolverError::Unresolved {
                    coordinate: coordinate.to_string(),
                    reason: e.to_string(),
                })?;
            let bytes = self.fetch(&file_url).await.map_err(|reason| {
                ResolverError::Unresolved {
                    coordinate: coordinate.to_string(),
                    reason,
                }
            })?;
            self.verify_checksum(coordinate, &file_url, &bytes).await?;
            let path = self
                .cache
                .store(coordinate, &file, &bytes)
                .await
                .map_err(|e| ResolverError::Unresolved {
                    coordinate: coordinate.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok((
                ResolvedArtifact {
                    coordinate: coordinate.clone(),
                    path,
                    uri: file_url,
                },
                metadata,
            ));
        }
        Err(ResolverError::Unresolved {
            coordinate: coordinate.to_string(),
            reason: last_reason,
        })
    }

    /// Checksum policy FAIL: a mismatch aborts this coordinate. A repository
    /// without checksum sidecars skips verification.
    async fn verify_checksum(
        &self,
        coordinate: &ArtifactCoordinate,
        file_url: &Url,
        bytes: &Bytes,
    ) -> Result<(), ResolverError> {
        let checksum_url = match Url::parse(&format!("{}.sha1", file_url)) {
            Ok(url) => url,
            Err(_) => return Ok(()),
        };
        let remote = match self.fetch(&checksum_url).await {
            Ok(body) => body,
            Err(_) => {
                debug!(coordinate = %coordinate, "no checksum sidecar, skipping verification");
                return Ok(());
            }
        };
        let expected = String::from_utf8_lossy(&remote)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let actual = hex::encode(Sha1::digest(bytes));
        if expected != actual {
            return Err(ResolverError::Mismatch {
                coordinate: coordinate.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Fetch a URL: HTTP(S) through the client, `file://` from disk.
    async fn fetch(&self, url: &Url) -> Result<Bytes, String> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| format!("not a file path: {url}"))?;
                tokio::fs::read(&path)
                    .await
                    .map(Bytes::from)
                    .map_err(|e| format!("{}: {e}", path.display()))
            }
            "http" | "https" => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;
                if !response.status().is_success() {
                    return Err(format!("{url}: status {}", response.status()));
                }
                response.bytes().await.map_err(|e| e.to_string())
            }
            other => Err(format!("unsupported scheme '{other}'")),
        }
    }
}
