//! Resolution against a `file://` fixture repository.

use std::path::Path;

use sha1::{Digest, Sha1};
use url::Url;

use hearth_resolver::{ArtifactCoordinate, ArtifactResolver, Repository, ResolverError};

/// Write one artifact (pom + payload + optional checksum) into the fixture
/// repository.
fn publish(
    repo: &Path,
    coordinate: &str,
    dependencies: &[&str],
    payload: &[u8],
    checksum: Option<&str>,
) {
    let coord = ArtifactCoordinate::parse(coordinate).unwrap();
    let dir = repo.join(coord.repo_dir());
    std::fs::create_dir_all(&dir).unwrap();

    let deps_xml: String = dependencies
        .iter()
        .map(|dep| {
            let d = ArtifactCoordinate::parse(dep).unwrap();
            format!(
                "<dependency><groupId>{}</groupId><artifactId>{}</artifactId>\
                 <version>{}</version></dependency>",
                d.group, d.artifact, d.version
            )
        })
        .collect();
    let pom = format!(
        "<project><packaging>tar.gz</packaging><dependencies>{deps_xml}</dependencies></project>"
    );
    std::fs::write(dir.join(coord.pom_name()), pom).unwrap();

    let file = coord.file_name("tar.gz");
    std::fs::write(dir.join(&file), payload).unwrap();
    let sha = match checksum {
        Some(forced) => forced.to_string(),
        None => hex::encode(Sha1::digest(payload)),
    };
    std::fs::write(dir.join(format!("{file}.sha1")), sha).unwrap();
}

fn fixture_resolver(repo: &Path, cache: &Path) -> ArtifactResolver {
    let resolver = ArtifactResolver::new(cache);
    let url = Url::from_directory_path(repo).unwrap();
    resolver.add_repository(Repository::new("fixture", url));
    resolver
}

#[tokio::test]
async fn resolves_transitive_closure() {
    let repo = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish(repo.path(), "org.example:app:1.0", &["org.example:base:1.0"], b"app", None);
    publish(repo.path(), "org.example:base:1.0", &[], b"base", None);

    let resolver = fixture_resolver(repo.path(), cache.path());
    let resolution = resolver
        .resolve(&[ArtifactCoordinate::parse("org.example:app:1.0").unwrap()])
        .await;

    assert!(resolution.is_complete());
    let names: Vec<_> = resolution
        .artifacts
        .iter()
        .map(|a| a.coordinate.artifact.clone())
        .collect();
    assert!(names.contains(&"app".to_string()));
    assert!(names.contains(&"base".to_string()));
    for artifact in &resolution.artifacts {
        assert!(artifact.path.is_file());
        assert!(artifact.path.starts_with(cache.path()));
    }
}

#[tokio::test]
async fn checksum_mismatch_fails_the_coordinate_only() {
    let repo = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish(repo.path(), "org.example:good:1.0", &[], b"good", None);
    publish(
        repo.path(),
        "org.example:bad:1.0",
        &[],
        b"bad",
        Some("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"),
    );

    let resolver = fixture_resolver(repo.path(), cache.path());
    let resolution = resolver
        .resolve(&[
            ArtifactCoordinate::parse("org.example:good:1.0").unwrap(),
            ArtifactCoordinate::parse("org.example:bad:1.0").unwrap(),
        ])
        .await;

    assert_eq!(resolution.artifacts.len(), 1);
    assert_eq!(resolution.artifacts[0].coordinate.artifact, "good");
    assert_eq!(resolution.failures.len(), 1);
    assert!(matches!(
        resolution.failures[0],
        ResolverError::Mismatch { .. }
    ));
}

#[tokio::test]
async fn missing_artifact_is_unresolved() {
    let repo = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let resolver = fixture_resolver(repo.path(), cache.path());

    let resolution = resolver
        .resolve(&[ArtifactCoordinate::parse("org.example:absent:1.0").unwrap()])
        .await;
    assert!(resolution.artifacts.is_empty());
    assert!(matches!(
        resolution.failures[0],
        ResolverError::Unresolved { .. }
    ));
}

#[tokio::test]
async fn union_is_deduplicated_by_uri() {
    let repo = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish(repo.path(), "org.example:shared:1.0", &[], b"shared", None);
    publish(repo.path(), "org.example:a:1.0", &["org.example:shared:1.0"], b"a", None);
    publish(repo.path(), "org.example:b:1.0", &["org.example:shared:1.0"], b"b", None);

    let resolver = fixture_resolver(repo.path(), cache.path());
    let resolution = resolver
        .resolve(&[
            ArtifactCoordinate::parse("org.example:a:1.0").unwrap(),
            ArtifactCoordinate::parse("org.example:b:1.0").unwrap(),
        ])
        .await;

    assert!(resolution.is_complete());
    let shared_count = resolution
        .artifacts
        .iter()
        .filter(|a| a.coordinate.artifact == "shared")
        .count();
    assert_eq!(shared_count, 1);
    assert_eq!(resolution.artifacts.len(), 3);
}

#[tokio::test]
async fn second_resolution_serves_from_cache() {
    let repo = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish(repo.path(), "org.example:once:1.0", &[], b"payload", None);

    let resolver = fixture_resolver(repo.path(), cache.path());
    let coordinate = ArtifactCoordinate::parse("org.example:once:1.0").unwrap();
    let first = resolver.resolve(std::slice::from_ref(&coordinate)).await;
    assert!(first.is_complete());

    // Remove the artifact from the fixture repo; only the cache can satisfy
    // the second pass. The pom must survive, metadata is re-read each time.
    let coord_dir = repo.path().join(coordinate.repo_dir());
    std::fs::remove_file(coord_dir.join(coordinate.file_name("tar.gz"))).unwrap();

    let second = resolver.resolve(&[coordinate]).await;
    assert!(second.is_complete());
    assert_eq!(second.artifacts.len(), 1);
}

#[test]
fn add_repository_is_idempotent_and_cleanup_keeps_defaults() {
    let cache = tempfile::tempdir().unwrap();
    let resolver = ArtifactResolver::new(cache.path());
    let defaults = resolver.repositories().len();

    let url = Url::parse("https://repo.example/m2").unwrap();
    resolver.add_repository(Repository::new("extra", url.clone()));
    resolver.add_repository(Repository::new("extra-again", url));
    assert_eq!(resolver.repositories().len(), defaults + 1);

    resolver.cleanup();
    assert_eq!(resolver.repositories().len(), defaults);
    assert!(resolver.repositories().iter().all(|r| r.is_default()));
}
