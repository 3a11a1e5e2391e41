//! Isolation-space resolution and the cross-addon diagnostic.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::ArchiveBuilder;
use hearth_addons::{
    AddonArchive, AddonError, AddonManifest, CodeSpace, DependencySpace, HostSpace, Provenance,
    SpaceRegistry,
};

fn archive(dir: &Path, file: &str, manifest: &serde_json::Value, components: &[&str]) -> AddonArchive {
    let mut builder = ArchiveBuilder::new().manifest(&manifest.to_string());
    for component in components {
        builder = builder.component(component, (1, 0), None);
    }
    let path = dir.join(file);
    builder.write(&path);
    AddonArchive::open(&path).unwrap()
}

fn space_for(
    dir: &Path,
    name: &str,
    depends: &[&str],
    components: &[&str],
) -> (Arc<CodeSpace>, AddonManifest) {
    let manifest_json = serde_json::json!({"name": name, "depends": depends});
    let archive = archive(dir, &format!("{name}.addon"), &manifest_json, components);
    let manifest = AddonManifest::parse("test", &manifest_json.to_string()).unwrap();
    let space = CodeSpace::new(Arc::new(manifest.clone()), Arc::new(archive), Vec::new());
    (space, manifest)
}

#[test]
fn own_archive_resolves_before_anything_else() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    let (space, _) = space_for(dir.path(), "Self", &[], &["com.a.Thing"]);
    registry.register(space.clone());

    let resolved = registry.resolve(&space, "com.a.Thing").unwrap();
    assert_eq!(resolved.provenance, Provenance::Own);
}

#[test]
fn host_space_takes_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(HostSpace::new());
    host.publish("com.a.Thing");
    let registry = SpaceRegistry::new(host);
    let (space, _) = space_for(dir.path(), "Self", &[], &["com.a.Thing"]);
    registry.register(space.clone());

    let resolved = registry.resolve(&space, "com.a.Thing").unwrap();
    assert_eq!(resolved.provenance, Provenance::Host);
}

#[test]
fn cross_space_resolution_warns_once_per_pair() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    let (provider, _) = space_for(dir.path(), "Provider", &[], &["com.p.One", "com.p.Two"]);
    let (consumer, _) = space_for(dir.path(), "Consumer", &[], &[]);
    registry.register(provider);
    registry.register(consumer.clone());

    let resolved = registry.resolve(&consumer, "com.p.One").unwrap();
    assert_eq!(resolved.provenance, Provenance::Addon("Provider".into()));
    assert_eq!(registry.undeclared_uses().len(), 1);

    // Repeated use, and even another class from the same provider, stays a
    // single diagnostic for the (consumer, provider) pair.
    registry.resolve(&consumer, "com.p.One").unwrap();
    registry.resolve(&consumer, "com.p.Two").unwrap();
    assert_eq!(registry.undeclared_uses().len(), 1);
}

#[test]
fn declared_dependency_suppresses_the_warning() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    let (provider, _) = space_for(dir.path(), "Base", &[], &["com.base.Api"]);
    let (consumer, _) = space_for(dir.path(), "App", &["Base"], &[]);
    registry.register(provider);
    registry.register(consumer.clone());

    registry.resolve(&consumer, "com.base.Api").unwrap();
    assert!(registry.undeclared_uses().is_empty());
}

#[test]
fn engine_prefix_is_hidden_from_space_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    // Even an archive that ships such an entry cannot resolve it.
    let (space, _) = space_for(dir.path(), "Sneaky", &[], &["hearth.internal.Secret"]);
    registry.register(space.clone());

    let err = registry.resolve(&space, "hearth.internal.Secret").unwrap_err();
    assert!(matches!(err, AddonError::ClassNotFound(_)));
}

#[test]
fn host_publishes_engine_components_through_the_parent() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(HostSpace::new());
    host.publish("hearth.runtime.Base");
    let registry = SpaceRegistry::new(host);
    let (space, _) = space_for(dir.path(), "User", &[], &[]);
    registry.register(space.clone());

    let resolved = registry.resolve(&space, "hearth.runtime.Base").unwrap();
    assert_eq!(resolved.provenance, Provenance::Host);
}

#[test]
fn removed_spaces_stop_resolving() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    let (provider, _) = space_for(dir.path(), "Gone", &[], &["com.g.Thing"]);
    let (consumer, _) = space_for(dir.path(), "Stays", &[], &[]);
    registry.register(provider);
    registry.register(consumer.clone());

    assert!(registry.resolve(&consumer, "com.g.Thing").is_ok());
    registry.remove("gone");
    assert!(registry.resolve(&consumer, "com.g.Thing").is_err());
}

#[test]
fn dependency_spaces_deduplicate_by_uri() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_json = serde_json::json!({"name": "Lib"});
    let bundle = dir.path().join("bundle.tar.gz");
    ArchiveBuilder::new()
        .manifest(&manifest_json.to_string())
        .component("com.lib.Util", (1, 0), None)
        .write(&bundle);

    let dep_a = Arc::new(DependencySpace::open("file:///bundle", &bundle));
    let dep_b = Arc::new(DependencySpace::open("file:///bundle", &bundle));
    let manifest = AddonManifest::parse("test", &serde_json::json!({"name": "App"}).to_string()).unwrap();
    let space = CodeSpace::new(
        Arc::new(manifest),
        Arc::new(AddonArchive::empty()),
        vec![dep_a, dep_b],
    );
    assert_eq!(space.dependencies().len(), 1);

    let registry = SpaceRegistry::new(Arc::new(HostSpace::new()));
    registry.register(space.clone());
    let resolved = registry.resolve(&space, "com.lib.Util").unwrap();
    assert_eq!(
        resolved.provenance,
        Provenance::Dependency("file:///bundle".into())
    );
}
