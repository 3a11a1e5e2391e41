//! Archive scanning: service descriptors and auto-register harvest.

mod common;

use common::ArchiveBuilder;
use hearth_addons::{scan, AddonArchive, Phase};

#[test]
fn service_files_parse_comments_blanks_and_join_providers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svc.addon");
    ArchiveBuilder::new()
        .manifest(r#"{"name": "Svc"}"#)
        .file(
            "META-INF/services/com.example.Codec",
            "# header comment\ncom.example.JsonCodec\n\n  com.example.YamlCodec  // note\n// tail\n",
        )
        .file("META-INF/services/com.example.Empty", "# nothing here\n\n")
        .write(&path);

    let archive = AddonArchive::open(&path).unwrap();
    let result = scan(&archive);

    assert_eq!(result.services.len(), 1);
    let descriptor = &result.services[0];
    assert_eq!(descriptor.interface, "com.example.Codec");
    assert_eq!(
        descriptor.providers,
        "com.example.JsonCodec;com.example.YamlCodec"
    );
    assert_eq!(descriptor.provider_names().count(), 2);
}

#[test]
fn marked_components_become_descriptors_with_phases() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marked.addon");
    ArchiveBuilder::new()
        .manifest(r#"{"name": "Marked"}"#)
        .component(
            "com.example.Early",
            (1, 0),
            Some(serde_json::json!({"kind": "handler", "phase": "LOAD"})),
        )
        .component(
            "com.example.Late",
            (1, 0),
            Some(serde_json::json!({"kind": "requirement", "data": {"reprocess": true}})),
        )
        .component("com.example.Plain", (1, 0), None)
        .write(&path);

    let archive = AddonArchive::open(&path).unwrap();
    let result = scan(&archive);

    assert_eq!(result.descriptors.len(), 2);
    let early = result
        .descriptors
        .iter()
        .find(|d| d.target == "com.example.Early")
        .unwrap();
    assert_eq!(early.phase, Phase::Load);
    assert_eq!(early.kind, "handler");

    let late = result
        .descriptors
        .iter()
        .find(|d| d.target == "com.example.Late")
        .unwrap();
    assert_eq!(late.phase, Phase::Enable);
    assert_eq!(late.data["reprocess"], true);
}

#[test]
fn unreadable_component_entries_do_not_fail_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.addon");
    ArchiveBuilder::new()
        .manifest(r#"{"name": "Mixed"}"#)
        .file("broken.component.json", "{ not json")
        .component("com.example.Good", (1, 0), None)
        .write(&path);

    let archive = AddonArchive::open(&path).unwrap();
    assert!(archive.component("com.example.Good").is_some());
    assert_eq!(archive.components().count(), 1);
}
