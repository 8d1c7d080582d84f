// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

fn write_manifest(dir: &Path, json: &str) {
    std::fs::write(dir.join(MANIFEST_FILE), json).unwrap();
}

#[test]
fn load_full_manifest() {
    let dir = tempdir().unwrap();
    write_manifest(
        dir.path(),
        r#"{
            "pack": "acme/foo@3",
            "platform": "linux/amd64",
            "commands": [{"name": "foo", "path": "bin/foo"}],
            "services": [{"name": "food", "exec": "bin/food --serve"}],
            "dependencies": ["acme/bar"]
        }"#,
    );

    let manifest = PackManifest::load(dir.path()).unwrap();
    assert_eq!(manifest.pack.to_string(), "acme/foo@3");
    assert_eq!(manifest.commands.len(), 1);
    assert_eq!(manifest.services[0].name, "food");
    assert_eq!(manifest.dependencies[0].to_string(), "acme/bar");
}

#[test]
fn optional_sections_default_empty() {
    let dir = tempdir().unwrap();
    write_manifest(
        dir.path(),
        r#"{"pack": "acme/lean@1", "platform": "linux/amd64"}"#,
    );

    let manifest = PackManifest::load(dir.path()).unwrap();
    assert!(manifest.commands.is_empty());
    assert!(manifest.services.is_empty());
    assert!(manifest.dependencies.is_empty());
}

#[test]
fn missing_manifest_is_distinct_from_parse_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        PackManifest::load(dir.path()),
        Err(ManifestError::NotFound(_))
    ));

    write_manifest(dir.path(), "not json");
    assert!(matches!(
        PackManifest::load(dir.path()),
        Err(ManifestError::Json(_))
    ));
}
