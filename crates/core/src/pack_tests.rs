// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn parse_without_revision() {
    let pack: PackRef = "acme/foo".parse().unwrap();
    assert_eq!(pack.publisher, "acme");
    assert_eq!(pack.package, "foo");
    assert_eq!(pack.revision, None);
}

#[test]
fn parse_with_revision() {
    let pack: PackRef = "acme/foo@3".parse().unwrap();
    assert_eq!(pack.revision, Some(3));
    assert_eq!(pack.to_string(), "acme/foo@3");
}

#[yare::parameterized(
    missing_slash   = { "acmefoo" },
    empty_publisher = { "/foo" },
    empty_package   = { "acme/" },
    bad_revision    = { "acme/foo@latest" },
    dashed_publisher = { "ac-me/foo" },
)]
fn parse_rejects(input: &str) {
    assert!(input.parse::<PackRef>().is_err());
}

#[test]
fn package_may_contain_dashes() {
    let pack: PackRef = "acme/foo-tools@1".parse().unwrap();
    assert_eq!(pack.package, "foo-tools");
}

#[test]
fn tuple_ignores_revision() {
    let a: PackRef = "acme/foo@1".parse().unwrap();
    let b: PackRef = "acme/foo@2".parse().unwrap();
    assert_eq!(a.tuple(), b.tuple());
}

#[test]
fn file_stem_requires_revision() {
    let pack: PackRef = "acme/foo".parse().unwrap();
    assert_eq!(pack.file_stem(), None);
    assert_eq!(
        pack.with_revision(2).file_stem().as_deref(),
        Some("acme-foo-2")
    );
}

#[test]
fn file_stem_round_trips_with_dashed_package() {
    let pack: PackRef = "acme/foo-tools@7".parse().unwrap();
    let stem = pack.file_stem().unwrap();
    assert_eq!(PackRef::from_file_stem(&stem), Some(pack));
}

#[test]
fn serde_uses_string_form() {
    let pack: PackRef = "acme/foo@3".parse().unwrap();
    let json = serde_json::to_string(&pack).unwrap();
    assert_eq!(json, "\"acme/foo@3\"");
    let back: PackRef = serde_json::from_str(&json).unwrap();
    assert_eq!(back, pack);
}
