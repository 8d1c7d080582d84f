//! Whole-lifecycle journeys: install, update, rollback, uninstall.

use crate::prelude::*;
use chef_core::{CommandSpec, PackManifest, PackRef, ServiceSpec, StateTag, TxnKind};

fn manifest(rev: u32) -> PackManifest {
    PackManifest {
        pack: format!("acme/editor@{rev}").parse().unwrap(),
        platform: "linux/amd64".to_string(),
        commands: vec![CommandSpec {
            name: "edit".to_string(),
            path: "bin/edit".to_string(),
        }],
        services: vec![ServiceSpec {
            name: "editd".to_string(),
            exec: "bin/editd".to_string(),
        }],
        dependencies: Vec::new(),
    }
}

#[tokio::test]
async fn install_update_uninstall_journey() {
    let mut spec = spec();
    spec.mounter.set_manifest("acme-editor-1", manifest(1));
    spec.mounter.set_manifest("acme-editor-2", manifest(2));
    let pack: PackRef = "acme/editor".parse().unwrap();

    // Install revision 1
    let install = spec
        .sched
        .submit_direct(TxnKind::Install, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(install).unwrap().state,
        StateTag::Completed
    );
    assert_eq!(spec.layout.installed_revision(&pack).unwrap(), Some(1));
    assert!(spec.layout.wrapper_file("edit").exists());
    assert_eq!(
        spec.backend.running().await.unwrap(),
        vec!["acme/editor/editd"]
    );

    // Update to revision 2
    spec.store.set_revision("acme/editor", 2);
    let update = spec
        .sched
        .submit_direct(TxnKind::Update, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(update).unwrap().state,
        StateTag::Completed
    );
    assert_eq!(spec.layout.installed_revision(&pack).unwrap(), Some(2));
    // Old revision is gone, new one is mounted, service restarted
    assert_eq!(spec.layout.installed_packs().unwrap().len(), 1);
    assert!(spec.mounter.is_mounted(&spec.layout.mountpoint(&pack)));
    assert_eq!(
        spec.backend.running().await.unwrap(),
        vec!["acme/editor/editd"]
    );

    // Uninstall
    let uninstall = spec
        .sched
        .submit_direct(TxnKind::Uninstall, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(uninstall).unwrap().state,
        StateTag::Completed
    );
    assert!(spec.layout.installed_packs().unwrap().is_empty());
    assert!(!spec.layout.wrapper_file("edit").exists());
    assert!(spec.backend.running().await.unwrap().is_empty());
    assert!(!spec.mounter.is_mounted(&spec.layout.mountpoint(&pack)));
}

#[tokio::test]
async fn rollback_restores_the_pinned_revision() {
    let mut spec = spec();
    let pack: PackRef = "acme/editor".parse().unwrap();

    // Install revision 2 directly
    spec.store.set_revision("acme/editor", 2);
    let install = spec
        .sched
        .submit_direct(TxnKind::Install, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(install).unwrap().state,
        StateTag::Completed
    );
    assert_eq!(spec.layout.installed_revision(&pack).unwrap(), Some(2));

    // Roll back to the pinned revision 1
    let rollback = spec
        .sched
        .submit_direct(TxnKind::Rollback, "acme/editor@1".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(rollback).unwrap().state,
        StateTag::Completed
    );
    assert_eq!(spec.layout.installed_revision(&pack).unwrap(), Some(1));
    assert_eq!(spec.layout.installed_packs().unwrap().len(), 1);
}

#[tokio::test]
async fn install_with_dependency_chain() {
    let mut spec = spec();
    spec.store.set_dependencies("acme/editor", vec!["acme/lib"]);
    spec.store.set_dependencies("acme/lib", vec!["acme/base"]);

    let parent = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();

    // The whole chain installed, parent last
    let summaries = spec.sched.list_direct();
    assert_eq!(summaries.len(), 3);
    assert!(summaries.iter().all(|s| s.state == StateTag::Completed));
    for pack in ["acme/editor", "acme/lib", "acme/base"] {
        assert!(spec
            .layout
            .installed_revision(&pack.parse().unwrap())
            .unwrap()
            .is_some());
    }
    assert_eq!(
        spec.sched.status_direct(parent).unwrap().state,
        StateTag::Completed
    );
}

#[tokio::test]
async fn configure_refreshes_wrappers_in_place() {
    let mut spec = spec();
    spec.mounter.set_manifest("acme-editor-1", manifest(1));
    let pack: PackRef = "acme/editor".parse().unwrap();

    let install = spec
        .sched
        .submit_direct(TxnKind::Install, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(install).unwrap().state,
        StateTag::Completed
    );

    // Someone removed the wrapper by hand; configure puts it back
    std::fs::remove_file(spec.layout.wrapper_file("edit")).unwrap();
    let configure = spec
        .sched
        .submit_direct(TxnKind::Configure, pack.clone())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(configure).unwrap().state,
        StateTag::Completed
    );
    assert!(spec.layout.wrapper_file("edit").exists());
}
