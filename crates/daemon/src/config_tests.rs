// SPDX-License-Identifier: MIT

use super::*;
use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn state_dir_env_takes_priority() {
    let dir = tempdir().unwrap();
    std::env::set_var("CHEFD_STATE_DIR", dir.path());
    std::env::set_var("CHEFD_ROOT", dir.path().join("rootfs"));

    let config = Config::load().unwrap();
    assert_eq!(config.state_dir, dir.path());
    assert_eq!(config.root, dir.path().join("rootfs"));
    assert_eq!(config.lock_path, dir.path().join("chefd.pid"));

    std::env::remove_var("CHEFD_STATE_DIR");
    std::env::remove_var("CHEFD_ROOT");
}

#[test]
#[serial]
fn root_defaults_to_slash() {
    let dir = tempdir().unwrap();
    std::env::set_var("CHEFD_STATE_DIR", dir.path());
    std::env::remove_var("CHEFD_ROOT");

    let config = Config::load().unwrap();
    assert_eq!(config.root, std::path::PathBuf::from("/"));

    std::env::remove_var("CHEFD_STATE_DIR");
}

#[test]
fn missing_tunables_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load_from(dir.path().to_owned(), "/".into()).unwrap();

    let engine = config.engine_config();
    assert_eq!(engine.retry_cap, 5);
    assert_eq!(engine.phase_limit, 4);
    assert_eq!(engine.dep_timeout, Duration::from_secs(600));
}

#[test]
fn tunables_overlay_engine_defaults() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("chefd.toml"),
        "retry_cap = 8\nconcurrency = 2\ndependency_timeout_secs = 60\ngrace_secs = 30\n",
    )
    .unwrap();

    let config = Config::load_from(dir.path().to_owned(), "/".into()).unwrap();
    let engine = config.engine_config();
    assert_eq!(engine.retry_cap, 8);
    assert_eq!(engine.phase_limit, 2);
    assert_eq!(engine.dep_timeout, Duration::from_secs(60));
    assert_eq!(engine.grace, Duration::from_secs(30));
}

#[test]
fn malformed_tunables_are_an_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("chefd.toml"), "retry_cap = \"lots\"").unwrap();

    let err = Config::load_from(dir.path().to_owned(), "/".into()).unwrap_err();
    assert!(matches!(err, LifecycleError::BadConfig(_, _)));
}

#[test]
fn layout_hangs_off_the_root() {
    let config = Config::load_from("/tmp/state".into(), "/srv/chef".into()).unwrap();
    assert_eq!(
        config.layout().boot_cookie(),
        std::path::PathBuf::from("/srv/chef/run/chef/boot-id")
    );
}
