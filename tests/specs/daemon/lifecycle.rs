//! Daemon lifecycle against a real state directory: lock discipline and
//! journal-backed status across restarts.

use chef_core::TxnKind;
use chef_daemon::{startup, Config, LifecycleError};
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> Config {
    Config::load_from(dir.join("state"), dir.join("rootfs")).unwrap()
}

#[tokio::test]
async fn daemon_starts_serves_and_stops() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let daemon = startup(&config).await.unwrap();
    assert!(daemon.handle.list().await.unwrap().is_empty());

    let mut events = daemon.bus.subscribe();
    let id = daemon
        .handle
        .submit(TxnKind::Install, "acme/editor".parse().unwrap())
        .await
        .unwrap();

    // The first event for the new transaction arrives on the bus
    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.txn_id(), id);

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn only_one_daemon_per_state_dir() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let daemon = startup(&config).await.unwrap();
    assert!(matches!(
        startup(&config).await.unwrap_err(),
        LifecycleError::LockFailed(_)
    ));
    daemon.shutdown().await.unwrap();

    // After a clean shutdown the lock is free again
    let daemon = startup(&config).await.unwrap();
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_survives_a_daemon_restart() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let id = {
        let daemon = startup(&config).await.unwrap();
        let id = daemon
            .handle
            .submit(TxnKind::Install, "acme/editor".parse().unwrap())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        daemon.shutdown().await.unwrap();
        id
    };

    let daemon = startup(&config).await.unwrap();
    let status = daemon.handle.status(id).await.unwrap();
    assert!(status.is_some());
    assert_eq!(status.unwrap().id, id);
    daemon.shutdown().await.unwrap();
}
