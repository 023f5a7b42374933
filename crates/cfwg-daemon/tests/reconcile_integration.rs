#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests use unwrap for brevity

//! End-to-end reconciliation against a temp-dir tunnel file, a fake identity
//! service, and a fake systemd.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use cfwg_daemon::reconcile::{CycleError, ReconcilePolicy, Reconciler};
use cfwg_daemon::service::{ApplyAction, ServiceController};
use cfwg_daemon::wireguard::{TunnelConfigWriter, WriteMode};

use common::{FakeIdentity, FakeSystemd, UNIT};

const MINUTE: Duration = Duration::from_secs(60);

const UI_CONFIG: &str = "\
[Interface]
PrivateKey = OLDPRIV=
Address = 10.0.0.5/32
DNS = 9.9.9.9

[Peer]
PublicKey = OLDPEER=
AllowedIPs = 10.10.0.0/16
Endpoint = 192.0.2.1:51820
";

fn reconciler(
    dir: &tempfile::TempDir,
    identity: FakeIdentity,
    systemd: &Arc<FakeSystemd>,
) -> Reconciler<FakeIdentity, Arc<FakeSystemd>> {
    Reconciler::new(
        identity,
        TunnelConfigWriter::new(dir.path().join("wg0.conf"), dir.path().join("backups")),
        ServiceController::with_runner(UNIT, Arc::clone(systemd)),
        ReconcilePolicy::default(),
    )
}

#[tokio::test]
async fn fresh_install_renders_and_starts() {
    let dir = tempfile::tempdir().unwrap();
    let systemd = FakeSystemd::with_active(false);
    let mut reconciler = reconciler(&dir, FakeIdentity::new(), &systemd);

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.write.mode, WriteMode::Rendered);
    assert!(report.write.backup.is_none());
    assert_eq!(report.action, ApplyAction::Started);
    assert_eq!(systemd.count("systemctl start wg-quick@wg0"), 1);
    assert_eq!(systemd.count("systemctl restart wg-quick@wg0"), 0);

    let written = std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap();
    assert!(written.contains("PrivateKey = NEWPRIV="));
    assert!(written.contains("Endpoint = 162.159.192.1:2408"));
}

#[tokio::test]
async fn existing_file_is_merged_and_restarted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("wg0.conf"), UI_CONFIG).unwrap();
    let systemd = FakeSystemd::with_active(true);
    let mut reconciler = reconciler(&dir, FakeIdentity::new(), &systemd);

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.write.mode, WriteMode::Merged);
    assert_eq!(report.action, ApplyAction::Restarted);
    let backup = report.write.backup.unwrap();
    assert_eq!(std::fs::read_to_string(backup).unwrap(), UI_CONFIG);

    let written = std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap();
    assert_eq!(
        written,
        "\
[Interface]
PrivateKey = NEWPRIV=
Address = 10.0.0.5/32
DNS = 9.9.9.9

[Peer]
PublicKey = NEWPEER=
AllowedIPs = 10.10.0.0/16
Endpoint = 162.159.192.1:2408
PersistentKeepalive = 25
"
    );
}

#[tokio::test]
async fn inactive_service_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("wg0.conf"), UI_CONFIG).unwrap();
    let systemd = FakeSystemd::with_active(false);
    let mut reconciler = reconciler(&dir, FakeIdentity::new(), &systemd);

    let err = reconciler.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::ServiceInactive), "got {err:?}");
    assert!(!err.counts_as_failure());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap(),
        UI_CONFIG
    );
    assert!(!dir.path().join("backups").exists());
    assert_eq!(systemd.count("systemctl start wg-quick@wg0"), 0);
}

#[tokio::test(start_paused = true)]
async fn inactive_service_does_not_count_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("wg0.conf"), UI_CONFIG).unwrap();
    let systemd = FakeSystemd::with_active(false);
    let identity = FakeIdentity::new();
    let counters = Arc::clone(&identity.counters);
    let mut reconciler = reconciler(&dir, identity, &systemd);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        reconciler.run(rx).await;
        reconciler
    });

    // Cycles at 0, 5 and 10 minutes.
    tokio::time::sleep(11 * MINUTE).await;
    tx.send(true).unwrap();
    let reconciler = handle.await.unwrap();

    assert_eq!(counters.authenticated(), 3);
    assert_eq!(reconciler.failures(), 0);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap(),
        UI_CONFIG
    );
}

#[tokio::test(start_paused = true)]
async fn success_sleeps_interval_and_refreshes_halfway() {
    let dir = tempfile::tempdir().unwrap();
    let systemd = FakeSystemd::with_active(false);
    let identity = FakeIdentity::new();
    let counters = Arc::clone(&identity.counters);
    let mut reconciler = reconciler(&dir, identity, &systemd);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { reconciler.run(rx).await });

    tokio::time::sleep(29 * MINUTE).await;
    assert_eq!(counters.authenticated(), 1);
    assert_eq!(counters.refreshed(), 0);

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(counters.refreshed(), 1);

    tokio::time::sleep(30 * MINUTE).await;
    assert_eq!(counters.authenticated(), 2);
    assert_eq!(counters.fetched(), 2);
    assert_eq!(counters.refreshed(), 1);

    // First cycle started the unit, the second found it running.
    assert_eq!(systemd.count("systemctl start wg-quick@wg0"), 1);
    assert_eq!(systemd.count("systemctl restart wg-quick@wg0"), 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_back_off() {
    let dir = tempfile::tempdir().unwrap();
    let systemd = FakeSystemd::with_active(true);
    let identity = FakeIdentity::failing();
    let counters = Arc::clone(&identity.counters);
    let mut reconciler = reconciler(&dir, identity, &systemd);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        reconciler.run(rx).await;
        reconciler
    });

    // Attempts at 0..=4 minutes, then a two minute backoff after the
    // one minute retry delay, so the sixth attempt lands at 7 minutes.
    tokio::time::sleep(Duration::from_secs(4 * 60 + 30)).await;
    assert_eq!(counters.authenticated(), 5);

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(counters.authenticated(), 5, "still backing off at 6.5 minutes");

    tokio::time::sleep(MINUTE).await;
    assert_eq!(counters.authenticated(), 6);

    tx.send(true).unwrap();
    let reconciler = handle.await.unwrap();
    // Reset to three after the backoff, then one more failure.
    assert_eq!(reconciler.failures(), 4);
    assert!(!dir.path().join("wg0.conf").exists());
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let systemd = FakeSystemd::with_active(false);
    let mut reconciler = reconciler(&dir, FakeIdentity::new(), &systemd);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { reconciler.run(rx).await });

    tokio::time::sleep(10 * MINUTE).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop without waiting out the interval")
        .unwrap();
}

#[tokio::test]
async fn shutdown_before_start_runs_no_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let systemd = FakeSystemd::with_active(false);
    let identity = FakeIdentity::new();
    let counters = Arc::clone(&identity.counters);
    let mut reconciler = reconciler(&dir, identity, &systemd);

    let (_tx, rx) = watch::channel(true);
    reconciler.run(rx).await;

    assert_eq!(counters.authenticated(), 0);
    assert!(systemd.calls().is_empty());
}
