mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{StubGateway, svc, wait_until};
use quay::directory::ServiceStatus;
use quay::sync::{SyncEngine, SyncOptions};
use quay::types::NoticeLevel;

fn options() -> SyncOptions {
    SyncOptions {
        // Long cadence so only the immediate startup tick fires during a test.
        poll_interval: Duration::from_secs(300),
        settle_delay: Duration::from_millis(50),
        auto_start: false,
        push_url: None,
    }
}

#[tokio::test]
async fn startup_fetch_populates_directory() {
    let gateway = Arc::new(StubGateway::with_payload(vec![
        svc("minio", true, ServiceStatus::Running),
        svc("redis", false, ServiceStatus::Stopped),
    ]));
    let handle = SyncEngine::spawn(gateway.clone(), options());

    let mut directory = handle.directory();
    tokio::time::timeout(Duration::from_secs(1), directory.changed())
        .await
        .expect("startup fetch timed out")
        .expect("directory channel closed");

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.get("minio").is_some());
    assert_eq!(snapshot.enabled_count(), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn auto_start_targets_only_enabled_stopped_services() {
    let gateway = Arc::new(StubGateway::with_payload(vec![
        svc("a", true, ServiceStatus::Stopped),
        svc("b", true, ServiceStatus::Running),
        svc("c", false, ServiceStatus::Stopped),
    ]));
    let handle = SyncEngine::spawn(
        gateway.clone(),
        SyncOptions {
            auto_start: true,
            ..options()
        },
    );

    let mut directory = handle.directory();
    directory.changed().await.expect("directory channel closed");

    let gw = gateway.clone();
    wait_until(Duration::from_secs(1), move || gw.calls_named("start") == 1).await;
    assert_eq!(gateway.calls_named("start a"), 1);
    assert_eq!(gateway.calls_named("start b"), 0);
    assert_eq!(gateway.calls_named("start c"), 0);
    handle.shutdown().await;
}

#[tokio::test]
async fn auto_start_failure_does_not_suppress_remaining_services() {
    let gateway = Arc::new(StubGateway::with_payload(vec![
        svc("a", true, ServiceStatus::Stopped),
        svc("b", true, ServiceStatus::Stopped),
    ]));
    gateway.fail_start.store(true, Ordering::SeqCst);
    let handle = SyncEngine::spawn(
        gateway.clone(),
        SyncOptions {
            auto_start: true,
            ..options()
        },
    );

    let mut directory = handle.directory();
    directory.changed().await.expect("directory channel closed");

    let gw = gateway.clone();
    wait_until(Duration::from_secs(1), move || gw.calls_named("start") == 2).await;
    assert_eq!(gateway.calls_named("start a"), 1);
    assert_eq!(gateway.calls_named("start b"), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn failed_mutation_leaves_directory_untouched() {
    let gateway = Arc::new(StubGateway::with_payload(vec![
        svc("s1", true, ServiceStatus::Running),
        svc("s2", true, ServiceStatus::Running),
    ]));
    gateway.fail_stop.store(true, Ordering::SeqCst);
    let handle = SyncEngine::spawn(gateway.clone(), options());

    let mut directory = handle.directory();
    directory.changed().await.expect("directory channel closed");
    let before = handle.snapshot();

    let mut notices = handle.notices();
    handle.stop("s1").await.expect("mutation enqueue failed");

    let mut saw_pending = false;
    loop {
        let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
            .await
            .expect("mutation outcome timed out")
            .expect("notice channel closed");
        match notice.level {
            NoticeLevel::Pending => saw_pending = true,
            NoticeLevel::Failure => {
                assert!(notice.message.contains("stop"));
                assert_eq!(notice.service.as_deref(), Some("s1"));
                break;
            }
            _ => panic!("unexpected notice: {notice:?}"),
        }
    }
    assert!(saw_pending);

    // No settle refetch after a failed call, and the directory is unchanged.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let after = handle.snapshot();
    assert_eq!(after.get("s1").unwrap().status, ServiceStatus::Running);
    assert_eq!(after.len(), before.len());
    assert_eq!(gateway.calls_named("list"), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn successful_mutation_schedules_settle_refetch() {
    let gateway = Arc::new(StubGateway::with_payload(vec![svc(
        "s1",
        true,
        ServiceStatus::Stopped,
    )]));
    let handle = SyncEngine::spawn(gateway.clone(), options());

    let mut directory = handle.directory();
    directory.changed().await.expect("directory channel closed");
    assert_eq!(gateway.calls_named("list"), 1);

    handle.start("s1").await.expect("mutation enqueue failed");

    let gw = gateway.clone();
    wait_until(Duration::from_secs(1), move || gw.calls_named("list") >= 2).await;
    assert_eq!(gateway.calls_named("start s1"), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn fetch_failure_retains_previous_directory() {
    let gateway = Arc::new(StubGateway::with_payload(vec![svc(
        "s1",
        true,
        ServiceStatus::Running,
    )]));
    let handle = SyncEngine::spawn(gateway.clone(), options());

    let mut directory = handle.directory();
    directory.changed().await.expect("directory channel closed");

    gateway.fail_list.store(true, Ordering::SeqCst);
    let mut notices = handle.notices();
    handle.refresh().await.expect("refresh enqueue failed");

    let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
        .await
        .expect("failure notice timed out")
        .expect("notice channel closed");
    assert_eq!(notice.level, NoticeLevel::Failure);
    assert!(notice.message.contains("Failed to fetch services"));

    let snapshot = handle.snapshot();
    assert!(snapshot.get("s1").is_some());
    handle.shutdown().await;
}

#[tokio::test]
async fn slow_stale_fetch_cannot_overwrite_newer_snapshot() {
    let gateway = Arc::new(StubGateway::with_payloads(vec![
        vec![svc("old", true, ServiceStatus::Running)],
        vec![svc("new", true, ServiceStatus::Running)],
    ]));
    *gateway.first_list_delay.lock().unwrap() = Some(Duration::from_millis(200));
    let handle = SyncEngine::spawn(gateway.clone(), options());

    // Let the delayed startup fetch get underway, then race a second fetch
    // past it.
    let gw = gateway.clone();
    wait_until(Duration::from_secs(1), move || gw.calls_named("list") == 1).await;
    let mut directory = handle.directory();
    handle.refresh().await.expect("refresh enqueue failed");

    tokio::time::timeout(Duration::from_secs(1), directory.changed())
        .await
        .expect("fast fetch timed out")
        .expect("directory channel closed");
    assert!(handle.snapshot().get("new").is_some());

    // The slow first fetch completes afterwards and must be discarded.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = handle.snapshot();
    assert!(snapshot.get("new").is_some());
    assert!(snapshot.get("old").is_none());
    handle.shutdown().await;
}

#[tokio::test]
async fn engine_survives_persistent_gateway_failures() {
    let gateway = Arc::new(StubGateway::with_payload(vec![svc(
        "s1",
        true,
        ServiceStatus::Running,
    )]));
    gateway.fail_list.store(true, Ordering::SeqCst);
    let handle = SyncEngine::spawn(gateway.clone(), options());

    let mut notices = handle.notices();
    for _ in 0..3 {
        handle.refresh().await.expect("refresh enqueue failed");
        let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
            .await
            .expect("failure notice timed out")
            .expect("notice channel closed");
        assert_eq!(notice.level, NoticeLevel::Failure);
    }

    // The engine is still alive: clearing the fault heals the directory.
    gateway.fail_list.store(false, Ordering::SeqCst);
    let mut directory = handle.directory();
    handle.refresh().await.expect("refresh enqueue failed");
    tokio::time::timeout(Duration::from_secs(1), directory.changed())
        .await
        .expect("recovery fetch timed out")
        .expect("directory channel closed");
    assert!(handle.snapshot().get("s1").is_some());
    handle.shutdown().await;
}
