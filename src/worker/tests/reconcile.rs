//! Loop body behaviour and on-demand queries.

use super::*;

// =============================================================================
// Probe and reactivation
// =============================================================================

#[tokio::test]
async fn healthy_hotspot_is_left_alone() {
    let h = Harness::new();
    h.worker.inner.reconcile_once().await;
    assert_eq!(h.calls("status"), 1);
    assert_eq!(h.calls("start"), 0);
}

#[tokio::test]
async fn status_match_ignores_case() {
    let h = Harness::new();
    h.host.set_status("UP");
    h.worker.inner.reconcile_once().await;
    assert_eq!(h.calls("start"), 0);
}

#[tokio::test]
async fn inactive_hotspot_is_reactivated_every_iteration() {
    let h = Harness::new();
    h.host.set_status("Disconnected");
    for _ in 0..3 {
        h.worker.inner.reconcile_once().await;
    }
    assert_eq!(h.calls("start"), 3);
}

#[tokio::test]
async fn failed_status_query_counts_as_unhealthy() {
    let h = Harness::new();
    h.host.fail_status();
    h.worker.inner.reconcile_once().await;
    assert_eq!(h.calls("start"), 1);
    assert_eq!(h.calls("count"), 1, "loop continues after reactivation");
}

#[tokio::test]
async fn failing_reactivation_runs_once_per_iteration() {
    let h = Harness::new();
    h.host.set_status("Disconnected");
    h.host.fail_actions("Error: Connection activation failed");
    for _ in 0..2 {
        h.worker.inner.reconcile_once().await;
    }
    assert_eq!(h.calls("start"), 2);
    assert_eq!(count_calls(&h.process_calls, "start"), 0);
    assert_eq!(h.calls("count"), 2, "loop continues after a failed reactivation");
}

#[tokio::test]
async fn empty_status_output_counts_as_unhealthy() {
    let h = Harness::new();
    h.host.set_status("");
    h.worker.inner.reconcile_once().await;
    assert_eq!(h.calls("start"), 1);
}

// =============================================================================
// Client count notifications
// =============================================================================

#[tokio::test]
async fn first_observation_is_notified() {
    let h = Harness::new();
    let mut rx = h.worker.subscribe();
    assert_eq!(h.worker.last_known_client_count(), COUNT_NOT_OBSERVED);

    h.worker.inner.reconcile_once().await;
    assert_eq!(drain(&mut rx), vec![0]);
    assert_eq!(h.worker.last_known_client_count(), 0);
}

#[tokio::test]
async fn notifications_fire_only_on_change() {
    let h = Harness::new();
    h.host.set_counts(&["2", "2", "3", "garbage", "3"]);
    let mut rx = h.worker.subscribe();

    for _ in 0..5 {
        h.worker.inner.reconcile_once().await;
    }

    assert_eq!(drain(&mut rx), vec![2, 3, COUNT_UNAVAILABLE, 3]);
    assert_eq!(h.worker.last_known_client_count(), 3);
}

#[tokio::test]
async fn noisy_count_output_is_salvaged() {
    let h = Harness::new();
    h.host.set_counts(&["Value = 3 clients"]);
    h.worker.inner.reconcile_once().await;
    assert_eq!(h.worker.last_known_client_count(), 3);
}

#[tokio::test]
async fn failed_count_query_reports_unavailable() {
    let h = Harness::new();
    let mut rx = h.worker.subscribe();
    h.host.set_counts(&["1"]);
    h.worker.inner.reconcile_once().await;

    h.host.fail_counts();
    h.worker.inner.reconcile_once().await;
    h.worker.inner.reconcile_once().await;

    assert_eq!(drain(&mut rx), vec![1, COUNT_UNAVAILABLE]);
}

#[tokio::test]
async fn count_timeout_does_not_demote_resident_channel() {
    let h = Harness::new();
    h.host.fail_counts();
    h.worker.inner.reconcile_once().await;
    h.worker.inner.reconcile_once().await;
    assert_eq!(count_calls(&h.process_calls, "count"), 0);
    assert_eq!(count_calls(&h.resident_calls, "count"), 2);
}

#[tokio::test]
async fn every_subscriber_sees_each_change() {
    let h = Harness::new();
    h.host.set_counts(&["1", "2"]);
    let mut a = h.worker.subscribe();
    let mut b = h.worker.subscribe();

    h.worker.inner.reconcile_once().await;
    h.worker.inner.reconcile_once().await;

    assert_eq!(drain(&mut a), vec![1, 2]);
    assert_eq!(drain(&mut b), vec![1, 2]);
}

// =============================================================================
// On-demand queries
// =============================================================================

#[tokio::test]
async fn connected_clients_are_parsed() {
    let h = Harness::new();
    h.host.set_clients(&[
        "aa:bb:cc:dd:ee:ff|Laptop|192.168.137.2",
        "",
        "11:22:33:44:55:66||",
    ]);

    let clients = h.worker.connected_clients().await;
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].mac_address, "AA:BB:CC:DD:EE:FF");
    assert_eq!(clients[0].device_name, "Laptop");
    assert_eq!(clients[1].device_name, "");
}

#[tokio::test]
async fn failed_listing_returns_empty_list() {
    let h = Harness::new();
    h.host.fail_clients("tethering unavailable");
    assert!(h.worker.connected_clients().await.is_empty());
}

#[tokio::test]
async fn fetch_connected_clients_reports_message() {
    let h = Harness::new();
    h.host.fail_clients("tethering unavailable");
    let err = h
        .worker
        .fetch_connected_clients()
        .await
        .expect_err("listing should fail");
    let msg = err.to_string();
    assert!(msg.contains("list connected clients"), "{msg}");
    assert!(msg.contains("tethering unavailable"), "{msg}");
}

#[tokio::test]
async fn on_demand_count_does_not_touch_stored_count() {
    let h = Harness::new();
    h.host.set_counts(&["5"]);
    let mut rx = h.worker.subscribe();

    assert_eq!(h.worker.connected_client_count().await, 5);
    assert_eq!(h.worker.last_known_client_count(), COUNT_NOT_OBSERVED);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn queries_never_fail_when_everything_is_broken() {
    let h = Harness::new();
    h.host.fail_status();
    h.host.fail_counts();
    h.host.fail_clients("boom");

    assert!(!h.worker.check_status().await);
    assert_eq!(h.worker.connected_client_count().await, COUNT_UNAVAILABLE);
    assert!(h.worker.connected_clients().await.is_empty());
}

#[tokio::test]
async fn queries_work_while_loop_runs() {
    let h = Harness::new();
    h.host.set_counts(&["2"]);
    h.worker.start();

    let count = tokio::time::timeout(
        Duration::from_secs(1),
        h.worker.connected_client_count(),
    )
    .await
    .expect("query should not block on the loop");
    assert_eq!(count, 2);
    assert!(h.worker.check_status().await);

    h.worker.stop().await;
}
