//! Health probing: reachability vs. health, latency and failure streaks.

mod common;

use std::time::Duration;

use common::*;
use stockroom_core::api::HealthResponse;
use stockroom_core::health::HealthMonitor;
use stockroom_core::ApiError;

fn monitor(gateway: &std::sync::Arc<ScriptedGateway>) -> HealthMonitor {
    HealthMonitor::new(gateway.clone(), 5000.0)
}

#[tokio::test(start_paused = true)]
async fn test_fast_check_is_online_and_healthy() {
    let gateway = ScriptedGateway::new();
    gateway.push_health(Reply::After(Duration::from_millis(120), Ok(health_ok())));
    let monitor = monitor(&gateway);

    let snapshot = monitor.check().await;
    assert!(snapshot.status.online);
    assert!(snapshot.status.error.is_none());
    assert!(snapshot.status.last_check_at.is_some());
    assert!(snapshot.metrics.healthy);
    assert_eq!(snapshot.metrics.consecutive_failures, 0);
    assert!(snapshot.metrics.last_success_at.is_some());

    let latency = snapshot.metrics.latency_ms.expect("latency recorded");
    assert!((120.0..130.0).contains(&latency), "latency was {latency}");
}

#[tokio::test(start_paused = true)]
async fn test_slow_check_is_online_but_unhealthy() {
    let gateway = ScriptedGateway::new();
    gateway.push_health(Reply::After(Duration::from_millis(6000), Ok(health_ok())));
    let monitor = monitor(&gateway);

    let snapshot = monitor.check().await;
    assert!(snapshot.status.online);
    assert!(!snapshot.metrics.healthy);
    assert_eq!(snapshot.metrics.consecutive_failures, 1);
    assert!(snapshot.metrics.latency_ms.unwrap() >= 6000.0);
    assert!(snapshot.metrics.last_success_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failure_streak_then_recovery() {
    let gateway = ScriptedGateway::new();
    for _ in 0..3 {
        gateway.push_health(Reply::Now(Err(network_error())));
    }
    let monitor = monitor(&gateway);

    for n in 1..=3 {
        let snapshot = monitor.check().await;
        assert!(!snapshot.status.online);
        assert_eq!(snapshot.metrics.consecutive_failures, n);
        assert!(snapshot.metrics.latency_ms.is_none());
    }

    let snapshot = monitor.check().await;
    assert!(snapshot.status.online);
    assert!(snapshot.metrics.healthy);
    assert_eq!(snapshot.metrics.consecutive_failures, 0);
}

#[tokio::test]
async fn test_transport_error_is_captured() {
    let gateway = ScriptedGateway::new();
    gateway.push_health(Reply::Now(Err(ApiError::Timeout)));
    let monitor = monitor(&gateway);

    let snapshot = monitor.check().await;
    assert!(!snapshot.status.online);
    assert_eq!(snapshot.status.error, Some(ApiError::Timeout.to_string()));
    assert!(!monitor.is_online());
}

#[tokio::test]
async fn test_unrecognised_payload_is_offline() {
    let gateway = ScriptedGateway::new();
    gateway.push_health(Reply::Now(Ok(HealthResponse {
        status: Some("DEGRADED".to_string()),
        success: None,
        timestamp: None,
        uptime: None,
        version: None,
    })));
    let monitor = monitor(&gateway);

    let snapshot = monitor.check().await;
    assert!(!snapshot.status.online);
    assert_eq!(snapshot.status.error.as_deref(), Some("Health check failed"));
    assert!(snapshot.metrics.latency_ms.is_some());
    assert_eq!(snapshot.metrics.consecutive_failures, 1);
}

#[tokio::test]
async fn test_success_flag_counts_as_ok() {
    let gateway = ScriptedGateway::new();
    gateway.push_health(Reply::Now(Ok(HealthResponse {
        status: None,
        success: Some(true),
        timestamp: None,
        uptime: None,
        version: None,
    })));
    let monitor = monitor(&gateway);

    assert!(monitor.check().await.status.online);
}

#[tokio::test]
async fn test_check_publishes_snapshot() {
    let gateway = ScriptedGateway::new();
    let monitor = monitor(&gateway);
    let mut rx = monitor.subscribe();
    assert!(!rx.borrow_and_update().status.online);

    monitor.check().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), monitor.snapshot());
    assert!(monitor.status().online);
    assert_eq!(monitor.metrics().consecutive_failures, 0);
}
