//! Startup and shutdown behavior of the lifecycle gate.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use service_gate::http::status_routes;
use service_gate::lifecycle::LifecycleState::*;
use service_gate::{LifecycleGate, ServiceConfig, ShutdownError, StartupError, TcpConnector};

mod common;
use common::{http_client, test_config, MockConnector};

#[tokio::test]
async fn reaches_ready_after_one_retry() {
    let port = 28401;
    let (connector, probe) = MockConnector::reachable_on(2);
    let gate = LifecycleGate::new(connector, status_routes());

    let mut config = test_config(port);
    config.max_retries = 3;
    gate.start(config).await.expect("gate should open");

    assert_eq!(gate.state(), Ready);
    assert_eq!(gate.history(), vec![Initializing, Connecting, Connecting, Ready]);
    assert_eq!(probe.attempts(), 2);
    assert_eq!(gate.status().attempts, 2);
    assert_eq!(gate.status().local_addr.map(|a| a.port()), Some(port));

    let res = http_client()
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("listener should accept once READY");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["state"], "READY");

    gate.shutdown("test complete").await.unwrap();
}

#[tokio::test]
async fn single_attempt_then_failed_when_no_retries() {
    let (connector, probe) = MockConnector::unreachable();
    let gate = LifecycleGate::new(connector, Router::new());

    let mut config = test_config(28402);
    config.max_retries = 0;
    let err = gate.start(config).await.unwrap_err();

    assert!(matches!(err, StartupError::DependencyUnreachable { attempts: 1, .. }), "got {err:?}");
    assert_ne!(err.exit_code(), 0);
    assert_eq!(probe.attempts(), 1);
    assert_eq!(gate.state(), Failed);
    assert_eq!(gate.history(), vec![Initializing, Connecting, Failed]);
    assert_eq!(probe.released(), 0);

    // Nothing was bound.
    assert!(tokio::net::TcpStream::connect("127.0.0.1:28402").await.is_err());
}

#[tokio::test]
async fn unreachable_dependency_gets_n_plus_one_attempts() {
    for n in 0..5 {
        let (connector, probe) = MockConnector::unreachable();
        let gate = LifecycleGate::new(connector, Router::new());

        let mut config = test_config(28403);
        config.max_retries = n;
        let err = gate.start(config).await.unwrap_err();

        assert!(matches!(err, StartupError::DependencyUnreachable { .. }));
        assert_eq!(probe.attempts(), n + 1, "max_retries = {n}");
        assert_eq!(gate.state(), Failed);
    }
}

#[tokio::test]
async fn second_start_is_rejected_without_new_attempts() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());

    gate.start(test_config(28404)).await.unwrap();
    assert_eq!(probe.attempts(), 1);

    let err = gate.start(test_config(28404)).await.unwrap_err();
    assert!(matches!(err, StartupError::AlreadyStarting { state: Ready }), "got {err:?}");
    assert!(!err.is_fatal());
    assert_eq!(probe.attempts(), 1);
    assert_eq!(gate.history(), vec![Initializing, Connecting, Ready]);

    gate.shutdown("test complete").await.unwrap();
}

#[tokio::test]
async fn concurrent_start_fails_while_connecting() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let connector = connector.with_latency(Duration::from_millis(300));
    let gate = Arc::new(LifecycleGate::new(connector, Router::new()));

    let first = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.start(test_config(28405)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = gate.start(test_config(28405)).await.unwrap_err();
    assert!(matches!(err, StartupError::AlreadyStarting { state: Connecting }), "got {err:?}");

    first.await.unwrap().unwrap();
    assert_eq!(probe.attempts(), 1);
    assert_eq!(gate.state(), Ready);

    gate.shutdown("test complete").await.unwrap();
}

#[tokio::test]
async fn shutdown_twice_releases_once() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());
    gate.start(test_config(28406)).await.unwrap();

    gate.shutdown("first").await.expect("first shutdown");
    gate.shutdown("second").await.expect("second shutdown is a no-op");

    assert_eq!(probe.released(), 1);
    assert_eq!(gate.state(), ShuttingDown);
    assert_eq!(gate.status().shutdown_reason.as_deref(), Some("first"));
    assert_eq!(gate.history(), vec![Initializing, Connecting, Ready, ShuttingDown]);

    assert!(tokio::net::TcpStream::connect("127.0.0.1:28406").await.is_err());
    tokio::time::timeout(Duration::from_secs(1), gate.wait_stopped())
        .await
        .expect("gate should report stopped");
}

#[tokio::test]
async fn concurrent_shutdown_is_reported() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "done"
        }),
    );
    let gate = Arc::new(LifecycleGate::new(connector, app));
    gate.start(test_config(28407)).await.unwrap();

    let request = tokio::spawn(http_client().get("http://127.0.0.1:28407/slow").send());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let draining = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.shutdown("first").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = gate.shutdown("second").await.unwrap_err();
    assert!(matches!(err, ShutdownError::AlreadyShuttingDown));

    draining.await.unwrap().unwrap();
    assert_eq!(request.await.unwrap().unwrap().status(), 200);
    assert_eq!(probe.released(), 1);
}

#[tokio::test]
async fn shutdown_while_connecting_cancels_startup() {
    let (connector, probe) = MockConnector::unreachable();
    let gate = Arc::new(LifecycleGate::new(connector, Router::new()));

    let mut config = test_config(28408);
    config.max_retries = 100;
    config.retry_backoff_ms = 10_000;
    config.backoff_ceiling_ms = 10_000;

    let starting = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.start(config).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gate.state(), Connecting);

    tokio::time::timeout(Duration::from_secs(1), gate.shutdown("SIGTERM"))
        .await
        .expect("cancel should not wait out the backoff")
        .unwrap();

    let err = starting.await.unwrap().unwrap_err();
    assert!(matches!(err, StartupError::Cancelled { attempts: 1 }), "got {err:?}");
    assert_eq!(gate.state(), Failed);
    assert_eq!(probe.attempts(), 1);
    assert!(!gate.history().contains(&Ready));

    let err = gate.shutdown("again").await.unwrap_err();
    assert!(matches!(err, ShutdownError::NotReady { state: Failed }));
}

#[tokio::test]
async fn shutdown_before_start_is_rejected() {
    let (connector, _probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());

    let err = gate.shutdown("too early").await.unwrap_err();
    assert!(matches!(err, ShutdownError::NotReady { state: Initializing }));
    assert_eq!(gate.state(), Initializing);
}

#[tokio::test]
async fn invalid_config_fails_before_any_io() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());

    let mut config = test_config(0);
    config.dependency_uri = String::new();
    let err = gate.start(config).await.unwrap_err();

    match err {
        StartupError::InvalidConfig(ref errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
    assert_eq!(probe.attempts(), 0);
    assert_eq!(gate.state(), Initializing);
}

#[tokio::test]
async fn gate_stays_startable_after_invalid_config() {
    let (connector, probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());

    let mut config = test_config(28411);
    config.dependency_uri = String::new();
    assert!(gate.start(config).await.is_err());

    let waited = tokio::time::timeout(Duration::from_millis(100), gate.wait_stopped()).await;
    assert!(waited.is_err(), "a gate that never ran is not stopped");

    gate.start(test_config(28411)).await.unwrap();
    assert_eq!(gate.state(), Ready);
    assert_eq!(probe.attempts(), 1);

    gate.shutdown("test complete").await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), gate.wait_stopped())
        .await
        .expect("gate should report stopped after shutdown");
}

#[tokio::test]
async fn port_in_use_fails_and_releases_dependency() {
    let _squatter = std::net::TcpListener::bind("127.0.0.1:28409").unwrap();

    let (connector, probe) = MockConnector::reachable_on(1);
    let gate = LifecycleGate::new(connector, Router::new());
    let err = gate.start(test_config(28409)).await.unwrap_err();

    assert!(matches!(err, StartupError::ListenerBindFailure(_)), "got {err:?}");
    assert_eq!(gate.state(), Failed);
    assert_eq!(gate.history(), vec![Initializing, Connecting, Failed]);
    assert_eq!(probe.released(), 1);

    tokio::time::timeout(Duration::from_secs(1), gate.wait_stopped())
        .await
        .expect("failed gate should report stopped");
}

#[tokio::test]
async fn tcp_connector_gates_on_real_socket() {
    let db = common::start_fake_database().await;
    let gate = LifecycleGate::new(
        TcpConnector::new(Duration::from_secs(1)),
        Router::new().route("/", get(|| async { "hello" })),
    );

    let config = ServiceConfig {
        dependency_uri: format!("mongodb://app:secret@{db}/skills"),
        ..test_config(28410)
    };
    gate.start(config).await.unwrap();

    let body = http_client()
        .get("http://127.0.0.1:28410/")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "hello");

    gate.shutdown("test complete").await.unwrap();
    assert_eq!(gate.state(), ShuttingDown);
}
