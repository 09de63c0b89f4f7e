mod support;

use std::sync::Arc;

use fleetssh::engine::ProbeRequest;
use fleetssh::error::ErrorKind;
use fleetssh::registry::DeviceRegistry;

use support::{ConnectMode, ExecMode, StubTransport, engine_with, fast_config};

fn registry() -> Arc<DeviceRegistry> {
    let registry = DeviceRegistry::in_memory();
    registry.upsert("172.21.1.81", "admin", "password123", "Cisco");
    Arc::new(registry)
}

#[tokio::test]
async fn probe_connects_and_closes_without_executing() {
    let (engine, calls) = engine_with(registry(), StubTransport::returning("", ""), fast_config());

    let result = engine.probe(ProbeRequest::new("172.21.1.81")).await;

    assert!(result.ok);
    assert_eq!(result.error_kind, ErrorKind::None);
    assert_eq!(result.username, "admin");
    assert_eq!(result.port, 22);
    assert!(result.message.contains("172.21.1.81:22"));
    assert!(result.message.contains("CISCO"));
    assert_eq!(calls.connects(), 1);
    assert_eq!(calls.executes(), 0);
    assert_eq!(calls.closes(), 1);
}

#[tokio::test]
async fn probe_uses_caller_overrides() {
    let (engine, calls) = engine_with(registry(), StubTransport::returning("", ""), fast_config());

    let result = engine
        .probe(
            ProbeRequest::new("172.21.1.81")
                .with_credentials("operator", "")
                .with_port(2222),
        )
        .await;

    assert!(result.ok);
    assert_eq!(result.port, 2222);
    assert_eq!(
        calls.last_credentials(),
        Some(("operator".to_string(), "password123".to_string()))
    );
}

#[tokio::test]
async fn probe_of_unregistered_host_skips_transport() {
    let (engine, calls) = engine_with(registry(), StubTransport::returning("", ""), fast_config());

    let result = engine.probe(ProbeRequest::new("10.9.9.9")).await;

    assert!(!result.ok);
    assert_eq!(result.error_kind, ErrorKind::DeviceNotFound);
    assert_eq!(calls.connects(), 0);
}

#[tokio::test]
async fn probe_authentication_failure_lists_fixes() {
    let (engine, calls) = engine_with(
        registry(),
        StubTransport::new(ConnectMode::RejectAuth, ExecMode::Fail),
        fast_config(),
    );

    let result = engine.probe(ProbeRequest::new("172.21.1.81")).await;

    assert!(!result.ok);
    assert_eq!(result.error_kind, ErrorKind::AuthenticationFailed);
    let first_fix = "1. Check the username and password";
    assert!(result.message.contains(first_fix));
    assert_eq!(calls.closes(), 0);
}

#[tokio::test]
async fn probe_refused_connection_is_transport_error() {
    let (engine, _) = engine_with(
        registry(),
        StubTransport::new(ConnectMode::Refuse, ExecMode::Fail),
        fast_config(),
    );

    let result = engine.probe(ProbeRequest::new("172.21.1.81")).await;

    assert_eq!(result.error_kind, ErrorKind::TransportError);
    assert!(result.message.contains("Possible causes"));
}

#[tokio::test]
async fn probe_times_out_on_silent_host() {
    let (engine, _) = engine_with(
        registry(),
        StubTransport::new(ConnectMode::Hang, ExecMode::Fail),
        fast_config(),
    );

    let result = engine.probe(ProbeRequest::new("172.21.1.81")).await;

    assert!(!result.ok);
    assert_eq!(result.error_kind, ErrorKind::TransportError);
}
