//! Registry shutdown tests

use mcpcomposer_core::ErrorKind;
use mcpcomposer_gateway::{RegistryEvent, RegistryState, ShutdownReport};
use mcpcomposer_mcp::{ConnectionState, DownstreamConnection};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tests::events::collect_events;
use tests::fixtures::stdio_config;
use tests::{ComposerTestHarness, MockBehavior, MockConnectionFactory};

#[tokio::test]
async fn test_shutdown_releases_in_reverse_acquisition_order() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    harness.add_servers(&["a", "b", "c"]).await;
    assert_eq!(harness.registry.tracked_resources(), 3);
    harness.log().clear();

    let report = harness.registry.shutdown().await;

    assert_eq!(report.servers_shut_down, 3);
    assert_eq!(report.resources_released, 3);
    assert!(report.failures.is_empty());
    assert_eq!(
        harness.log().with_prefix("release:"),
        vec!["release:c", "release:b", "release:a"]
    );
    // Connections are shut down before the scope closes
    assert_eq!(
        harness.log().entries(),
        vec![
            "shutdown:a",
            "shutdown:b",
            "shutdown:c",
            "release:c",
            "release:b",
            "release:a"
        ]
    );
    assert_eq!(harness.registry.state(), RegistryState::Closed);
    assert_eq!(harness.registry.server_count(), 0);
}

#[tokio::test]
async fn test_shutdown_completes_when_a_connection_fails() {
    let factory = MockConnectionFactory::new()
        .with_server("b", MockBehavior::default().failing_shutdown())
        .with_server("c", MockBehavior::default().failing_release());
    let harness = ComposerTestHarness::new(factory);
    harness.add_servers(&["a", "b", "c"]).await;

    let report = harness.registry.shutdown().await;

    assert_eq!(report.servers_shut_down, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "b");
    assert_eq!(report.resources_released, 2);
    assert_eq!(report.release_failures.len(), 1);
    assert_eq!(report.release_failures[0].0, "c");
    assert_eq!(
        harness.log().with_prefix("release:"),
        vec!["release:c", "release:b", "release:a"]
    );
    for connection in harness.factory.created() {
        assert_eq!(connection.state(), ConnectionState::ShutDown);
    }
}

#[tokio::test]
async fn test_second_shutdown_is_noop() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    harness.add_servers(&["a"]).await;

    harness.registry.shutdown().await;
    let entries = harness.log().entries();

    let report = harness.registry.shutdown().await;
    assert_eq!(report, ShutdownReport::default());
    assert_eq!(harness.log().entries(), entries);
}

#[tokio::test]
async fn test_removed_server_releases_before_shutdown() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    harness.add_servers(&["a", "b"]).await;
    harness.registry.remove_server("a").await;
    assert_eq!(harness.registry.tracked_resources(), 1);

    let report = harness.registry.shutdown().await;

    assert_eq!(report.servers_shut_down, 1);
    assert_eq!(report.resources_released, 1);
    assert_eq!(harness.log().count("shutdown:a"), 1);
    assert_eq!(harness.log().count("release:a"), 1);
    assert_eq!(
        harness.log().with_prefix("release:"),
        vec!["release:a", "release:b"]
    );
}

#[tokio::test]
async fn test_add_remove_cycles_keep_scope_bounded() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    harness.add_servers(&["base"]).await;
    let baseline = harness.registry.tracked_resources();

    for _ in 0..1000 {
        harness.add_servers(&["a"]).await;
        assert!(harness.registry.remove_server("a").await);
    }

    assert_eq!(harness.registry.tracked_resources(), baseline);
    assert_eq!(harness.log().count("release:a"), 1000);
    assert_eq!(harness.registry.tool_control_names(), Vec::<String>::new());

    let report = harness.registry.shutdown().await;
    assert_eq!(report.resources_released, 1);
}

#[tokio::test]
async fn test_mutations_rejected_after_shutdown() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    harness.registry.shutdown().await;

    let err = harness
        .registry
        .add_server(&stdio_config("late"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = harness.registry.initialize(&[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert!(!harness.registry.remove_server("late").await);
    assert!(harness.factory.created().is_empty());
}

#[tokio::test]
async fn test_shutdown_emits_closed_event() {
    let harness = ComposerTestHarness::new(MockConnectionFactory::new());
    let mut rx = harness.registry.subscribe();

    harness.registry.shutdown().await;
    harness.registry.shutdown().await;

    let events = collect_events(&mut rx, Duration::from_millis(50)).await;
    assert_eq!(events, vec![RegistryEvent::RegistryClosed]);
}
