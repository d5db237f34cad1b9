//! Test: rmcp downstream connections over Streamable HTTP
//!
//! Validates that:
//! 1. The rmcp connection performs the handshake and lists tools
//! 2. The registry indexes tools from a live server under derived control names
//! 3. Shutdown and scope release tear the session down exactly once

use std::sync::Arc;
use std::time::Duration;

use mcpcomposer_core::{DownstreamServerConfig, ErrorKind, TimeoutSettings};
use mcpcomposer_gateway::{Composer, DownstreamRegistry, RegistryState};
use mcpcomposer_mcp::{
    ConnectionState, DownstreamConnection, ResourceScope, RmcpConnection, RmcpConnectionFactory,
};
use pretty_assertions::assert_eq;
use rmcp::{
    model::*,
    service::RequestContext,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ErrorData as McpError, RoleServer, ServerHandler,
};
use tokio_util::sync::CancellationToken;

/// Serves a fixed tool list
#[derive(Clone)]
struct ToolServer {
    tools: Arc<Vec<&'static str>>,
}

impl ToolServer {
    fn new(tools: &[&'static str]) -> Self {
        Self {
            tools: Arc::new(tools.to_vec()),
        }
    }
}

impl ServerHandler for ToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "test-tool-server".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let schema: Arc<serde_json::Map<String, serde_json::Value>> = Arc::new(
            serde_json::from_value(serde_json::json!({"type": "object", "properties": {}}))
                .unwrap(),
        );
        let tools = self
            .tools
            .iter()
            .map(|name| Tool::new(*name, format!("Test tool: {}", name), schema.clone()))
            .collect();
        Ok(ListToolsResult::with_all_items(tools))
    }
}

/// Start a test server and return the URL and cancellation token
async fn start_test_server(handler: ToolServer) -> (String, CancellationToken) {
    let ct = CancellationToken::new();

    let service = StreamableHttpService::new(
        move || Ok(handler.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
            cancellation_token: ct.child_token(),
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().unwrap();
    let url = format!("http://127.0.0.1:{}/mcp", addr.port());

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { ct_clone.cancelled().await })
            .await
            .unwrap();
    });

    // Give server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (url, ct)
}

fn timeouts() -> TimeoutSettings {
    TimeoutSettings {
        connect_secs: 5,
        request_secs: 5,
        shutdown_secs: 5,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_lists_tools() {
    let (url, ct) = start_test_server(ToolServer::new(&["search", "fetch"])).await;
    let connection = RmcpConnection::new(DownstreamServerConfig::http("web", &url), timeouts());
    let scope = ResourceScope::new();

    connection.initialize(&scope).await.expect("should connect");
    assert_eq!(connection.state(), ConnectionState::Initialized);
    assert_eq!(scope.len(), 1);

    let tools = connection.list_tools().await.expect("tools/list should work");
    let names: Vec<&str> = tools.iter().map(|t| t.control_name.as_str()).collect();
    assert_eq!(names, vec!["web_search", "web_fetch"]);
    assert_eq!(tools[0].description.as_deref(), Some("Test tool: search"));
    assert_eq!(tools[0].input_schema["type"], "object");

    connection.shutdown().await.expect("shutdown should succeed");
    assert_eq!(connection.state(), ConnectionState::ShutDown);

    // The release action finds the session already gone
    let report = scope.close().await;
    assert_eq!(report.released, 1);
    assert!(report.is_clean());

    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_initialize_twice_is_rejected() {
    let (url, ct) = start_test_server(ToolServer::new(&["search"])).await;
    let connection = RmcpConnection::new(DownstreamServerConfig::http("web", &url), timeouts());
    let scope = ResourceScope::new();

    connection.initialize(&scope).await.unwrap();
    let err = connection.initialize(&scope).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(scope.len(), 1);

    scope.close().await;
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_server_is_connection_error() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connection = RmcpConnection::new(
        DownstreamServerConfig::http("gone", format!("http://127.0.0.1:{}/mcp", port)),
        TimeoutSettings {
            connect_secs: 2,
            request_secs: 2,
            shutdown_secs: 2,
        },
    );
    let scope = ResourceScope::new();

    let err = connection.initialize(&scope).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(connection.state(), ConnectionState::Uninitialized);
    assert!(scope.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_silent_server_times_out_as_connection_error() {
    // Accepts TCP connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let ct = CancellationToken::new();
    let accept_ct = ct.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            tokio::select! {
                _ = accept_ct.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, _)) => held.push(socket),
                    Err(_) => break,
                },
            }
        }
    });

    let connection = RmcpConnection::new(
        DownstreamServerConfig::http("silent", format!("http://127.0.0.1:{}/mcp", port)),
        TimeoutSettings {
            connect_secs: 1,
            request_secs: 1,
            shutdown_secs: 1,
        },
    );
    let scope = ResourceScope::new();

    let started = std::time::Instant::now();
    let err = connection.initialize(&scope).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("timeout"), "unexpected error: {}", err);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(connection.state(), ConnectionState::Uninitialized);
    assert!(scope.is_empty());

    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_registry_over_streamable_http() {
    let (url_a, ct_a) = start_test_server(ToolServer::new(&["search", "fetch"])).await;
    let (url_b, ct_b) = start_test_server(ToolServer::new(&["query"])).await;

    let registry = Arc::new(DownstreamRegistry::new(Arc::new(RmcpConnectionFactory::new(
        timeouts(),
    ))));
    let composer = Composer::with_default_prefix(registry.clone());

    registry
        .initialize(&[
            DownstreamServerConfig::http("alpha", &url_a),
            DownstreamServerConfig::http("beta", &url_b),
        ])
        .await
        .expect("both servers should register");

    assert_eq!(
        registry.tool_control_names(),
        vec!["alpha_fetch", "alpha_search", "beta_query"]
    );

    let kit = composer
        .create_server_kit("dev")
        .with_server("alpha")
        .with_tool("alpha_search")
        .with_tool("beta_query");
    composer.add_gateway(kit).unwrap();
    let exposed = composer.exposed_tools("dev").unwrap();
    assert_eq!(exposed.len(), 1);
    assert_eq!(exposed[0].control_name, "alpha_search");

    assert_eq!(registry.tracked_resources(), 2);
    assert!(registry.remove_server("beta").await);
    assert_eq!(registry.tracked_resources(), 1);
    assert!(!composer
        .get_server_kit("dev")
        .unwrap()
        .is_tool_enabled("beta_query"));

    let report = registry.shutdown().await;
    assert_eq!(report.servers_shut_down, 1);
    // "beta" released its session when it was removed
    assert_eq!(report.resources_released, 1);
    assert!(report.failures.is_empty());
    assert!(report.release_failures.is_empty());
    assert_eq!(registry.state(), RegistryState::Closed);

    ct_a.cancel();
    ct_b.cancel();
}
