//! rmcp-backed downstream connections
//!
//! - Stdio: local process communication via child process
//! - HTTP: remote server communication via Streamable HTTP

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use mcpcomposer_core::{
    DownstreamServerConfig, Error, Result, TimeoutSettings, Tool, TransportConfig,
};
use rmcp::{
    model::{ClientCapabilities, ClientInfo, Implementation},
    service::RunningService,
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, ConfigureCommandExt,
        StreamableHttpClientTransport, TokioChildProcess,
    },
    ClientHandler, RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionFactory, ConnectionState, DownstreamConnection};
use crate::scope::ResourceScope;

/// Type alias for a connected MCP client
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Client handler presented to downstream servers
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
}

impl McpClientHandler {
    pub fn new(control_name: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("mcpcomposer-{}", control_name),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("McpComposer".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

impl ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// Apply platform-specific child process isolation.
///
/// Unix: a new process group keeps terminal signals (SIGINT, SIGTSTP) sent to
/// the composer from reaching downstream servers.
/// Windows: CREATE_NO_WINDOW stops a console window from flashing up.
pub fn configure_child_process_platform(cmd: &mut Command) {
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
}

/// Parse a command string that may contain embedded arguments.
///
/// - "docker run -i --rm image" → ("docker", ["run", "-i", "--rm", "image"])
/// - "node" with args ["server.js"] → ("node", ["server.js"])
///
/// Separate args win: the command is then taken as-is.
pub fn parse_command(command: &str, args: &[String]) -> Result<(String, Vec<String>)> {
    if !args.is_empty() || !command.contains(' ') {
        return Ok((command.to_string(), args.to_vec()));
    }

    let mut parts = shell_words::split(command).map_err(|e| {
        Error::config(format!("failed to parse command '{}': {}", command, e))
    })?;
    if parts.is_empty() {
        return Err(Error::config("empty command after parsing"));
    }
    let executable = parts.remove(0);
    Ok((executable, parts))
}

/// Build a reqwest HeaderMap from configured headers
pub fn build_header_map(headers: &HashMap<String, String>) -> Result<reqwest::header::HeaderMap> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name '{}': {}", key, e)))?;
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid header value for '{}': {}", key, e)))?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}

/// Convert an rmcp tool into a composer tool owned by `server`
pub fn convert_tool(server: &str, tool: rmcp::model::Tool) -> Tool {
    Tool::new(
        server,
        tool.name.to_string(),
        tool.description.as_ref().map(|d| d.to_string()),
        Value::Object((*tool.input_schema).clone()),
    )
}

/// Cancel the session held in `slot`, if any. Returns whether one was closed.
async fn release_client(slot: &Mutex<Option<McpClient>>, timeout: Duration) -> anyhow::Result<bool> {
    let client = slot.lock().await.take();
    let Some(client) = client else {
        return Ok(false);
    };
    tokio::time::timeout(timeout, client.cancel())
        .await
        .context("Timed out cancelling MCP session")?
        .context("MCP session task failed")?;
    Ok(true)
}

/// Connection to a downstream server over rmcp
pub struct RmcpConnection {
    config: DownstreamServerConfig,
    timeouts: TimeoutSettings,
    state: parking_lot::Mutex<ConnectionState>,
    client: Arc<Mutex<Option<McpClient>>>,
}

impl RmcpConnection {
    pub fn new(config: DownstreamServerConfig, timeouts: TimeoutSettings) -> Self {
        Self {
            config,
            timeouts,
            state: parking_lot::Mutex::new(ConnectionState::Uninitialized),
            client: Arc::new(Mutex::new(None)),
        }
    }

    fn handshake_outcome<E: std::fmt::Display>(
        &self,
        outcome: std::result::Result<std::result::Result<McpClient, E>, Elapsed>,
    ) -> Result<McpClient> {
        match outcome {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e)) => Err(Error::connection(
                self.control_name(),
                format!("MCP handshake failed: {}", e),
            )),
            Err(_) => Err(Error::connection(
                self.control_name(),
                format!("connection timeout ({:?})", self.timeouts.connect()),
            )),
        }
    }

    async fn connect_stdio(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<McpClient> {
        let (executable, args) = parse_command(command, args)?;

        let command_path = which::which(&executable).map_err(|_| {
            Error::connection(
                self.control_name(),
                format!(
                    "command not found: {}. Ensure it's installed and in PATH.",
                    executable
                ),
            )
        })?;
        debug!(server = %self.control_name(), path = ?command_path, args = ?args, "Found command");

        let env = env.clone();
        let transport = TokioChildProcess::new(Command::new(&command_path).configure(move |cmd| {
            cmd.args(&args)
                .envs(&env)
                .stderr(Stdio::null())
                .kill_on_drop(true);
            configure_child_process_platform(cmd);
        }))
        .map_err(|e| {
            Error::connection(self.control_name(), format!("failed to spawn process: {}", e))
        })?;

        let handler = McpClientHandler::new(self.control_name());
        let outcome = tokio::time::timeout(self.timeouts.connect(), handler.serve(transport)).await;
        self.handshake_outcome(outcome)
    }

    async fn connect_http(&self, url: &str, headers: &HashMap<String, String>) -> Result<McpClient> {
        let header_map = build_header_map(headers)?;
        if !header_map.is_empty() {
            debug!(server = %self.control_name(), header_count = header_map.len(), "Applying configured headers");
        }

        let http_client = reqwest::Client::builder()
            .default_headers(header_map)
            .build()
            .map_err(|e| {
                Error::connection(self.control_name(), format!("failed to build HTTP client: {}", e))
            })?;

        let transport = StreamableHttpClientTransport::with_client(
            http_client,
            StreamableHttpClientTransportConfig::with_uri(url),
        );

        let handler = McpClientHandler::new(self.control_name());
        let outcome = tokio::time::timeout(self.timeouts.connect(), handler.serve(transport)).await;
        self.handshake_outcome(outcome)
    }
}

#[async_trait]
impl DownstreamConnection for RmcpConnection {
    fn control_name(&self) -> &str {
        &self.config.control_name
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn initialize(&self, scope: &ResourceScope) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Uninitialized {
            return Err(Error::invalid_state("initialize connection", state));
        }

        let transport = self.config.transport()?;
        info!(
            server = %self.control_name(),
            transport = %transport.description(),
            "Connecting to downstream server"
        );

        let client = match &transport {
            TransportConfig::Stdio { command, args, env } => {
                self.connect_stdio(command, args, env).await?
            }
            TransportConfig::Http { url, headers } => self.connect_http(url, headers).await?,
        };
        *self.client.lock().await = Some(client);

        let slot = Arc::clone(&self.client);
        let shutdown_timeout = self.timeouts.shutdown();
        let registered = scope.push(self.control_name(), move || async move {
            release_client(&slot, shutdown_timeout).await.map(|_| ())
        });
        if let Err(e) = registered {
            // Nobody would release the session for us
            if let Err(release_err) = release_client(&self.client, shutdown_timeout).await {
                warn!(server = %self.control_name(), error = %format!("{:#}", release_err), "Failed to release unregistered session");
            }
            *self.state.lock() = ConnectionState::ShutDown;
            return Err(e);
        }

        *self.state.lock() = ConnectionState::Initialized;
        info!(server = %self.control_name(), "Downstream server connected");
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| {
            Error::connection(self.control_name(), format!("connection is {}", self.state()))
        })?;

        let tools = tokio::time::timeout(self.timeouts.request(), client.list_all_tools())
            .await
            .map_err(|_| {
                Error::connection(
                    self.control_name(),
                    format!("tools/list timed out after {:?}", self.timeouts.request()),
                )
            })?
            .map_err(|e| Error::connection(self.control_name(), format!("tools/list failed: {}", e)))?;

        debug!(server = %self.control_name(), tool_count = tools.len(), "Retrieved tools");
        Ok(tools
            .into_iter()
            .map(|tool| convert_tool(self.control_name(), tool))
            .collect())
    }

    async fn shutdown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.lock(), ConnectionState::ShutDown);
        if previous != ConnectionState::Initialized {
            return Ok(());
        }

        info!(server = %self.control_name(), "Disconnecting from downstream server");
        release_client(&self.client, self.timeouts.shutdown())
            .await
            .map(|_| ())
            .map_err(|e| Error::connection(self.control_name(), format!("{:#}", e)))
    }
}

/// Production factory: one [`RmcpConnection`] per config
#[derive(Debug, Clone, Default)]
pub struct RmcpConnectionFactory {
    timeouts: TimeoutSettings,
}

impl RmcpConnectionFactory {
    pub fn new(timeouts: TimeoutSettings) -> Self {
        Self { timeouts }
    }
}

impl ConnectionFactory for RmcpConnectionFactory {
    fn create(&self, config: &DownstreamServerConfig) -> Arc<dyn DownstreamConnection> {
        Arc::new(RmcpConnection::new(config.clone(), self.timeouts))
    }
}
