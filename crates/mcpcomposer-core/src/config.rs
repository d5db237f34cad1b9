//! Composer configuration file
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "github": { "command": "npx", "args": ["-y", "@modelcontextprotocol/server-github"] },
//!     "search": { "url": "https://example.com/mcp" }
//!   },
//!   "gateways": {
//!     "dev": { "servers": ["github"], "tools": ["github_search_code"] }
//!   },
//!   "timeouts": { "connectSecs": 30, "requestSecs": 30, "shutdownSecs": 10 },
//!   "endpointPrefix": "/gateways"
//! }
//! ```
//!
//! Servers register in the order their keys appear in `mcpServers`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{DownstreamServerConfig, ServerKit, DEFAULT_ENDPOINT_PREFIX};
use crate::error::{Error, Result};

const DEFAULT_CONNECT_SECS: u64 = 30;
const DEFAULT_REQUEST_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_SECS: u64 = 10;

fn default_connect_secs() -> u64 {
    DEFAULT_CONNECT_SECS
}

fn default_request_secs() -> u64 {
    DEFAULT_REQUEST_SECS
}

fn default_shutdown_secs() -> u64 {
    DEFAULT_SHUTDOWN_SECS
}

fn default_enabled() -> bool {
    true
}

/// Upper bounds for every call made to a downstream server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    /// Transport establishment and MCP handshake
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    /// Requests on a live connection (tools/list)
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_SECS,
            request_secs: DEFAULT_REQUEST_SECS,
            shutdown_secs: DEFAULT_SHUTDOWN_SECS,
        }
    }
}

impl TimeoutSettings {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

/// A gateway entry in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl GatewayConfig {
    pub fn to_server_kit(&self, name: &str) -> ServerKit {
        let mut kit = ServerKit::new(name);
        kit.enabled = self.enabled;
        kit.servers_enabled.extend(self.servers.iter().cloned());
        kit.tools_enabled.extend(self.tools.iter().cloned());
        kit
    }
}

/// One `mcpServers` entry; the control name is the entry's key
#[derive(Debug, Deserialize)]
struct ServerEntry {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    mcp_servers: Map<String, Value>,
    #[serde(default)]
    gateways: Map<String, Value>,
    #[serde(default)]
    timeouts: TimeoutSettings,
    endpoint_prefix: Option<String>,
}

/// Parsed composer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Servers in registration order
    pub servers: Vec<DownstreamServerConfig>,
    /// Gateways to create after the registry is initialized
    pub gateways: Vec<ServerKit>,
    pub timeouts: TimeoutSettings,
    pub endpoint_prefix: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            gateways: Vec::new(),
            timeouts: TimeoutSettings::default(),
            endpoint_prefix: DEFAULT_ENDPOINT_PREFIX.to_string(),
        }
    }
}

impl ComposerConfig {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))
            .map_err(|e| Error::config(format!("{:#}", e)))?;
        let config = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            servers = config.servers.len(),
            gateways = config.gateways.len(),
            "Loaded composer configuration"
        );
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("malformed configuration: {}", e)))?;

        let servers = raw
            .mcp_servers
            .into_iter()
            .map(|(control_name, value)| {
                let entry: ServerEntry = serde_json::from_value(value).map_err(|e| {
                    Error::config(format!("server '{}' is malformed: {}", control_name, e))
                })?;
                Ok(DownstreamServerConfig {
                    control_name,
                    command: entry.command,
                    args: entry.args,
                    env: entry.env,
                    url: entry.url,
                    headers: entry.headers,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let gateways = raw
            .gateways
            .into_iter()
            .map(|(name, value)| {
                let gateway: GatewayConfig = serde_json::from_value(value).map_err(|e| {
                    Error::config(format!("gateway '{}' is malformed: {}", name, e))
                })?;
                Ok(gateway.to_server_kit(&name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            servers,
            gateways,
            timeouts: raw.timeouts,
            endpoint_prefix: raw
                .endpoint_prefix
                .unwrap_or_else(|| DEFAULT_ENDPOINT_PREFIX.to_string()),
        })
    }
}
