//! ControlPlane - boundary adapter for the request-handling layer
//!
//! Every operation returns `Result<T, ControlError>`. Errors are mapped to a
//! coarse status; unexpected failures are logged here and replaced by a
//! generic message so internal error text never reaches callers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use mcpcomposer_core::{DownstreamServerConfig, Error, ErrorKind, GatewayView, ServerKit};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::composer::Composer;
use crate::registry::DownstreamRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    NotFound,
    Conflict,
    Internal,
}

impl ControlStatus {
    /// HTTP status code the boundary should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlError {
    pub status: ControlStatus,
    pub message: String,
}

impl ControlError {
    fn new(status: ControlStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.status, self.message)
    }
}

impl std::error::Error for ControlError {}

pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// Acknowledgment body for server mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub message: String,
}

impl ControlMessage {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One registered server as reported by `list_servers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub control_name: String,
    pub tools: Vec<String>,
}

/// Kit contents accepted by `add_gateway`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitSelection {
    #[serde(default)]
    pub servers_enabled: BTreeSet<String>,
    #[serde(default)]
    pub tools_enabled: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddGatewayRequest {
    pub name: String,
    #[serde(default)]
    pub server_kit: KitSelection,
}

/// Default mapping for domain errors that carry safe, caller-facing text
fn map_error(err: Error, context: &str) -> ControlError {
    match err.kind() {
        ErrorKind::NotFound => ControlError::new(ControlStatus::NotFound, err.to_string()),
        ErrorKind::Conflict | ErrorKind::InvalidState => {
            ControlError::new(ControlStatus::Conflict, err.to_string())
        }
        ErrorKind::Config => ControlError::new(ControlStatus::Internal, err.to_string()),
        ErrorKind::Connection | ErrorKind::Internal => {
            error!(error = %err, "Unexpected error while {}", context);
            ControlError::new(
                ControlStatus::Internal,
                format!("An unexpected error occurred while {}.", context),
            )
        }
    }
}

pub struct ControlPlane {
    registry: Arc<DownstreamRegistry>,
    composer: Arc<Composer>,
}

impl ControlPlane {
    pub fn new(registry: Arc<DownstreamRegistry>, composer: Arc<Composer>) -> Self {
        Self { registry, composer }
    }

    // ---- Servers ----

    pub async fn add_server(&self, config: DownstreamServerConfig) -> ControlResult<ControlMessage> {
        let name = config.control_name.clone();
        match self.registry.add_server(&config).await {
            Ok(()) => Ok(ControlMessage::new(format!(
                "Server '{}' added successfully.",
                name
            ))),
            Err(e) if e.kind() == ErrorKind::Conflict && self.registry.contains_server(&name) => {
                Err(ControlError::new(
                    ControlStatus::Conflict,
                    format!("Server with control name '{}' already exists.", name),
                ))
            }
            Err(e) if matches!(e.kind(), ErrorKind::Conflict | ErrorKind::InvalidState) => {
                Err(map_error(e, &format!("adding server '{}'", name)))
            }
            Err(e) => {
                error!(server = %name, error = %e, "Failed to add server");
                Err(ControlError::new(
                    ControlStatus::Internal,
                    format!("An unexpected error occurred while adding server '{}'.", name),
                ))
            }
        }
    }

    pub async fn remove_server(&self, control_name: &str) -> ControlResult<ControlMessage> {
        if !self.registry.remove_server(control_name).await {
            warn!(server = %control_name, "Remove requested for unknown server");
            return Err(ControlError::new(
                ControlStatus::NotFound,
                format!("Server with control name '{}' not found.", control_name),
            ));
        }
        Ok(ControlMessage::new(format!(
            "Server '{}' removed successfully.",
            control_name
        )))
    }

    pub fn list_servers(&self) -> Vec<ServerSummary> {
        self.registry
            .list_all_servers_tools()
            .into_iter()
            .map(|entry| ServerSummary {
                control_name: entry.control_name().to_string(),
                tools: entry.tool_control_names(),
            })
            .collect()
    }

    // ---- Server kits ----

    pub fn list_server_kits(&self) -> Vec<ServerKit> {
        self.composer.list_server_kits()
    }

    pub fn get_server_kit(&self, name: &str) -> ControlResult<ServerKit> {
        self.composer
            .get_server_kit(name)
            .map_err(|e| map_error(e, &format!("reading server kit '{}'", name)))
    }

    pub fn enable_server_kit(&self, name: &str) -> ControlResult<ServerKit> {
        self.composer
            .enable_server_kit(name)
            .map_err(|e| map_error(e, &format!("enabling server kit '{}'", name)))
    }

    pub fn disable_server_kit(&self, name: &str) -> ControlResult<ServerKit> {
        self.composer
            .disable_server_kit(name)
            .map_err(|e| map_error(e, &format!("disabling server kit '{}'", name)))
    }

    pub fn enable_server(&self, kit: &str, server_name: &str) -> ControlResult<ServerKit> {
        self.composer
            .enable_server(kit, server_name)
            .map_err(|e| map_error(e, &format!("enabling server '{}'", server_name)))
    }

    pub fn disable_server(&self, kit: &str, server_name: &str) -> ControlResult<ServerKit> {
        self.composer
            .disable_server(kit, server_name)
            .map_err(|e| map_error(e, &format!("disabling server '{}'", server_name)))
    }

    pub fn enable_tool(&self, kit: &str, tool_name: &str) -> ControlResult<ServerKit> {
        self.composer
            .enable_tool(kit, tool_name)
            .map_err(|e| map_error(e, &format!("enabling tool '{}'", tool_name)))
    }

    pub fn disable_tool(&self, kit: &str, tool_name: &str) -> ControlResult<ServerKit> {
        self.composer
            .disable_tool(kit, tool_name)
            .map_err(|e| map_error(e, &format!("disabling tool '{}'", tool_name)))
    }

    // ---- Gateways ----

    pub fn list_gateways(&self) -> Vec<GatewayView> {
        self.composer.list_gateways()
    }

    pub fn get_gateway(&self, name: &str) -> ControlResult<GatewayView> {
        self.composer
            .get_gateway(name)
            .map_err(|e| map_error(e, &format!("reading gateway '{}'", name)))
    }

    /// Build a fresh kit named after the gateway, copy the requested
    /// selection into it and persist the gateway
    pub fn add_gateway(&self, request: AddGatewayRequest) -> ControlResult<GatewayView> {
        let mut kit = self.composer.create_server_kit(&request.name);
        kit.servers_enabled = request.server_kit.servers_enabled;
        kit.tools_enabled = request.server_kit.tools_enabled;
        self.composer
            .add_gateway(kit)
            .map_err(|e| map_error(e, &format!("adding gateway '{}'", request.name)))
    }

    pub fn remove_gateway(&self, name: &str) -> ControlResult<GatewayView> {
        self.composer
            .remove_gateway(name)
            .map_err(|e| map_error(e, &format!("removing gateway '{}'", name)))
    }
}
