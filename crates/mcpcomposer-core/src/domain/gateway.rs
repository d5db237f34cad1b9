//! Gateway entity - a named binding of one ServerKit to an endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::server_kit::ServerKit;
use crate::error::{Error, Result};

/// Default prefix for derived gateway endpoints
pub const DEFAULT_ENDPOINT_PREFIX: &str = "/gateways";

/// Derive the endpoint a gateway is reachable at.
///
/// Deterministic in the prefix and the name: `{prefix}/{name}/mcp`.
pub fn gateway_endpoint(prefix: &str, name: &str) -> String {
    format!("{}/{}/mcp", prefix.trim_end_matches('/'), name)
}

/// Gateway names become a path segment, so only URL-safe characters are allowed.
pub fn validate_gateway_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("gateway name must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::config(format!(
            "gateway name '{}' may only contain letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub name: String,
    pub endpoint: String,
    pub server_kit: ServerKit,
    pub created_at: DateTime<Utc>,
}

impl Gateway {
    /// Bind a kit; the gateway takes the kit's name
    pub fn new(server_kit: ServerKit, endpoint_prefix: &str) -> Self {
        Self {
            name: server_kit.name.clone(),
            endpoint: gateway_endpoint(endpoint_prefix, &server_kit.name),
            server_kit,
            created_at: Utc::now(),
        }
    }

    pub fn view(&self) -> GatewayView {
        GatewayView::from(self)
    }
}

/// Boundary representation of a gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayView {
    pub name: String,
    pub gateway_endpoint: String,
    pub server_kit: ServerKit,
}

impl From<&Gateway> for GatewayView {
    fn from(gateway: &Gateway) -> Self {
        Self {
            name: gateway.name.clone(),
            gateway_endpoint: gateway.endpoint.clone(),
            server_kit: gateway.server_kit.clone(),
        }
    }
}
