//! Downstream connection abstraction
//!
//! The registry only talks to connections through [`DownstreamConnection`]
//! and builds them through a [`ConnectionFactory`], so tests can swap the
//! rmcp-backed implementation for scripted mocks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mcpcomposer_core::{DownstreamServerConfig, Result, Tool};
use serde::Serialize;

use crate::scope::ResourceScope;

/// Lifecycle of a single downstream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Initialized,
    ShutDown,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::ShutDown => "shut down",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live connection to a downstream MCP server.
///
/// The connection owns its transport exclusively. `initialize` must also
/// register a release action in the shared scope so the transport is torn
/// down when the scope closes, even if `shutdown` is never called.
#[async_trait]
pub trait DownstreamConnection: Send + Sync {
    /// Immutable identity, copied from the config
    fn control_name(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Establish the transport. `Config` error for a bad descriptor,
    /// `Connection` error if the transport cannot be established.
    async fn initialize(&self, scope: &ResourceScope) -> Result<()>;

    /// Query the live connection for its tool catalogue, in server order
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Close the transport. Idempotent; never fails on a closed connection.
    async fn shutdown(&self) -> Result<()>;
}

impl fmt::Debug for dyn DownstreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownstreamConnection")
            .field("control_name", &self.control_name())
            .field("state", &self.state())
            .finish()
    }
}

/// Builds (uninitialized) connections from configs
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, config: &DownstreamServerConfig) -> Arc<dyn DownstreamConnection>;
}
