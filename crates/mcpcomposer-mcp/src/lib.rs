//! # McpComposer MCP Library
//!
//! Downstream connections to MCP servers and the shared resource scope
//! that guarantees their transports are released.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ResourceScope                        │
//! │   [release github] [release search] [release files]  ←  │
//! │             closed LIFO, exactly once                    │
//! └──────────────────────────────────────────────────────────┘
//!                            ▲ registers
//! ┌──────────────────────────┴───────────────────────────────┐
//! │                     RmcpConnection                       │
//! │  ┌──────────────────┐  ┌──────────────────────────────┐  │
//! │  │  Stdio (child    │  │  Streamable HTTP (reqwest    │  │
//! │  │  process)        │  │  client + headers)           │  │
//! │  └──────────────────┘  └──────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcpcomposer_core::{DownstreamServerConfig, TimeoutSettings};
//! use mcpcomposer_mcp::{ConnectionFactory, ResourceScope, RmcpConnectionFactory};
//!
//! let scope = ResourceScope::new();
//! let factory = RmcpConnectionFactory::new(TimeoutSettings::default());
//! let connection = factory.create(&DownstreamServerConfig::stdio(
//!     "github",
//!     "npx",
//!     vec!["-y".into(), "@modelcontextprotocol/server-github".into()],
//! ));
//!
//! connection.initialize(&scope).await?;
//! let tools = connection.list_tools().await?;
//! scope.close().await;
//! ```

pub mod connection;
pub mod scope;
pub mod transports;

pub use connection::{ConnectionFactory, ConnectionState, DownstreamConnection};
pub use scope::{ReleaseReport, ResourceKey, ResourceScope};
pub use transports::{
    configure_child_process_platform, McpClient, McpClientHandler, RmcpConnection,
    RmcpConnectionFactory,
};
