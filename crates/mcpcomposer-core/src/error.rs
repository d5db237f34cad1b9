//! Error taxonomy shared by every McpComposer crate
//!
//! Errors carry enough structure for the boundary layer to pick an outcome
//! (not found, conflict, internal) without parsing messages.

use std::fmt;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// What kind of thing a lookup or uniqueness check was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Server,
    Tool,
    ServerKit,
    Gateway,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Tool => "tool",
            Self::ServerKit => "server kit",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    NotFound,
    Conflict,
    InvalidState,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed connection descriptor, invalid name or unreadable config
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport failure talking to a downstream server (never retried)
    #[error("connection to '{server}' failed: {message}")]
    Connection { server: String, message: String },

    #[error("{resource} '{name}' not found")]
    NotFound { resource: Resource, name: String },

    #[error("{resource} '{name}' already exists")]
    Conflict { resource: Resource, name: String },

    /// Operation not permitted in the current lifecycle state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn connection(server: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Connection {
            server: server.into(),
            message: message.to_string(),
        }
    }

    pub fn not_found(resource: Resource, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            name: name.into(),
        }
    }

    pub fn conflict(resource: Resource, name: impl Into<String>) -> Self {
        Self::Conflict {
            resource,
            name: name.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: impl fmt::Display) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
