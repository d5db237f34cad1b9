//! Downstream server configuration
//!
//! Follows the standard MCP client layout used by editors and desktop apps:
//! transport fields (`command`/`args`/`env` OR `url`/`headers`) sit at the top
//! level of each entry. Exactly one of `command` and `url` must be present.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transport type for downstream connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Stdio,
    Http,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// Validated connection descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawned child process speaking MCP over stdin/stdout
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Streamable HTTP session
    Http {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl TransportConfig {
    pub fn transport_type(&self) -> TransportType {
        match self {
            Self::Stdio { .. } => TransportType::Stdio,
            Self::Http { .. } => TransportType::Http,
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            Self::Stdio { command, .. } => format!("stdio:{}", command),
            Self::Http { url, .. } => format!("http:{}", url),
        }
    }
}

/// Configuration for one downstream MCP server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamServerConfig {
    /// Unique identity of the server inside the registry
    #[serde(alias = "name")]
    pub control_name: String,

    // --- Stdio transport ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    // --- HTTP transport ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl DownstreamServerConfig {
    /// Create a stdio server config
    pub fn stdio(
        control_name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            control_name: control_name.into(),
            command: Some(command.into()),
            args,
            ..Default::default()
        }
    }

    /// Create an HTTP server config
    pub fn http(control_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            control_name: control_name.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Resolve the connection descriptor, enforcing that exactly one of
    /// `command` and `url` is set.
    pub fn transport(&self) -> Result<TransportConfig> {
        let command = self.command.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

        match (command, url) {
            (Some(command), None) => Ok(TransportConfig::Stdio {
                command: command.to_string(),
                args: self.args.clone(),
                env: self.env.clone(),
            }),
            (None, Some(url)) => {
                url::Url::parse(url).map_err(|e| {
                    Error::config(format!(
                        "server '{}' has an invalid url '{}': {}",
                        self.control_name, url, e
                    ))
                })?;
                Ok(TransportConfig::Http {
                    url: url.to_string(),
                    headers: self.headers.clone(),
                })
            }
            (Some(_), Some(_)) => Err(Error::config(format!(
                "server '{}' specifies both a command and a url",
                self.control_name
            ))),
            (None, None) => Err(Error::config(format!(
                "server '{}' specifies neither a command nor a url",
                self.control_name
            ))),
        }
    }

    /// Validate identity and descriptor without connecting
    pub fn validate(&self) -> Result<()> {
        validate_server_control_name(&self.control_name)?;
        self.transport().map(|_| ())
    }
}

/// Server control names must be non-empty and free of surrounding whitespace.
///
/// Any other character is accepted, including the `_` tool separator. Two
/// servers can therefore derive the same tool control name; the registry
/// rejects that case with `Conflict`.
pub fn validate_server_control_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::config("server control name must not be empty"));
    }
    if name.trim() != name {
        return Err(Error::config(format!(
            "server control name '{}' has leading or trailing whitespace",
            name
        )));
    }
    Ok(())
}
