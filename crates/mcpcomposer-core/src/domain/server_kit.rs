//! ServerKit - a named selection of enabled servers and tools
//!
//! A kit is a capability view over the registry. It only stores control
//! names; validation against the live registry happens in the composer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::tool::Tool;

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerKit {
    pub name: String,

    /// Whole-kit exposure flag, independent of the per-item sets
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub servers_enabled: BTreeSet<String>,

    #[serde(default)]
    pub tools_enabled: BTreeSet<String>,
}

impl ServerKit {
    /// Empty, enabled kit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            servers_enabled: BTreeSet::new(),
            tools_enabled: BTreeSet::new(),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.servers_enabled.insert(server.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools_enabled.insert(tool.into());
        self
    }

    /// Returns true if the set changed
    pub fn enable_server(&mut self, server: &str) -> bool {
        self.servers_enabled.insert(server.to_string())
    }

    pub fn disable_server(&mut self, server: &str) -> bool {
        self.servers_enabled.remove(server)
    }

    pub fn enable_tool(&mut self, tool: &str) -> bool {
        self.tools_enabled.insert(tool.to_string())
    }

    pub fn disable_tool(&mut self, tool: &str) -> bool {
        self.tools_enabled.remove(tool)
    }

    pub fn is_server_enabled(&self, server: &str) -> bool {
        self.servers_enabled.contains(server)
    }

    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        self.tools_enabled.contains(tool)
    }

    /// Whether a tool is visible through this kit.
    ///
    /// A tool is exposed only when the kit is enabled, its owning server is
    /// enabled and the tool itself is enabled. A tool enabled under a
    /// disabled server stays hidden.
    pub fn exposes(&self, tool: &Tool) -> bool {
        self.enabled
            && self.is_server_enabled(&tool.server_control_name)
            && self.is_tool_enabled(&tool.control_name)
    }

    /// Strip a removed server and its tools. Returns true if anything changed.
    pub fn purge_server(&mut self, server: &str, tool_control_names: &[String]) -> bool {
        let mut changed = self.servers_enabled.remove(server);
        for tool in tool_control_names {
            changed |= self.tools_enabled.remove(tool);
        }
        changed
    }
}
