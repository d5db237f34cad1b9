//! Tool descriptors discovered from downstream servers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delimiter between the server and tool parts of a tool control name
pub const TOOL_NAME_SEPARATOR: char = '_';

/// Combine a server control name and a tool name into a tool control name.
///
/// Server names may themselves contain the separator, so the result is not
/// reversible and uniqueness is checked at registration.
pub fn tool_control_name(server_control_name: &str, tool_name: &str) -> String {
    format!("{}{}{}", server_control_name, TOOL_NAME_SEPARATOR, tool_name)
}

/// Immutable tool descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub control_name: String,
    /// Owning server (informational back-reference)
    pub server_control_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

impl Tool {
    pub fn new(
        server_control_name: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        input_schema: Value,
    ) -> Self {
        let server_control_name = server_control_name.into();
        let name = name.into();
        Self {
            control_name: tool_control_name(&server_control_name, &name),
            server_control_name,
            name,
            description,
            input_schema,
        }
    }
}
