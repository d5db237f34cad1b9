//! Registry events and observers

use serde::Serialize;

/// Broadcast to anyone subscribed via `DownstreamRegistry::subscribe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    ServerAdded {
        control_name: String,
        tool_count: usize,
    },
    ServerRemoved {
        control_name: String,
        tool_control_names: Vec<String>,
    },
    RegistryClosed,
}

/// Synchronous hook run inside `remove_server`, before it returns.
///
/// Used for reconciliation: whatever holds references to registry
/// identifiers must drop them here so no stale name outlives the removal.
pub trait RegistryObserver: Send + Sync {
    fn on_server_removed(&self, control_name: &str, tool_control_names: &[String]);
}
