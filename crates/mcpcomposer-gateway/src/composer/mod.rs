//! Composer - server kits and gateways over the downstream registry
//!
//! The composer never owns connections. It stores control names in kits and
//! validates every mutation against the live registry. Kits become persisted
//! once a gateway is built from them.

mod store;

pub use store::GatewayStore;

use std::sync::Arc;

use mcpcomposer_core::{
    validate_gateway_name, Error, Gateway, GatewayView, Resource, Result, ServerKit, Tool,
    DEFAULT_ENDPOINT_PREFIX,
};
use tracing::info;

use crate::registry::DownstreamRegistry;

pub struct Composer {
    registry: Arc<DownstreamRegistry>,
    store: Arc<GatewayStore>,
    endpoint_prefix: String,
}

impl Composer {
    /// Build a composer and subscribe its gateway store to registry removals
    pub fn new(registry: Arc<DownstreamRegistry>, endpoint_prefix: impl Into<String>) -> Self {
        let store = Arc::new(GatewayStore::new());
        registry.add_observer(store.clone());
        Self {
            registry,
            store,
            endpoint_prefix: endpoint_prefix.into(),
        }
    }

    pub fn with_default_prefix(registry: Arc<DownstreamRegistry>) -> Self {
        Self::new(registry, DEFAULT_ENDPOINT_PREFIX)
    }

    pub fn registry(&self) -> &Arc<DownstreamRegistry> {
        &self.registry
    }

    pub fn endpoint_prefix(&self) -> &str {
        &self.endpoint_prefix
    }

    // ---- Server kits ----

    /// Fresh, empty kit. Nothing is stored until it is passed to `add_gateway`.
    pub fn create_server_kit(&self, name: impl Into<String>) -> ServerKit {
        ServerKit::new(name)
    }

    pub fn list_server_kits(&self) -> Vec<ServerKit> {
        self.store.kits()
    }

    pub fn get_server_kit(&self, name: &str) -> Result<ServerKit> {
        self.store
            .kits()
            .into_iter()
            .find(|k| k.name == name)
            .ok_or_else(|| Error::not_found(Resource::ServerKit, name))
    }

    pub fn enable_server_kit(&self, name: &str) -> Result<ServerKit> {
        self.set_kit_enabled(name, true)
    }

    pub fn disable_server_kit(&self, name: &str) -> Result<ServerKit> {
        self.set_kit_enabled(name, false)
    }

    fn set_kit_enabled(&self, name: &str, enabled: bool) -> Result<ServerKit> {
        let kit = self.store.with_kit_mut(name, |kit| {
            kit.enabled = enabled;
            Ok(kit.clone())
        })?;
        info!(kit = %name, enabled, "Server kit toggled");
        Ok(kit)
    }

    pub fn enable_server(&self, kit_name: &str, server_name: &str) -> Result<ServerKit> {
        self.store.with_kit_mut(kit_name, |kit| {
            self.require_server(server_name)?;
            if kit.enable_server(server_name) {
                info!(kit = %kit_name, server = %server_name, "Server enabled");
            }
            Ok(kit.clone())
        })
    }

    pub fn disable_server(&self, kit_name: &str, server_name: &str) -> Result<ServerKit> {
        self.store.with_kit_mut(kit_name, |kit| {
            self.require_server(server_name)?;
            if kit.disable_server(server_name) {
                info!(kit = %kit_name, server = %server_name, "Server disabled");
            }
            Ok(kit.clone())
        })
    }

    pub fn enable_tool(&self, kit_name: &str, tool_name: &str) -> Result<ServerKit> {
        self.store.with_kit_mut(kit_name, |kit| {
            self.require_tool(tool_name)?;
            if kit.enable_tool(tool_name) {
                info!(kit = %kit_name, tool = %tool_name, "Tool enabled");
            }
            Ok(kit.clone())
        })
    }

    pub fn disable_tool(&self, kit_name: &str, tool_name: &str) -> Result<ServerKit> {
        self.store.with_kit_mut(kit_name, |kit| {
            self.require_tool(tool_name)?;
            if kit.disable_tool(tool_name) {
                info!(kit = %kit_name, tool = %tool_name, "Tool disabled");
            }
            Ok(kit.clone())
        })
    }

    fn require_server(&self, server_name: &str) -> Result<()> {
        if self.registry.contains_server(server_name) {
            Ok(())
        } else {
            Err(Error::not_found(Resource::Server, server_name))
        }
    }

    fn require_tool(&self, tool_name: &str) -> Result<()> {
        if self.registry.contains_tool(tool_name) {
            Ok(())
        } else {
            Err(Error::not_found(Resource::Tool, tool_name))
        }
    }

    /// Every server and tool the kit references must be registered
    fn validate_kit(&self, kit: &ServerKit) -> Result<()> {
        for server in &kit.servers_enabled {
            self.require_server(server)?;
        }
        for tool in &kit.tools_enabled {
            self.require_tool(tool)?;
        }
        Ok(())
    }

    // ---- Gateways ----

    /// Persist a gateway bound to `kit`. The gateway takes the kit's name.
    pub fn add_gateway(&self, kit: ServerKit) -> Result<GatewayView> {
        validate_gateway_name(&kit.name)?;

        let mut gateways = self.store.lock();
        if gateways.iter().any(|g| g.name == kit.name) {
            return Err(Error::conflict(Resource::Gateway, &kit.name));
        }
        self.validate_kit(&kit)?;

        let gateway = Gateway::new(kit, &self.endpoint_prefix);
        let view = gateway.view();
        gateways.push(gateway);

        info!(
            gateway = %view.name,
            endpoint = %view.gateway_endpoint,
            servers = view.server_kit.servers_enabled.len(),
            tools = view.server_kit.tools_enabled.len(),
            "Gateway added"
        );
        Ok(view)
    }

    pub fn remove_gateway(&self, name: &str) -> Result<GatewayView> {
        let gateway = self.store.remove(name)?;
        info!(gateway = %name, "Gateway removed");
        Ok(gateway.view())
    }

    pub fn list_gateways(&self) -> Vec<GatewayView> {
        self.store.list().iter().map(GatewayView::from).collect()
    }

    pub fn get_gateway(&self, name: &str) -> Result<GatewayView> {
        self.store
            .get(name)
            .map(|g| g.view())
            .ok_or_else(|| Error::not_found(Resource::Gateway, name))
    }

    /// Registry tools visible through a gateway, in registration order
    pub fn exposed_tools(&self, gateway_name: &str) -> Result<Vec<Tool>> {
        let gateway = self
            .store
            .get(gateway_name)
            .ok_or_else(|| Error::not_found(Resource::Gateway, gateway_name))?;
        let kit = &gateway.server_kit;
        if !kit.enabled {
            return Ok(Vec::new());
        }
        Ok(self
            .registry
            .all_tools()
            .into_iter()
            .filter(|tool| kit.exposes(tool))
            .collect())
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("endpoint_prefix", &self.endpoint_prefix)
            .field("gateways", &self.store.len())
            .finish()
    }
}
