//! In-memory gateway store
//!
//! Gateways (and the kits they own) live here in creation order. The store
//! is registered as a registry observer so removed servers are stripped from
//! every kit before `remove_server` returns.

use mcpcomposer_core::{Error, Gateway, Resource, Result, ServerKit};
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::registry::RegistryObserver;

#[derive(Debug, Default)]
pub struct GatewayStore {
    gateways: RwLock<Vec<Gateway>>,
}

impl GatewayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.gateways.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.gateways.read().iter().any(|g| g.name == name)
    }

    pub fn get(&self, name: &str) -> Option<Gateway> {
        self.gateways.read().iter().find(|g| g.name == name).cloned()
    }

    pub fn list(&self) -> Vec<Gateway> {
        self.gateways.read().clone()
    }

    pub fn kits(&self) -> Vec<ServerKit> {
        self.gateways
            .read()
            .iter()
            .map(|g| g.server_kit.clone())
            .collect()
    }

    /// Write access for check-then-insert sequences
    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, Vec<Gateway>> {
        self.gateways.write()
    }

    pub fn remove(&self, name: &str) -> Result<Gateway> {
        let mut gateways = self.gateways.write();
        let position = gateways
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| Error::not_found(Resource::Gateway, name))?;
        Ok(gateways.remove(position))
    }

    /// Run `f` against the kit named `kit_name` while holding the write lock
    pub(crate) fn with_kit_mut<T>(
        &self,
        kit_name: &str,
        f: impl FnOnce(&mut ServerKit) -> Result<T>,
    ) -> Result<T> {
        let mut gateways = self.gateways.write();
        let gateway = gateways
            .iter_mut()
            .find(|g| g.server_kit.name == kit_name)
            .ok_or_else(|| Error::not_found(Resource::ServerKit, kit_name))?;
        f(&mut gateway.server_kit)
    }
}

impl RegistryObserver for GatewayStore {
    fn on_server_removed(&self, control_name: &str, tool_control_names: &[String]) {
        let mut gateways = self.gateways.write();
        for gateway in gateways.iter_mut() {
            if gateway.server_kit.purge_server(control_name, tool_control_names) {
                debug!(
                    gateway = %gateway.name,
                    server = %control_name,
                    "Purged removed server from server kit"
                );
            }
        }
    }
}
