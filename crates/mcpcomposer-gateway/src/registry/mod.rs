//! DownstreamRegistry - authoritative set of live downstream connections
//!
//! Locking:
//! - `mutation_lock`: async mutex serializing initialize / add / remove /
//!   shutdown. Held across downstream I/O, so mutations never pipeline.
//! - `catalog`: reader/writer lock over the server map, registration order
//!   and tool index. Only write-locked for the non-suspending commit step of
//!   a mutation, so readers see either the old or the new state, never a mix.

mod events;

pub use events::{RegistryEvent, RegistryObserver};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mcpcomposer_core::{DownstreamServerConfig, Error, Resource, Result, Tool};
use mcpcomposer_mcp::{ConnectionFactory, DownstreamConnection, ResourceScope};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Registry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    #[default]
    Created,
    Initializing,
    Ready,
    ShuttingDown,
    Closed,
}

impl RegistryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting down",
            Self::Closed => "closed",
        }
    }

    fn accepts_mutations(&self) -> bool {
        matches!(self, Self::Created | Self::Initializing | Self::Ready)
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered connection with the tool list captured when it was added
#[derive(Clone)]
pub struct RegisteredServer {
    pub connection: Arc<dyn DownstreamConnection>,
    pub tools: Arc<[Tool]>,
}

impl RegisteredServer {
    pub fn control_name(&self) -> &str {
        self.connection.control_name()
    }

    pub fn tool_control_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.control_name.clone()).collect()
    }
}

impl fmt::Debug for RegisteredServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredServer")
            .field("control_name", &self.control_name())
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// Result of `DownstreamRegistry::shutdown`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections whose shutdown succeeded
    pub servers_shut_down: usize,
    /// `(control_name, error)` for connections whose shutdown failed
    pub failures: Vec<(String, String)>,
    /// Scope resources released
    pub resources_released: usize,
    /// `(label, error)` for release actions that failed
    pub release_failures: Vec<(String, String)>,
}

#[derive(Default)]
struct Catalog {
    /// Registration order
    entries: Vec<RegisteredServer>,
    servers: HashMap<String, Arc<dyn DownstreamConnection>>,
    tools: HashMap<String, Tool>,
}

impl Catalog {
    fn insert(&mut self, entry: RegisteredServer) {
        for tool in entry.tools.iter() {
            self.tools.insert(tool.control_name.clone(), tool.clone());
        }
        self.servers
            .insert(entry.control_name().to_string(), Arc::clone(&entry.connection));
        self.entries.push(entry);
    }

    fn remove(&mut self, control_name: &str) -> Option<RegisteredServer> {
        self.servers.remove(control_name)?;
        let position = self
            .entries
            .iter()
            .position(|e| e.control_name() == control_name)?;
        let entry = self.entries.remove(position);
        for tool in entry.tools.iter() {
            self.tools.remove(&tool.control_name);
        }
        Some(entry)
    }
}

/// Owns every downstream connection and the aggregated tool index
pub struct DownstreamRegistry {
    factory: Arc<dyn ConnectionFactory>,
    scope: ResourceScope,
    mutation_lock: Mutex<()>,
    state: RwLock<RegistryState>,
    catalog: RwLock<Catalog>,
    observers: RwLock<Vec<Arc<dyn RegistryObserver>>>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl DownstreamRegistry {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            factory,
            scope: ResourceScope::new(),
            mutation_lock: Mutex::new(()),
            state: RwLock::new(RegistryState::Created),
            catalog: RwLock::new(Catalog::default()),
            observers: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    pub fn state(&self) -> RegistryState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    /// Register a reconciliation hook run by `remove_server`
    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of release actions currently tracked by the shared scope
    pub fn tracked_resources(&self) -> usize {
        self.scope.len()
    }

    /// Register the initial servers in order.
    ///
    /// Runs once. The first failure aborts the rest of the sequence; servers
    /// registered before it stay registered and the registry still becomes
    /// ready.
    pub async fn initialize(&self, configs: &[DownstreamServerConfig]) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        {
            let mut state = self.state.write();
            if *state != RegistryState::Created {
                return Err(Error::invalid_state("initialize the registry", *state));
            }
            *state = RegistryState::Initializing;
        }

        info!(server_count = configs.len(), "Initializing downstream registry");
        let mut outcome = Ok(());
        for config in configs {
            if let Err(e) = self.register(config).await {
                error!(
                    server = %config.control_name,
                    error = %e,
                    "Initialization aborted; servers registered so far are kept"
                );
                outcome = Err(e);
                break;
            }
        }

        *self.state.write() = RegistryState::Ready;
        outcome
    }

    /// Connect to a new downstream server and index its tools.
    ///
    /// Fails with `Conflict` if the control name is already registered or a
    /// derived tool control name is taken.
    pub async fn add_server(&self, config: &DownstreamServerConfig) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        let state = self.state();
        if !state.accepts_mutations() {
            return Err(Error::invalid_state("add a server", state));
        }
        self.register(config).await
    }

    /// Caller holds `mutation_lock`
    async fn register(&self, config: &DownstreamServerConfig) -> Result<()> {
        config.validate()?;
        let control_name = config.control_name.as_str();
        if self.catalog.read().servers.contains_key(control_name) {
            return Err(Error::conflict(Resource::Server, control_name));
        }

        info!(server = %control_name, "Adding downstream server");
        let connection = self.factory.create(config);
        if let Err(e) = connection.initialize(&self.scope).await {
            self.discard(connection.as_ref()).await;
            return Err(e);
        }

        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                self.discard(connection.as_ref()).await;
                return Err(e);
            }
        };

        if let Some(duplicate) = self.first_tool_collision(&tools) {
            warn!(server = %control_name, tool = %duplicate, "Tool control name collision");
            self.discard(connection.as_ref()).await;
            return Err(Error::conflict(Resource::Tool, duplicate));
        }

        let tool_count = tools.len();
        self.catalog.write().insert(RegisteredServer {
            connection,
            tools: tools.into(),
        });

        info!(server = %control_name, tool_count, "Downstream server added");
        self.emit(RegistryEvent::ServerAdded {
            control_name: control_name.to_string(),
            tool_count,
        });
        Ok(())
    }

    fn first_tool_collision(&self, tools: &[Tool]) -> Option<String> {
        let catalog = self.catalog.read();
        let mut seen = std::collections::HashSet::new();
        tools
            .iter()
            .find(|t| catalog.tools.contains_key(&t.control_name) || !seen.insert(&t.control_name))
            .map(|t| t.control_name.clone())
    }

    /// Remove a server, shut its connection down and purge its tools.
    ///
    /// A no-op when the control name is unknown. Tools are purged using the
    /// list captured at add time; the connection is never queried again.
    /// The release actions the connection registered leave the shared scope.
    /// Observers are notified before this returns. Returns whether a server
    /// was removed.
    pub async fn remove_server(&self, control_name: &str) -> bool {
        let _guard = self.mutation_lock.lock().await;

        let Some(connection) = self.find_server(control_name) else {
            debug!(server = %control_name, "Remove requested for unknown server");
            return false;
        };

        info!(server = %control_name, "Removing downstream server");
        if let Err(e) = connection.shutdown().await {
            warn!(server = %control_name, error = %e, "Downstream server did not shut down cleanly");
        }
        self.release_resources(control_name).await;

        let Some(entry) = self.catalog.write().remove(control_name) else {
            return false;
        };
        let tool_control_names = entry.tool_control_names();

        for observer in self.observers.read().iter() {
            observer.on_server_removed(control_name, &tool_control_names);
        }

        info!(server = %control_name, tool_count = tool_control_names.len(), "Downstream server removed");
        self.emit(RegistryEvent::ServerRemoved {
            control_name: control_name.to_string(),
            tool_control_names,
        });
        true
    }

    /// Shut every connection down, then close the shared scope.
    ///
    /// The scope is closed even if individual shutdowns fail. A second call
    /// returns an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let _guard = self.mutation_lock.lock().await;
        {
            let mut state = self.state.write();
            if matches!(*state, RegistryState::ShuttingDown | RegistryState::Closed) {
                return ShutdownReport::default();
            }
            *state = RegistryState::ShuttingDown;
        }

        let entries = std::mem::take(&mut *self.catalog.write()).entries;
        info!(server_count = entries.len(), "Shutting down downstream registry");

        let mut report = ShutdownReport::default();
        for entry in &entries {
            match entry.connection.shutdown().await {
                Ok(()) => report.servers_shut_down += 1,
                Err(e) => {
                    warn!(server = %entry.control_name(), error = %e, "Shutdown failed");
                    report
                        .failures
                        .push((entry.control_name().to_string(), e.to_string()));
                }
            }
        }

        let released = self.scope.close().await;
        report.resources_released = released.released;
        report.release_failures = released.failures;

        *self.state.write() = RegistryState::Closed;
        info!(
            servers_shut_down = report.servers_shut_down,
            resources_released = report.resources_released,
            "Downstream registry closed"
        );
        self.emit(RegistryEvent::RegistryClosed);
        report
    }

    pub fn find_server(&self, control_name: &str) -> Option<Arc<dyn DownstreamConnection>> {
        self.catalog.read().servers.get(control_name).cloned()
    }

    pub fn find_tool(&self, control_name: &str) -> Option<Tool> {
        self.catalog.read().tools.get(control_name).cloned()
    }

    pub fn get_server_by_control_name(
        &self,
        control_name: &str,
    ) -> Result<Arc<dyn DownstreamConnection>> {
        self.find_server(control_name)
            .ok_or_else(|| Error::not_found(Resource::Server, control_name))
    }

    pub fn get_tool_by_control_name(&self, control_name: &str) -> Result<Tool> {
        self.find_tool(control_name)
            .ok_or_else(|| Error::not_found(Resource::Tool, control_name))
    }

    pub fn contains_server(&self, control_name: &str) -> bool {
        self.catalog.read().servers.contains_key(control_name)
    }

    pub fn contains_tool(&self, control_name: &str) -> bool {
        self.catalog.read().tools.contains_key(control_name)
    }

    /// `(connection, tools)` pairs in registration order
    pub fn list_all_servers_tools(&self) -> Vec<RegisteredServer> {
        self.catalog.read().entries.clone()
    }

    /// Every tool in registration order
    pub fn all_tools(&self) -> Vec<Tool> {
        self.catalog
            .read()
            .entries
            .iter()
            .flat_map(|e| e.tools.iter().cloned())
            .collect()
    }

    /// Sorted key set of the tool index
    pub fn tool_control_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.catalog.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn server_count(&self) -> usize {
        self.catalog.read().entries.len()
    }

    /// Best-effort teardown of a connection that never made it into the catalog
    async fn discard(&self, connection: &dyn DownstreamConnection) {
        if let Err(e) = connection.shutdown().await {
            warn!(server = %connection.control_name(), error = %e, "Failed to discard connection");
        }
        self.release_resources(connection.control_name()).await;
    }

    /// Connections label their scope entries with their control name, which
    /// is unique while the caller holds `mutation_lock`
    async fn release_resources(&self, control_name: &str) {
        let report = self.scope.release_labeled(control_name).await;
        for (label, error) in &report.failures {
            warn!(server = %control_name, resource = %label, error = %error, "Failed to release resource");
        }
    }

    fn emit(&self, event: RegistryEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No registry event subscribers");
        }
    }
}
