//! Mock downstream connections
//!
//! Scripted in-memory stand-ins for rmcp connections. Every lifecycle call
//! is appended to a shared [`EventLog`] so tests can assert ordering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use mcpcomposer_core::{DownstreamServerConfig, Error, Result, Tool};
use mcpcomposer_mcp::{ConnectionFactory, ConnectionState, DownstreamConnection, ResourceScope};

// ============================================================================
// EventLog
// ============================================================================

/// Ordered record of mock calls, e.g. `init:a`, `list:a`, `shutdown:a`, `release:a`
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Entries starting with `prefix`, in order
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

// ============================================================================
// MockBehavior
// ============================================================================

/// How a mock server behaves
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Tool names (not control names) reported by `list_tools`
    pub tools: Vec<String>,
    pub fail_initialize: bool,
    pub fail_list_tools: bool,
    pub fail_shutdown: bool,
    pub fail_release: bool,
    pub initialize_delay: Option<Duration>,
}

impl MockBehavior {
    pub fn with_tools(tools: &[&str]) -> Self {
        Self {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_initialize() -> Self {
        Self {
            fail_initialize: true,
            ..Default::default()
        }
    }

    pub fn failing_list_tools() -> Self {
        Self {
            fail_list_tools: true,
            ..Default::default()
        }
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.initialize_delay = Some(delay);
        self
    }
}

// ============================================================================
// MockConnection
// ============================================================================

pub struct MockConnection {
    control_name: String,
    behavior: MockBehavior,
    state: Mutex<ConnectionState>,
    log: EventLog,
}

impl MockConnection {
    pub fn new(control_name: &str, behavior: MockBehavior, log: EventLog) -> Self {
        Self {
            control_name: control_name.to_string(),
            behavior,
            state: Mutex::new(ConnectionState::Uninitialized),
            log,
        }
    }
}

#[async_trait]
impl DownstreamConnection for MockConnection {
    fn control_name(&self) -> &str {
        &self.control_name
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn initialize(&self, scope: &ResourceScope) -> Result<()> {
        if let Some(delay) = self.behavior.initialize_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.push(format!("init:{}", self.control_name));
        if self.behavior.fail_initialize {
            return Err(Error::connection(&self.control_name, "mock refused connection"));
        }

        let log = self.log.clone();
        let name = self.control_name.clone();
        let fail_release = self.behavior.fail_release;
        scope.push(self.control_name.clone(), move || async move {
            log.push(format!("release:{}", name));
            if fail_release {
                anyhow::bail!("mock release failed for {}", name);
            }
            Ok(())
        })?;

        *self.state.lock() = ConnectionState::Initialized;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.log.push(format!("list:{}", self.control_name));
        if self.behavior.fail_list_tools {
            return Err(Error::connection(&self.control_name, "mock tools/list failed"));
        }
        Ok(self
            .behavior
            .tools
            .iter()
            .map(|name| {
                Tool::new(
                    &self.control_name,
                    name,
                    Some(format!("Test tool: {}", name)),
                    json!({"type": "object", "properties": {}}),
                )
            })
            .collect())
    }

    async fn shutdown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.lock(), ConnectionState::ShutDown);
        if previous != ConnectionState::Initialized {
            return Ok(());
        }
        self.log.push(format!("shutdown:{}", self.control_name));
        if self.behavior.fail_shutdown {
            return Err(Error::connection(&self.control_name, "mock shutdown failed"));
        }
        Ok(())
    }
}

// ============================================================================
// MockConnectionFactory
// ============================================================================

/// Builds [`MockConnection`]s. Unscripted servers get an empty tool list.
#[derive(Default)]
pub struct MockConnectionFactory {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    created: Mutex<Vec<Arc<MockConnection>>>,
    log: EventLog,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, control_name: &str, behavior: MockBehavior) -> Self {
        self.script(control_name, behavior);
        self
    }

    pub fn script(&self, control_name: &str, behavior: MockBehavior) {
        self.behaviors
            .lock()
            .insert(control_name.to_string(), behavior);
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Every connection built so far, in creation order
    pub fn created(&self) -> Vec<Arc<MockConnection>> {
        self.created.lock().clone()
    }
}

impl ConnectionFactory for MockConnectionFactory {
    fn create(&self, config: &DownstreamServerConfig) -> Arc<dyn DownstreamConnection> {
        let behavior = self
            .behaviors
            .lock()
            .get(&config.control_name)
            .cloned()
            .unwrap_or_default();
        let connection = Arc::new(MockConnection::new(
            &config.control_name,
            behavior,
            self.log.clone(),
        ));
        self.created.lock().push(connection.clone());
        connection
    }
}
