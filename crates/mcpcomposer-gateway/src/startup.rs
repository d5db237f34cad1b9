//! Startup - builds the registry, composer and control plane from configuration
//!
//! Startup is tolerant: a server that fails to register or a configured
//! gateway that references something missing is logged and reported, and the
//! runtime still comes up with whatever did succeed.

use std::path::Path;
use std::sync::Arc;

use mcpcomposer_core::{ComposerConfig, Result};
use mcpcomposer_mcp::{ConnectionFactory, RmcpConnectionFactory};
use tracing::{info, warn};

use crate::composer::Composer;
use crate::control::ControlPlane;
use crate::registry::{DownstreamRegistry, ShutdownReport};

/// What happened while starting up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub servers_registered: usize,
    /// Error that aborted initial registration, if any
    pub initialize_error: Option<String>,
    pub gateways_created: usize,
    /// `(gateway, error)` for configured gateways that were skipped
    pub gateway_failures: Vec<(String, String)>,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.initialize_error.is_none() && self.gateway_failures.is_empty()
    }
}

pub struct ComposerRuntime {
    registry: Arc<DownstreamRegistry>,
    composer: Arc<Composer>,
    control: ControlPlane,
    report: StartupReport,
}

impl ComposerRuntime {
    /// Construct and initialize everything described by `config`
    pub async fn start(config: ComposerConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        info!(
            servers = config.servers.len(),
            gateways = config.gateways.len(),
            "[Startup] Starting composer runtime"
        );

        let registry = Arc::new(DownstreamRegistry::new(factory));
        let mut report = StartupReport::default();

        if let Err(e) = registry.initialize(&config.servers).await {
            warn!(error = %e, "[Startup] Initial server registration aborted");
            report.initialize_error = Some(e.to_string());
        }
        report.servers_registered = registry.server_count();

        let composer = Arc::new(Composer::new(registry.clone(), config.endpoint_prefix));
        for kit in config.gateways {
            let name = kit.name.clone();
            match composer.add_gateway(kit) {
                Ok(view) => {
                    info!(gateway = %name, endpoint = %view.gateway_endpoint, "[Startup] ✓ Gateway ready");
                    report.gateways_created += 1;
                }
                Err(e) => {
                    warn!(gateway = %name, error = %e, "[Startup] Skipping gateway");
                    report.gateway_failures.push((name, e.to_string()));
                }
            }
        }

        info!(
            servers = report.servers_registered,
            gateways = report.gateways_created,
            "[Startup] Composer runtime ready"
        );

        let control = ControlPlane::new(registry.clone(), composer.clone());
        Self {
            registry,
            composer,
            control,
            report,
        }
    }

    /// Load a configuration file and start with rmcp-backed connections
    pub async fn from_config_file(path: &Path) -> Result<Self> {
        let config = ComposerConfig::load(path)?;
        let factory = Arc::new(RmcpConnectionFactory::new(config.timeouts));
        Ok(Self::start(config, factory).await)
    }

    pub fn registry(&self) -> &Arc<DownstreamRegistry> {
        &self.registry
    }

    pub fn composer(&self) -> &Arc<Composer> {
        &self.composer
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn startup_report(&self) -> &StartupReport {
        &self.report
    }

    /// Shut every downstream connection down and release tracked resources
    pub async fn shutdown(&self) -> ShutdownReport {
        info!("[Shutdown] Stopping composer runtime");
        let report = self.registry.shutdown().await;
        if !report.failures.is_empty() || !report.release_failures.is_empty() {
            warn!(
                failures = report.failures.len(),
                release_failures = report.release_failures.len(),
                "[Shutdown] Completed with errors"
            );
        }
        report
    }
}
