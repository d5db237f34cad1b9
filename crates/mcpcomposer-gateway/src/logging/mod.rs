//! Logging setup
//!
//! - Console: colored, compact
//! - File (optional): daily rotation, no colors, file and line numbers

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_PREFIX: &str = "mcpcomposer";

const DEFAULT_DIRECTIVES: &[&str] = &[
    "mcpcomposer_core=debug",
    "mcpcomposer_mcp=debug",
    "mcpcomposer_gateway=debug",
    "rmcp=info",
];

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level when `RUST_LOG` is not set
    pub default_level: String,
    /// Write rotating log files here; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Console plus daily files under the platform data directory
    pub fn with_default_log_dir() -> Self {
        Self {
            log_dir: Some(default_log_dir()),
            ..Self::default()
        }
    }
}

/// `~/.local/share/mcpcomposer/logs` on Linux, `%LOCALAPPDATA%\mcpcomposer\logs` on Windows
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LOG_PREFIX)
        .join("logs")
}

/// `RUST_LOG` wins; otherwise the configured level with debug for our crates
pub fn build_env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        DEFAULT_DIRECTIVES
            .iter()
            .filter_map(|d| d.parse().ok())
            .fold(EnvFilter::new(default_level), |filter, directive| {
                filter.add_directive(directive)
            })
    })
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; keep it alive
/// for the lifetime of the process or buffered lines are lost.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    dotenvy::dotenv().ok();

    let env_filter = build_env_filter(&config.default_level);

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            // mcpcomposer.2026-01-22.log
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .context("Failed to create log file appender")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}
