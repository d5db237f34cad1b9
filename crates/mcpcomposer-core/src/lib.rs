//! # McpComposer Core Library
//!
//! Domain types, configuration and the error taxonomy for McpComposer.
//!
//! ## Modules
//!
//! - `domain` - Downstream server configs, tools, server kits, gateways
//! - `config` - Composer configuration file and timeout settings
//! - `error` - Error taxonomy shared by all crates

pub mod config;
pub mod domain;
pub mod error;

pub use config::{ComposerConfig, GatewayConfig, TimeoutSettings};
pub use domain::*;
pub use error::{Error, ErrorKind, Resource, Result};
