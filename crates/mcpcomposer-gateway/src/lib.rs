//! # McpComposer Gateway
//!
//! Downstream registry, server kit / gateway composition and the control
//! plane adapter.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!  requests ──▶│ ControlPlane │
//!              └──────┬───────┘
//!                     │
//!           ┌─────────┴─────────┐
//!           ▼                   ▼
//!     ┌──────────┐  observes ┌────────────────────┐
//!     │ Composer │──────────▶│ DownstreamRegistry │
//!     │ (kits,   │◀──────────│ (connections,      │
//!     │ gateways)│  removals │  tool index, scope)│
//!     └──────────┘           └─────────┬──────────┘
//!                                      ▼
//!                           DownstreamConnection (rmcp)
//! ```
//!
//! ## Modules
//!
//! - `registry` - Connection lifecycle, tool index, events
//! - `composer` - Server kits, gateways, reconciliation
//! - `control` - Error mapping for the request-handling layer
//! - `startup` - `ComposerRuntime` built from configuration
//! - `logging` - tracing subscriber setup

pub mod composer;
pub mod control;
pub mod logging;
pub mod registry;
pub mod startup;

pub use composer::{Composer, GatewayStore};
pub use control::{
    AddGatewayRequest, ControlError, ControlMessage, ControlPlane, ControlResult, ControlStatus,
    KitSelection, ServerSummary,
};
pub use logging::{init_tracing, LogConfig};
pub use registry::{
    DownstreamRegistry, RegisteredServer, RegistryEvent, RegistryObserver, RegistryState,
    ShutdownReport,
};
pub use startup::{ComposerRuntime, StartupReport};
