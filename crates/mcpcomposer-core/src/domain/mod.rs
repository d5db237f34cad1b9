//! Domain entities

pub mod gateway;
pub mod server;
pub mod server_kit;
pub mod tool;

pub use gateway::{
    gateway_endpoint, validate_gateway_name, Gateway, GatewayView, DEFAULT_ENDPOINT_PREFIX,
};
pub use server::{
    validate_server_control_name, DownstreamServerConfig, TransportConfig, TransportType,
};
pub use server_kit::ServerKit;
pub use tool::{tool_control_name, Tool, TOOL_NAME_SEPARATOR};
