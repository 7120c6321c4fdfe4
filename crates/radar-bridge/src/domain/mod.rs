//! Domain layer for radar-bridge.
//!
//! The domain layer contains plain types that have no dependencies on I/O,
//! serial drivers, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Message types (the JSON "language" between clients and the bridge)
//! - Configuration structures
//! - The device status snapshot shared by the supervisor and the gateway
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, serial port, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod messages;
pub mod status;

pub use config::{BridgeConfig, SerialConfig};
pub use messages::{ClientMessage, ErrorCode, HealthReport, ServerMessage};
pub use status::DeviceStatus;
