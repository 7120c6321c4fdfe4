//! Application layer for radar-bridge.
//!
//! The application layer knows *what* should happen to the device and the
//! sessions, but delegates *how* to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - The connection lifecycle reducer ([`ConnectionMachine`])
//! - Command validation, scan-state tracking and fan-out ([`Gateway`])
//!
//! # What does NOT belong here?
//!
//! - Opening serial ports or sockets (that is infrastructure)
//! - Tokio task spawning (that happens in the infrastructure layer)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod connection_machine;
pub mod gateway;

pub use connection_machine::{ConnectionMachine, MachineAction, MachineInput};
pub use gateway::{
    ActionOutcome, DeviceControl, DeviceWriteError, Gateway, GatewayError, EVENT_CHANNEL_CAPACITY,
};
