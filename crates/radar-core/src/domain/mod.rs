//! Domain entities for the radar bridge.
//!
//! This module contains plain data types with no infrastructure dependencies.
//! The serial driver, the WebSocket server, and the tests all speak in terms
//! of these types, so they live in the shared crate.
//!
//! Code in outer layers (application, infrastructure) depends on the domain,
//! but the domain never depends on them.

/// Connection lifecycle states of the device link.
pub mod connection;

/// Serial endpoints as reported by the OS enumeration.
pub mod endpoint;

/// Decoded angle/distance readings.
pub mod telemetry;
