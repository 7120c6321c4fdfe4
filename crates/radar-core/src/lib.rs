//! # radar-core
//!
//! Shared library for the radar bridge containing the serial wire protocol
//! and the domain entities that describe the attached device.
//!
//! This crate has zero dependencies on OS APIs, serial drivers, or network
//! sockets.  The bridge binary (`radar-bridge`) owns all I/O.
//!
//! # Architecture overview
//!
//! The radar is a line-oriented serial device: a servo sweeps an ultrasonic
//! sensor and the firmware prints one text line per measurement.  The bridge
//! reads those lines, turns them into typed readings, and fans them out to
//! every connected client session.  Clients send back a tiny vocabulary of
//! commands which the bridge writes to the device as single characters.
//!
//! - **`domain`** – Plain data types: serial endpoints, the connection
//!   lifecycle enum, and telemetry readings (with the "no object" distance
//!   sentinel modelled explicitly).
//!
//! - **`protocol`** – How bytes travel over the serial link.  Inbound: a line
//!   framing codec and a tolerant telemetry decoder.  Outbound: the fixed
//!   command encoder.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `radar_core::TelemetryReading` instead of the full module path.
pub use domain::connection::ConnectionState;
pub use domain::endpoint::{SerialEndpoint, UsbIdentity};
pub use domain::telemetry::{Distance, TelemetryReading};
pub use protocol::command::{encode_command, Command, UnknownCommandError};
pub use protocol::framing::{LineCodec, LineCodecError};
pub use protocol::telemetry::{decode_line, parse_line, DecodeError};
