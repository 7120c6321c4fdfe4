//! JSON message types for the client-facing WebSocket protocol.
//!
//! The device speaks single characters and text lines; clients speak JSON.
//! The bridge translates between the two.
//!
//! # Message flow
//!
//! ```text
//! Client → Bridge:  JSON text frame  →  ClientMessage  →  Command  →  "S\n"
//! Bridge → Client:  TelemetryReading / DeviceStatus  →  ServerMessage  →  JSON text frame
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a lowercase `"type"` field; the other
//! fields sit in the same object:
//!
//! ```json
//! {"type":"action","command":"start"}
//! {"type":"status","isConnected":true,"isScanning":false,"message":"Serial port is open."}
//! {"type":"telemetry","angle":45,"distance":0}
//! {"type":"error","message":"Device not connected","code":503}
//! ```

use radar_core::{ConnectionState, TelemetryReading};
use serde::{Deserialize, Serialize};

// ── Client → Bridge messages ──────────────────────────────────────────────────

/// All messages a client session can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Ask the bridge to send one command to the device.
    ///
    /// `command` is kept as a raw string so that an unknown name can be
    /// reported with code 400 instead of failing the whole frame.
    Action { command: String },
}

// ── Bridge → Client messages ──────────────────────────────────────────────────

/// All messages the bridge sends to client sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Connection and scan snapshot.
    ///
    /// Unicast on join and after non-state commands, broadcast when the
    /// device connects/disconnects and after `start`/`stop`.
    #[serde(rename_all = "camelCase")]
    Status {
        is_connected: bool,
        is_scanning: bool,
        /// Human-readable device status, e.g. `"Serial port is open."`.
        message: String,
    },

    /// One decoded reading.
    Telemetry {
        /// Servo angle in degrees.
        angle: i32,
        /// Distance in centimetres; `0` means no object was detected.
        distance: u32,
    },

    /// Rejection of a client request.  Only ever sent to the session that caused it.
    Error { message: String, code: u16 },
}

impl ServerMessage {
    pub fn status(is_connected: bool, is_scanning: bool, message: impl Into<String>) -> Self {
        Self::Status {
            is_connected,
            is_scanning,
            message: message.into(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: code.as_u16(),
        }
    }
}

impl From<TelemetryReading> for ServerMessage {
    /// The "no object" distance is sent as `0`, matching the firmware.
    fn from(reading: TelemetryReading) -> Self {
        Self::Telemetry {
            angle: reading.angle,
            distance: reading.distance.wire_value(),
        }
    }
}

// ── Error codes ───────────────────────────────────────────────────────────────

/// HTTP-flavoured codes carried in `error` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed frame or unknown command.
    InvalidInput,
    /// Movement command while no scan is running.
    ScanInactive,
    /// The device write failed.
    WriteFailed,
    /// No serial link is open.
    NotConnected,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::ScanInactive => 409,
            Self::WriteFailed => 500,
            Self::NotConnected => 503,
        }
    }
}

// ── Health check ──────────────────────────────────────────────────────────────

/// Body of the `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Current connection lifecycle state.
    pub device: ConnectionState,
    pub is_connected: bool,
    pub is_scanning: bool,
    pub message: String,
    /// Path of the open endpoint, if any.
    pub endpoint: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
