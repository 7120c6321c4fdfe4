//! Device status snapshot.

use radar_core::ConnectionState;

/// What the connection supervisor publishes after every transition.
///
/// This is a read-only copy; only the state machine produces new values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub state: ConnectionState,
    /// Human-readable explanation of the current state.
    pub message: String,
    /// Path of the endpoint being opened or currently open.
    pub endpoint: Option<String>,
    /// A discovery retry is scheduled.
    pub retry_pending: bool,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}
