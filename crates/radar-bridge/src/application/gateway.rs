//! Session gateway: validates client commands and fans events out.
//!
//! The [`Gateway`] is shared (behind an `Arc`) by every WebSocket session.  It
//! owns the scan flag and the broadcast channel that carries `status` and
//! `telemetry` messages to all sessions.  The device itself is reached only
//! through the [`DeviceControl`] trait so the gateway can be tested without a
//! serial port.
//!
//! # Delivery rules
//!
//! | Event                              | Recipients            |
//! |------------------------------------|-----------------------|
//! | join                               | joining session       |
//! | rejected command (400/409/500/503) | originating session   |
//! | `left`/`right`/`stop_movement`/`reset` written | originating session |
//! | `start`/`stop` written             | every session         |
//! | telemetry reading                  | every session         |
//! | device connected / disconnected    | every session         |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use radar_core::{Command, TelemetryReading, UnknownCommandError};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::domain::{ClientMessage, DeviceStatus, ErrorCode, HealthReport, ServerMessage};

/// Capacity of the per-session broadcast queue.  A session that falls this
/// far behind skips the oldest messages.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Device seam ───────────────────────────────────────────────────────────────

/// Failure reported by [`DeviceControl::write`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceWriteError {
    #[error("device not connected")]
    NotConnected,
    #[error("write failed: {0}")]
    Failed(String),
}

/// What the gateway needs from the connection supervisor.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Latest published device status.
    fn status(&self) -> DeviceStatus;

    /// Writes already-encoded command bytes to the open link.
    async fn write(&self, bytes: Vec<u8>) -> Result<(), DeviceWriteError>;

    /// Asks the supervisor to leave Disconnected/Error now.  Returns `false`
    /// when the request could not be queued.
    fn request_reconnect(&self) -> bool;
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a client request was rejected.  Every variant maps to one error code.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Malformed message: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownCommand(#[from] UnknownCommandError),

    #[error("Device not connected")]
    NotConnected,

    #[error("Cannot {0} while not scanning")]
    ScanInactive(Command),

    #[error("Failed to send command: {0}")]
    WriteFailed(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedFrame(_) | Self::UnknownCommand(_) => ErrorCode::InvalidInput,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::ScanInactive(_) => ErrorCode::ScanInactive,
            Self::WriteFailed(_) => ErrorCode::WriteFailed,
        }
    }

    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

impl From<DeviceWriteError> for GatewayError {
    fn from(e: DeviceWriteError) -> Self {
        match e {
            DeviceWriteError::NotConnected => Self::NotConnected,
            DeviceWriteError::Failed(reason) => Self::WriteFailed(reason),
        }
    }
}

/// Result of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Send this message to the originating session only.
    Reply(ServerMessage),
    /// A status broadcast already went out to every session (sender included).
    Broadcast,
}

// ── Gateway ───────────────────────────────────────────────────────────────────

pub struct Gateway {
    device: Arc<dyn DeviceControl>,
    /// Best-effort mirror of whether the device is sweeping.
    scanning: AtomicBool,
    /// Serialises `start`/`stop` so the flag and its broadcast stay in write order.
    transition: Mutex<()>,
    events: broadcast::Sender<ServerMessage>,
    movement_requires_scan: bool,
}

impl Gateway {
    pub fn new(device: Arc<dyn DeviceControl>, movement_requires_scan: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            device,
            scanning: AtomicBool::new(false),
            transition: Mutex::new(()),
            events,
            movement_requires_scan,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Registers a new session.
    ///
    /// Returns the snapshot to send to that session first, and the receiver
    /// for everything broadcast afterwards.  The subscription is taken before
    /// the snapshot so no broadcast can fall between the two.
    pub fn join(&self) -> (ServerMessage, broadcast::Receiver<ServerMessage>) {
        let rx = self.events.subscribe();
        (self.snapshot(), rx)
    }

    pub fn session_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Current `{isConnected, isScanning, message}` snapshot.
    pub fn snapshot(&self) -> ServerMessage {
        let status = self.device.status();
        ServerMessage::status(status.is_connected(), self.is_scanning(), status.message)
    }

    pub fn health(&self) -> HealthReport {
        let status = self.device.status();
        HealthReport {
            status: "ok".to_string(),
            device: status.state,
            is_connected: status.is_connected(),
            is_scanning: self.is_scanning(),
            message: status.message,
            endpoint: status.endpoint,
        }
    }

    pub fn request_reconnect(&self) -> bool {
        self.device.request_reconnect()
    }

    /// Broadcasts the current snapshot to every session.
    pub fn publish_status(&self) {
        // `send` only fails when no session is subscribed.
        let _ = self.events.send(self.snapshot());
    }

    pub fn publish_telemetry(&self, reading: TelemetryReading) {
        let _ = self.events.send(ServerMessage::from(reading));
    }

    /// Handles one text frame from a session.
    ///
    /// Returns the message to send back to that session, or `None` when the
    /// answer went out as a broadcast.
    pub async fn handle_frame(&self, text: &str) -> Option<ServerMessage> {
        let result = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Action { command }) => self.handle_action(&command).await,
            Err(e) => Err(GatewayError::from(e)),
        };

        match result {
            Ok(ActionOutcome::Reply(msg)) => Some(msg),
            Ok(ActionOutcome::Broadcast) => None,
            Err(e) => {
                match &e {
                    GatewayError::WriteFailed(_) => warn!("command rejected: {e}"),
                    _ => debug!("command rejected: {e}"),
                }
                Some(e.to_message())
            }
        }
    }

    /// Validates and executes one command.
    ///
    /// Checks run in this order: vocabulary (400), connection (503), scan
    /// gating for movement commands (409), then the write itself (500).
    pub async fn handle_action(&self, name: &str) -> Result<ActionOutcome, GatewayError> {
        let command: Command = name.parse()?;

        if !self.device.status().is_connected() {
            return Err(GatewayError::NotConnected);
        }

        match command.resulting_scan_state() {
            Some(scanning) => {
                let _guard = self.transition.lock().await;
                self.write(command).await?;
                self.scanning.store(scanning, Ordering::SeqCst);
                info!(command = %command, scanning, "scan state changed");
                self.publish_status();
                Ok(ActionOutcome::Broadcast)
            }
            None => {
                if self.movement_requires_scan && !self.is_scanning() {
                    return Err(GatewayError::ScanInactive(command));
                }
                self.write(command).await?;
                Ok(ActionOutcome::Reply(self.snapshot()))
            }
        }
    }

    async fn write(&self, command: Command) -> Result<(), GatewayError> {
        self.device.write(command.to_wire().to_vec()).await?;
        debug!(command = %command, "command written");
        Ok(())
    }

    /// Forwards supervisor output to every session until either source closes.
    ///
    /// Telemetry is forwarded in arrival order.  Status is broadcast only when
    /// the connected flag flips.
    pub async fn relay(
        self: Arc<Self>,
        mut telemetry: broadcast::Receiver<TelemetryReading>,
        mut status: watch::Receiver<DeviceStatus>,
    ) {
        let mut connected = status.borrow_and_update().is_connected();

        loop {
            tokio::select! {
                reading = telemetry.recv() => match reading {
                    Ok(reading) => self.publish_telemetry(reading),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("telemetry relay lagged; dropped {skipped} readings");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_connected = status.borrow_and_update().is_connected();
                    if now_connected != connected {
                        connected = now_connected;
                        self.publish_status();
                    }
                }
            }
        }

        debug!("relay stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
