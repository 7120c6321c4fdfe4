//! Connection lifecycle for the single serial link.
//!
//! [`ConnectionMachine`] is a pure reducer: it receives [`MachineInput`]s (what
//! just happened) and answers with [`MachineAction`]s (what the owner must do
//! next).  It never touches a port or a timer itself, which keeps every
//! transition testable without hardware or a runtime.
//!
//! # Lifecycle
//!
//! ```text
//!              Start / Reconnect / retry / endpoint set changed
//!   Disconnected ──────────────────────────────────────────► Discovering
//!        ▲   ▲                                                 │      │
//!        │   │ nothing found (arm retry)                       │      │ found
//!        │   └─────────────────────────────────────────────────┘      ▼
//!        │          open failed (arm retry)                       Connecting
//!        ├────────────────────────────────────────────────────────────┤
//!        │          link closed (no retry; next monitor tick)         │ opened
//!        └──────────────────────────────────────────────────────── Connected
//!
//!   Error behaves like Disconnected.
//! ```
//!
//! A lost link leaves nothing scheduled.  The port monitor is already running
//! by then, and its next tick (`MonitorTick` or `EndpointsChanged`) starts a
//! fresh discovery, as does an explicit `ReconnectRequested`.
//!
//! # Invariants
//!
//! - At most one link is open: `Open` is only emitted when no link is held,
//!   and a link is only adopted from `Connecting`.
//! - At most one retry timer exists: the timer is an `Option`, and arming an
//!   already-armed timer is a no-op.

use std::time::Duration;

use radar_core::{ConnectionState, SerialEndpoint};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::DeviceStatus;

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineInput {
    /// Process startup.
    Start,
    /// Explicit operator/client request to try again now.
    ReconnectRequested,
    /// Port discovery finished; `None` when no endpoint matched.
    DiscoveryCompleted(Option<SerialEndpoint>),
    /// The OS refused to enumerate endpoints.
    DiscoveryFailed(String),
    /// The endpoint requested by [`MachineAction::Open`] is now open.
    LinkOpened(SerialEndpoint),
    /// Opening the endpoint requested by [`MachineAction::Open`] failed.
    LinkOpenFailed(String),
    /// The open link reached end-of-stream or a disconnect-class error.
    LinkClosed(String),
    /// The open link failed with any other error.
    LinkFailed(String),
    /// The retry timer deadline passed.
    RetryElapsed,
    /// The port monitor saw the endpoint set change.
    EndpointsChanged,
    /// The port monitor polled and the endpoint set was unchanged.
    MonitorTick,
    /// Process shutdown.
    Shutdown,
}

/// Work the owner of the machine must perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineAction {
    /// Run port discovery and report back with `DiscoveryCompleted`/`DiscoveryFailed`.
    Discover,
    /// Open this endpoint and report back with `LinkOpened`/`LinkOpenFailed`.
    Open(SerialEndpoint),
    /// Drop the link currently held.
    ReleaseLink,
    /// Start the periodic port monitor.  Emitted once per machine.
    StartMonitor,
    /// Publish [`ConnectionMachine::status`] to observers.
    PublishStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryTimer {
    deadline: Instant,
}

/// Owner of [`ConnectionState`], the retry timer, and the "link is open" fact.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    message: String,
    endpoint: Option<SerialEndpoint>,
    link_open: bool,
    retry: Option<RetryTimer>,
    monitor_running: bool,
    retry_delay: Duration,
}

impl ConnectionMachine {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            message: "Waiting for serial device".to_string(),
            endpoint: None,
            link_open: false,
            retry: None,
            monitor_running: false,
            retry_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_link_open(&self) -> bool {
        self.link_open
    }

    pub fn is_monitor_running(&self) -> bool {
        self.monitor_running
    }

    /// Deadline of the pending retry, if one is armed.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry.map(|t| t.deadline)
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            state: self.state,
            message: self.message.clone(),
            endpoint: self.endpoint.as_ref().map(|e| e.path.clone()),
            retry_pending: self.retry.is_some(),
        }
    }

    /// Applies one input and returns the actions it requires.
    ///
    /// `now` is only consulted for arming and checking the retry timer.
    pub fn handle(&mut self, input: MachineInput, now: Instant) -> Vec<MachineAction> {
        match input {
            MachineInput::Start | MachineInput::ReconnectRequested => {
                if self.can_rediscover() {
                    self.begin_discovery()
                } else {
                    debug!(state = %self.state, "reconnect ignored; connection attempt already active");
                    Vec::new()
                }
            }

            MachineInput::DiscoveryCompleted(found) => {
                if self.state != ConnectionState::Discovering {
                    return Vec::new();
                }
                match found {
                    Some(endpoint) => {
                        self.state = ConnectionState::Connecting;
                        self.message = format!("Opening {}", endpoint.path);
                        self.endpoint = Some(endpoint.clone());
                        vec![MachineAction::PublishStatus, MachineAction::Open(endpoint)]
                    }
                    None => {
                        self.state = ConnectionState::Disconnected;
                        self.endpoint = None;
                        self.arm_retry(now);
                        self.message =
                            format!("No serial device found; retrying in {:?}", self.retry_delay);
                        vec![MachineAction::PublishStatus]
                    }
                }
            }

            MachineInput::DiscoveryFailed(error) => {
                if self.state != ConnectionState::Discovering {
                    return Vec::new();
                }
                self.state = ConnectionState::Error;
                self.endpoint = None;
                self.arm_retry(now);
                self.message = format!("Port enumeration failed: {error}");
                vec![MachineAction::PublishStatus]
            }

            MachineInput::LinkOpened(endpoint) => {
                if self.state == ConnectionState::Connecting && !self.link_open {
                    self.state = ConnectionState::Connected;
                    self.link_open = true;
                    self.retry = None;
                    self.message = "Serial port is open.".to_string();
                    self.endpoint = Some(endpoint);

                    let mut actions = Vec::with_capacity(2);
                    if !self.monitor_running {
                        self.monitor_running = true;
                        actions.push(MachineAction::StartMonitor);
                    }
                    actions.push(MachineAction::PublishStatus);
                    actions
                } else if !self.link_open {
                    // Nobody asked for this link.
                    debug!(path = %endpoint.path, "discarding unexpected link");
                    vec![MachineAction::ReleaseLink]
                } else {
                    Vec::new()
                }
            }

            MachineInput::LinkOpenFailed(error) => {
                if self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                let path = self
                    .endpoint
                    .take()
                    .map(|e| e.path)
                    .unwrap_or_else(|| "serial port".to_string());
                self.state = ConnectionState::Disconnected;
                self.arm_retry(now);
                self.message = format!(
                    "Failed to open {path}: {error}; retrying in {:?}",
                    self.retry_delay
                );
                vec![MachineAction::PublishStatus]
            }

            MachineInput::LinkClosed(reason) => {
                self.lose_link(ConnectionState::Disconnected, format!("Serial port closed: {reason}"))
            }

            MachineInput::LinkFailed(error) => {
                self.lose_link(ConnectionState::Error, format!("Serial port error: {error}"))
            }

            MachineInput::RetryElapsed => {
                let due = matches!(self.retry, Some(t) if now >= t.deadline);
                if !due {
                    return Vec::new();
                }
                self.retry = None;
                if self.can_rediscover() {
                    self.begin_discovery()
                } else {
                    Vec::new()
                }
            }

            MachineInput::EndpointsChanged => {
                if self.monitor_running && self.can_rediscover() {
                    self.begin_discovery()
                } else {
                    Vec::new()
                }
            }

            // Only an idle machine with nothing scheduled needs the nudge;
            // a pending retry keeps its own deadline.
            MachineInput::MonitorTick => {
                if self.monitor_running && self.can_rediscover() && self.retry.is_none() {
                    self.begin_discovery()
                } else {
                    Vec::new()
                }
            }

            MachineInput::Shutdown => {
                self.retry = None;
                self.state = ConnectionState::Disconnected;
                self.message = "Bridge shutting down".to_string();
                self.endpoint = None;
                if self.link_open {
                    self.link_open = false;
                    vec![MachineAction::ReleaseLink, MachineAction::PublishStatus]
                } else {
                    vec![MachineAction::PublishStatus]
                }
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn can_rediscover(&self) -> bool {
        self.state.is_idle() && !self.link_open
    }

    fn begin_discovery(&mut self) -> Vec<MachineAction> {
        self.retry = None;
        self.state = ConnectionState::Discovering;
        self.endpoint = None;
        self.message = "Searching for serial device".to_string();
        vec![MachineAction::PublishStatus, MachineAction::Discover]
    }

    fn lose_link(&mut self, next: ConnectionState, message: String) -> Vec<MachineAction> {
        if !self.link_open {
            return Vec::new();
        }
        self.link_open = false;
        self.state = next;
        self.endpoint = None;
        self.message = message;
        self.retry = None;
        vec![MachineAction::ReleaseLink, MachineAction::PublishStatus]
    }

    /// Arms the retry timer unless one is already pending.
    fn arm_retry(&mut self, now: Instant) -> bool {
        if self.retry.is_some() {
            return false;
        }
        self.retry = Some(RetryTimer {
            deadline: now + self.retry_delay,
        });
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
