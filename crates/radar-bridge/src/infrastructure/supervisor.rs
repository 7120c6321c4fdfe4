//! Connection supervisor task.
//!
//! The [`Supervisor`] is the only owner of the [`ConnectionMachine`], the open
//! [`LinkHandle`] and the port monitor.  It runs as one Tokio task and turns
//! machine actions into real I/O:
//!
//! ```text
//!   SupervisorHandle ──mpsc──►┐
//!   LinkHandle reader ─mpsc──►├─► Supervisor ─► ConnectionMachine::handle ─► actions
//!   retry deadline ──────────►│        │
//!   monitor tick ────────────►┘        ├──watch──► DeviceStatus
//!                                      └──broadcast (via reader)──► TelemetryReading
//! ```
//!
//! Everything else in the process talks to it through a cloneable
//! [`SupervisorHandle`], which also implements
//! [`DeviceControl`](crate::application::DeviceControl) for the gateway.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use radar_core::TelemetryReading;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::application::{
    ConnectionMachine, DeviceControl, DeviceWriteError, MachineAction, MachineInput,
};
use crate::domain::{BridgeConfig, DeviceStatus};
use crate::infrastructure::discovery::PortDiscovery;
use crate::infrastructure::link::{EndpointClaims, LinkEvent, LinkHandle, LinkOpener};
use crate::infrastructure::monitor::PortMonitor;

const REQUEST_CHANNEL_CAPACITY: usize = 32;
const TELEMETRY_CHANNEL_CAPACITY: usize = 1024;

/// Messages from handles to the supervisor task.
#[derive(Debug)]
pub enum SupervisorRequest {
    Write {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<(), DeviceWriteError>>,
    },
    Reconnect,
    Shutdown,
}

pub struct Supervisor {
    machine: ConnectionMachine,
    discovery: PortDiscovery,
    opener: Arc<dyn LinkOpener>,
    claims: EndpointClaims,
    link: Option<LinkHandle>,
    next_link_id: u64,
    monitor: Option<PortMonitor>,
    monitor_interval: Duration,
    status_tx: watch::Sender<DeviceStatus>,
    telemetry_tx: broadcast::Sender<TelemetryReading>,
    link_events_tx: mpsc::UnboundedSender<LinkEvent>,
    link_events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    requests: mpsc::Receiver<SupervisorRequest>,
}

impl Supervisor {
    /// Starts the supervisor task and returns its handle.
    ///
    /// The task begins discovery immediately and runs until
    /// [`SupervisorHandle::shutdown`] is called or every handle is dropped.
    pub fn spawn(
        config: &BridgeConfig,
        discovery: PortDiscovery,
        opener: Arc<dyn LinkOpener>,
        claims: EndpointClaims,
    ) -> (SupervisorHandle, JoinHandle<()>) {
        let machine = ConnectionMachine::new(config.retry_delay);
        let (status_tx, status_rx) = watch::channel(machine.status());
        let (telemetry_tx, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);
        let (link_events_tx, link_events_rx) = mpsc::unbounded_channel();
        let (request_tx, requests) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);

        let handle = SupervisorHandle {
            requests: request_tx,
            status: status_rx,
            telemetry: telemetry_tx.clone(),
        };

        let supervisor = Self {
            machine,
            discovery,
            opener,
            claims,
            link: None,
            next_link_id: 0,
            monitor: None,
            monitor_interval: config.monitor_interval,
            status_tx,
            telemetry_tx,
            link_events_tx,
            link_events_rx,
            requests,
        };

        (handle, tokio::spawn(supervisor.run()))
    }

    async fn run(mut self) {
        self.apply(MachineInput::Start).await;

        loop {
            let retry_deadline = self.machine.retry_deadline();

            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(SupervisorRequest::Write { bytes, reply }) => {
                        let result = self.write(&bytes).await;
                        // The requester may have given up waiting.
                        let _ = reply.send(result);
                    }
                    Some(SupervisorRequest::Reconnect) => {
                        info!("reconnect requested");
                        self.apply(MachineInput::ReconnectRequested).await;
                    }
                    Some(SupervisorRequest::Shutdown) | None => break,
                },
                Some(event) = self.link_events_rx.recv() => self.on_link_event(event).await,
                _ = retry_elapsed(retry_deadline) => self.apply(MachineInput::RetryElapsed).await,
                _ = next_tick(&mut self.monitor) => self.poll_endpoints().await,
            }
        }

        self.apply(MachineInput::Shutdown).await;
        info!("connection supervisor stopped");
    }

    /// Feeds `input` to the machine and executes the resulting actions,
    /// including any follow-up inputs those actions produce.
    async fn apply(&mut self, input: MachineInput) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            for action in self.machine.handle(input, Instant::now()) {
                if let Some(follow_up) = self.execute(action).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, action: MachineAction) -> Option<MachineInput> {
        match action {
            MachineAction::Discover => match self.discovery.discover_blocking().await {
                Ok(Some(endpoint)) => {
                    info!("found serial device at {}", endpoint.path);
                    Some(MachineInput::DiscoveryCompleted(Some(endpoint)))
                }
                Ok(None) => {
                    warn!("no serial device found");
                    Some(MachineInput::DiscoveryCompleted(None))
                }
                Err(e) => {
                    warn!("serial discovery failed: {e}");
                    Some(MachineInput::DiscoveryFailed(e.to_string()))
                }
            },

            MachineAction::Open(endpoint) => {
                self.next_link_id += 1;
                let opened = LinkHandle::open(
                    self.next_link_id,
                    endpoint.clone(),
                    self.opener.as_ref(),
                    &self.claims,
                    self.telemetry_tx.clone(),
                    self.link_events_tx.clone(),
                )
                .await;

                match opened {
                    Ok(link) => {
                        if self.link.is_none() {
                            self.link = Some(link);
                        }
                        Some(MachineInput::LinkOpened(endpoint))
                    }
                    Err(e) => {
                        warn!("{e}");
                        Some(MachineInput::LinkOpenFailed(e.to_string()))
                    }
                }
            }

            MachineAction::ReleaseLink => {
                if let Some(link) = self.link.take() {
                    link.close();
                }
                None
            }

            MachineAction::StartMonitor => {
                let mut monitor = PortMonitor::new(self.monitor_interval);
                match self.discovery.list_blocking().await {
                    Ok(ports) => {
                        monitor.observe(&ports);
                    }
                    Err(e) => warn!("port monitor baseline failed: {e}"),
                }
                debug!("port monitor started ({:?} interval)", self.monitor_interval);
                self.monitor = Some(monitor);
                None
            }

            MachineAction::PublishStatus => {
                let status = self.machine.status();
                info!("device {}: {}", status.state, status.message);
                self.status_tx.send_replace(status);
                None
            }
        }
    }

    async fn on_link_event(&mut self, event: LinkEvent) {
        let current = self.link.as_ref().map(LinkHandle::id);
        if current != Some(event.link_id()) {
            debug!("ignoring event from released link: {event:?}");
            return;
        }

        match event {
            LinkEvent::Closed { reason, .. } => {
                warn!("serial link closed: {reason}");
                self.apply(MachineInput::LinkClosed(reason)).await;
            }
            LinkEvent::Failed { error, .. } => {
                warn!("serial link failed: {error}");
                self.apply(MachineInput::LinkFailed(error)).await;
            }
        }
    }

    async fn poll_endpoints(&mut self) {
        let ports = match self.discovery.list_blocking().await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("port monitor enumeration failed: {e}");
                return;
            }
        };

        let changed = self
            .monitor
            .as_mut()
            .map_or(false, |monitor| monitor.observe(&ports));

        if changed {
            info!("serial endpoints changed ({} present)", ports.len());
            self.apply(MachineInput::EndpointsChanged).await;
        } else {
            self.apply(MachineInput::MonitorTick).await;
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceWriteError> {
        let link = self.link.as_mut().ok_or(DeviceWriteError::NotConnected)?;
        link.write(bytes).await.map_err(|e| {
            warn!("write to {} failed: {e}", link.endpoint().path);
            DeviceWriteError::Failed(e.to_string())
        })
    }
}

async fn retry_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn next_tick(monitor: &mut Option<PortMonitor>) {
    match monitor {
        Some(monitor) => monitor.tick().await,
        None => pending().await,
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable front end to the supervisor task.
#[derive(Clone)]
pub struct SupervisorHandle {
    requests: mpsc::Sender<SupervisorRequest>,
    status: watch::Receiver<DeviceStatus>,
    telemetry: broadcast::Sender<TelemetryReading>,
}

impl SupervisorHandle {
    /// Latest published status.
    pub fn status(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<DeviceStatus> {
        self.status.clone()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryReading> {
        self.telemetry.subscribe()
    }

    /// Writes bytes to the open link and waits for the outcome.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<(), DeviceWriteError> {
        let (reply, outcome) = oneshot::channel();
        self.requests
            .send(SupervisorRequest::Write { bytes, reply })
            .await
            .map_err(|_| DeviceWriteError::NotConnected)?;
        outcome.await.map_err(|_| DeviceWriteError::NotConnected)?
    }

    /// Queues a reconnect request.  Returns `false` if the queue is full or
    /// the supervisor has stopped.
    pub fn request_reconnect(&self) -> bool {
        self.requests.try_send(SupervisorRequest::Reconnect).is_ok()
    }

    /// Asks the supervisor to release the link and stop.
    pub async fn shutdown(&self) {
        let _ = self.requests.send(SupervisorRequest::Shutdown).await;
    }
}

#[async_trait]
impl DeviceControl for SupervisorHandle {
    fn status(&self) -> DeviceStatus {
        SupervisorHandle::status(self)
    }

    async fn write(&self, bytes: Vec<u8>) -> Result<(), DeviceWriteError> {
        SupervisorHandle::write(self, bytes).await
    }

    fn request_reconnect(&self) -> bool {
        SupervisorHandle::request_reconnect(self)
    }
}
