//! Fakes shared by the integration tests: a mutable port list and an opener
//! that hands out in-memory links.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use radar_bridge::domain::{BridgeConfig, DeviceStatus};
use radar_bridge::infrastructure::discovery::DiscoveryError;
use radar_bridge::infrastructure::link::{LinkError, LinkIo};
use radar_bridge::infrastructure::{
    EndpointClaims, LinkOpener, PortDiscovery, PortEnumerator, Supervisor, SupervisorHandle,
};
use radar_core::SerialEndpoint;
use tokio::io::{duplex, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

// ── Fakes ─────────────────────────────────────────────────────────────────────

/// Port list that tests can change while the supervisor runs.
#[derive(Default)]
pub struct FakeEnumerator {
    ports: Mutex<Vec<SerialEndpoint>>,
    calls: AtomicUsize,
}

impl FakeEnumerator {
    pub fn with(ports: Vec<SerialEndpoint>) -> Arc<Self> {
        Arc::new(Self {
            ports: Mutex::new(ports),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, ports: Vec<SerialEndpoint>) {
        *self.ports.lock().unwrap() = ports;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortEnumerator for FakeEnumerator {
    fn available_ports(&self) -> Result<Vec<SerialEndpoint>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ports.lock().unwrap().clone())
    }
}

/// Hands out queued in-memory streams, one per open.
#[derive(Default)]
pub struct DuplexOpener {
    streams: Mutex<VecDeque<DuplexStream>>,
    opens: AtomicUsize,
}

impl DuplexOpener {
    /// Queues a link and returns the device's end of it.
    pub fn plug(&self) -> DuplexStream {
        let (device, host) = duplex(1024);
        self.streams.lock().unwrap().push_back(host);
        device
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkOpener for DuplexOpener {
    async fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn LinkIo>, LinkError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let stream = self.streams.lock().unwrap().pop_front().ok_or_else(|| {
            LinkError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is busy", endpoint.path),
            ))
        })?;
        Ok(Box::new(stream))
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn radar(path: &str) -> SerialEndpoint {
    SerialEndpoint::usb(path, 0x2341, 0x0043)
}

pub fn start(
    enumerator: &Arc<FakeEnumerator>,
    opener: &Arc<DuplexOpener>,
    claims: &EndpointClaims,
) -> (SupervisorHandle, JoinHandle<()>) {
    let config = BridgeConfig::default();
    let discovery = PortDiscovery::new(enumerator.clone(), config.serial.clone());
    Supervisor::spawn(&config, discovery, opener.clone(), claims.clone())
}

/// Waits (in paused time) until the published status satisfies `pred`.
pub async fn wait_until(
    handle: &SupervisorHandle,
    pred: impl FnMut(&DeviceStatus) -> bool,
) -> DeviceStatus {
    let mut rx = handle.subscribe_status();
    let status = timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("status never reached")
        .expect("supervisor stopped")
        .clone();
    status
}
