//! Serial endpoint discovery.
//!
//! Enumeration (an OS query) sits behind the [`PortEnumerator`] trait; the
//! choice of endpoint is the pure function [`select_endpoint`].  Keeping the
//! two apart lets tests feed arbitrary endpoint lists without hardware.
//!
//! # Selection order
//!
//! 1. Explicit override path (only if it is currently enumerated).
//! 2. First endpoint whose USB vendor/product matches a known identity.
//! 3. First endpoint whose path or USB descriptor strings contain a name hint.
//! 4. First endpoint whose path starts with a platform fallback prefix.

use std::sync::Arc;

use radar_core::SerialEndpoint;
use thiserror::Error;
use tokio_serial::SerialPortType;
use tracing::{debug, warn};

use crate::domain::SerialConfig;

/// Errors from the OS while listing serial endpoints.
///
/// An empty list is *not* an error.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("serial enumeration failed: {0}")]
    Enumerate(#[from] tokio_serial::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("enumeration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Lists the serial endpoints currently present on the system.
#[cfg_attr(test, mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    fn available_ports(&self) -> Result<Vec<SerialEndpoint>, DiscoveryError>;
}

/// [`PortEnumerator`] backed by the operating system (via `tokio-serial`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortEnumerator;

impl PortEnumerator for SystemPortEnumerator {
    fn available_ports(&self) -> Result<Vec<SerialEndpoint>, DiscoveryError> {
        let ports = tokio_serial::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    SerialEndpoint::usb(port.port_name, usb.vid, usb.pid)
                        .with_descriptors(usb.manufacturer, usb.product)
                }
                _ => SerialEndpoint::new(port.port_name),
            })
            .collect())
    }
}

/// Port discovery: enumerate, then pick the radar.
#[derive(Clone)]
pub struct PortDiscovery {
    enumerator: Arc<dyn PortEnumerator>,
    criteria: SerialConfig,
}

impl PortDiscovery {
    pub fn new(enumerator: Arc<dyn PortEnumerator>, criteria: SerialConfig) -> Self {
        Self {
            enumerator,
            criteria,
        }
    }

    /// Every endpoint currently present.
    pub fn list(&self) -> Result<Vec<SerialEndpoint>, DiscoveryError> {
        self.enumerator.available_ports()
    }

    /// The endpoint the bridge should open, or `None` when nothing matches.
    pub fn discover(&self) -> Result<Option<SerialEndpoint>, DiscoveryError> {
        let ports = self.list()?;
        debug!("enumerated {} serial endpoint(s)", ports.len());
        Ok(select_endpoint(&ports, &self.criteria))
    }

    /// [`list`](Self::list) on the blocking pool, off the async workers.
    pub async fn list_blocking(&self) -> Result<Vec<SerialEndpoint>, DiscoveryError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.list()).await?
    }

    /// [`discover`](Self::discover) on the blocking pool.
    pub async fn discover_blocking(&self) -> Result<Option<SerialEndpoint>, DiscoveryError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.discover()).await?
    }
}

/// Picks the endpoint to open from an enumerated list.
pub fn select_endpoint(ports: &[SerialEndpoint], criteria: &SerialConfig) -> Option<SerialEndpoint> {
    if ports.is_empty() {
        return None;
    }

    if let Some(wanted) = criteria.port_override.as_deref() {
        let found = ports.iter().find(|p| p.path == wanted).cloned();
        if found.is_none() {
            warn!("configured serial port {wanted} is not present");
        }
        return found;
    }

    let by_identity = ports.iter().find(|p| {
        criteria
            .known_devices
            .iter()
            .any(|id| p.matches_identity(id))
    });
    if let Some(port) = by_identity {
        debug!(path = %port.path, "matched known USB identity");
        return Some(port.clone());
    }

    let by_name = ports
        .iter()
        .find(|p| criteria.name_hints.iter().any(|hint| p.mentions(hint)));
    if let Some(port) = by_name {
        debug!(path = %port.path, "matched device name hint");
        return Some(port.clone());
    }

    ports
        .iter()
        .find(|p| {
            criteria
                .fallback_prefixes
                .iter()
                .any(|prefix| p.path.starts_with(prefix.as_str()))
        })
        .cloned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
