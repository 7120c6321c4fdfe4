//! The open serial link.
//!
//! A [`LinkHandle`] owns one open endpoint.  Opening a handle is the single
//! place where the process claims an endpoint: the claim lives in
//! [`EndpointClaims`] for as long as the handle exists, and a second open of
//! the same path fails fast with [`LinkError::AlreadyOpen`].
//!
//! # Data flow
//!
//! ```text
//! serial bytes ─► FramedRead<LineCodec> ─► parse_line ─► broadcast<TelemetryReading>
//!                                   end of stream / error ─► mpsc<LinkEvent>
//! Command bytes ─► LinkHandle::write ─► serial
//! ```
//!
//! The handle itself contains no business logic; it only moves bytes and
//! reports how the stream ended.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use radar_core::{parse_line, DecodeError, LineCodec, LineCodecError, SerialEndpoint, TelemetryReading};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace, warn};

/// Upper bound on a single command write (including flush).
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LinkError {
    /// Another handle in this process already holds the endpoint.
    #[error("{0} is already open")]
    AlreadyOpen(String),

    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

// ── Opening ───────────────────────────────────────────────────────────────────

/// Byte stream a link runs over.  Implemented for anything async-readable and
/// writable, so tests can use `tokio::io::duplex`.
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> LinkIo for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens the byte stream behind an endpoint.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn LinkIo>, LinkError>;
}

/// [`LinkOpener`] for real serial ports (8N1, no flow control).
#[derive(Debug, Clone, Copy)]
pub struct SerialLinkOpener {
    baud_rate: u32,
}

impl SerialLinkOpener {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

#[async_trait]
impl LinkOpener for SerialLinkOpener {
    async fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn LinkIo>, LinkError> {
        #[allow(unused_mut)]
        let mut port = tokio_serial::new(&endpoint.path, self.baud_rate)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                path: endpoint.path.clone(),
                source,
            })?;

        // Keep other processes off the TTY while we hold it.
        #[cfg(unix)]
        {
            if let Err(e) = port.set_exclusive(true) {
                warn!("could not lock {} for exclusive use: {e}", endpoint.path);
            }
        }

        info!("serial endpoint {} opened at {} baud", endpoint.path, self.baud_rate);
        Ok(Box::new(port))
    }
}

// ── Endpoint claims ───────────────────────────────────────────────────────────

/// Set of endpoint paths currently held open by this process.
#[derive(Debug, Clone, Default)]
pub struct EndpointClaims {
    held: Arc<Mutex<HashSet<String>>>,
}

impl EndpointClaims {
    /// The process-wide registry used by the running bridge.
    pub fn global() -> &'static EndpointClaims {
        static CLAIMS: OnceLock<EndpointClaims> = OnceLock::new();
        CLAIMS.get_or_init(EndpointClaims::default)
    }

    /// Claims `path`, failing if it is already held.
    pub fn claim(&self, path: &str) -> Result<EndpointClaim, LinkError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(path.to_string()) {
            return Err(LinkError::AlreadyOpen(path.to_string()));
        }
        Ok(EndpointClaim {
            path: path.to_string(),
            claims: self.clone(),
        })
    }

    pub fn is_claimed(&self, path: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Number of endpoints currently held.
    pub fn len(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proof of ownership of one endpoint.  Released on drop.
#[derive(Debug)]
pub struct EndpointClaim {
    path: String,
    claims: EndpointClaims,
}

impl Drop for EndpointClaim {
    fn drop(&mut self) {
        self.claims
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

// ── Link handle ───────────────────────────────────────────────────────────────

/// How a link's byte stream ended.  Sent once per link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// End of stream or a disconnect-class error (device unplugged).
    Closed { link_id: u64, reason: String },
    /// Any other read error.
    Failed { link_id: u64, error: String },
}

impl LinkEvent {
    pub fn link_id(&self) -> u64 {
        match self {
            Self::Closed { link_id, .. } | Self::Failed { link_id, .. } => *link_id,
        }
    }
}

/// One open endpoint plus the task reading telemetry from it.
pub struct LinkHandle {
    id: u64,
    endpoint: SerialEndpoint,
    writer: WriteHalf<Box<dyn LinkIo>>,
    reader: JoinHandle<()>,
    _claim: EndpointClaim,
}

impl LinkHandle {
    /// Claims and opens `endpoint`, then starts its reader task.
    ///
    /// Decoded readings go to `telemetry`; the single terminal [`LinkEvent`]
    /// goes to `events`.
    pub async fn open(
        id: u64,
        endpoint: SerialEndpoint,
        opener: &dyn LinkOpener,
        claims: &EndpointClaims,
        telemetry: broadcast::Sender<TelemetryReading>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self, LinkError> {
        let claim = claims.claim(&endpoint.path)?;
        let stream = opener.open(&endpoint).await?;
        let (reader, writer) = tokio::io::split(stream);

        let path = endpoint.path.clone();
        let reader = tokio::spawn(read_telemetry(id, path, reader, telemetry, events));

        Ok(Self {
            id,
            endpoint,
            writer,
            reader,
            _claim: claim,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &SerialEndpoint {
        &self.endpoint
    }

    /// Writes `bytes` and flushes, bounded by [`WRITE_TIMEOUT`].
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let writer = &mut self.writer;
        timeout(WRITE_TIMEOUT, async move {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| WriteError::Timeout(WRITE_TIMEOUT))??;
        Ok(())
    }

    /// Stops the reader and releases the endpoint.
    pub fn close(self) {
        debug!("closing link {} on {}", self.id, self.endpoint.path);
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reader task: frames lines, decodes telemetry, reports how the stream ended.
async fn read_telemetry<R>(
    link_id: u64,
    path: String,
    reader: R,
    telemetry: broadcast::Sender<TelemetryReading>,
    events: mpsc::UnboundedSender<LinkEvent>,
) where
    R: AsyncRead + Unpin,
{
    let codec = LineCodec::new();
    debug!("reading telemetry from {path} (lines up to {} bytes)", codec.max_length());
    let mut lines = FramedRead::new(reader, codec);

    let event = loop {
        match lines.next().await {
            Some(Ok(line)) => match parse_line(&line) {
                Ok(reading) => {
                    // No receivers simply means no session is listening yet.
                    let _ = telemetry.send(reading);
                }
                Err(DecodeError::NotTelemetry) => debug!("{path}: {line}"),
                Err(e) => trace!("{path}: dropped {line:?}: {e}"),
            },
            Some(Err(LineCodecError::Io(e))) if is_disconnect(&e) => {
                break LinkEvent::Closed {
                    link_id,
                    reason: e.to_string(),
                };
            }
            Some(Err(LineCodecError::Io(e))) => {
                break LinkEvent::Failed {
                    link_id,
                    error: e.to_string(),
                };
            }
            None => {
                break LinkEvent::Closed {
                    link_id,
                    reason: "end of stream".to_string(),
                };
            }
        }
    };

    debug!("reader for {path} finished: {event:?}");
    let _ = events.send(event);
}

/// Errors that mean the device went away rather than misbehaved.
fn is_disconnect(e: &io::Error) -> bool {
    use io::ErrorKind::*;
    if matches!(
        e.kind(),
        BrokenPipe | UnexpectedEof | ConnectionReset | ConnectionAborted | NotConnected | NotFound
    ) {
        return true;
    }

    #[cfg(unix)]
    const DISCONNECT_CODES: &[i32] = &[
        5,  // EIO
        6,  // ENXIO
        19, // ENODEV
    ];
    #[cfg(windows)]
    const DISCONNECT_CODES: &[i32] = &[
        995,  // ERROR_OPERATION_ABORTED
        1167, // ERROR_DEVICE_NOT_CONNECTED
    ];
    #[cfg(not(any(unix, windows)))]
    const DISCONNECT_CODES: &[i32] = &[];

    e.raw_os_error()
        .map_or(false, |code| DISCONNECT_CODES.contains(&code))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
