//! Radar bridge: entry point.
//!
//! This binary owns one serial-attached radar and shares it with any number of
//! WebSocket clients.  Readings decoded from the serial line are broadcast to
//! every session as JSON; commands from any session are validated and written
//! to the device as single characters.
//!
//! # Usage
//!
//! ```text
//! radar-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML configuration file
//!   --ws-bind <IP>              Listener interface [default: 0.0.0.0]
//!   --ws-port <PORT>            Listener port [default: 3020]
//!   --serial-port <PATH>        Use this endpoint if it is present
//!   --baud-rate <BAUD>          Serial line speed [default: 115200]
//!   --retry-delay <SECS>        Discovery retry delay [default: 5]
//!   --monitor-interval <SECS>   Endpoint poll interval [default: 3]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                |
//! |-------------------|----------------------------|
//! | `RADAR_WS_BIND`   | Listener interface         |
//! | `RADAR_WS_PORT`   | Listener port              |
//! | `SERIAL_PORT`     | Serial endpoint override   |
//! | `RADAR_BAUD_RATE` | Serial line speed          |
//! | `RUST_LOG`        | `tracing` filter           |
//!
//! Precedence: built-in defaults, then the config file, then CLI/environment.
//!
//! # Endpoints
//!
//! - `ws://HOST:PORT/` JSON session (`action` in; `status`/`telemetry`/`error` out)
//! - `GET /health` connection and scan snapshot
//! - `POST /reconnect` retry discovery now

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use radar_bridge::application::Gateway;
use radar_bridge::domain::BridgeConfig;
use radar_bridge::infrastructure::config_file::validate;
use radar_bridge::infrastructure::{
    run_server, EndpointClaims, FileConfig, PortDiscovery, SerialLinkOpener, Supervisor,
    SystemPortEnumerator,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial radar to WebSocket bridge.
///
/// Every option is optional; unset options fall back to the config file and
/// then to built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "radar-bridge",
    about = "Bridges a serial radar to WebSocket clients",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "RADAR_WS_BIND")]
    ws_bind: Option<String>,

    /// TCP port for WebSocket sessions and the HTTP endpoints.
    #[arg(long, env = "RADAR_WS_PORT")]
    ws_port: Option<u16>,

    /// Serial endpoint to use (e.g. `/dev/ttyUSB0` or `COM3`).
    ///
    /// Only honoured while the endpoint is present on the system.
    #[arg(long, env = "SERIAL_PORT")]
    serial_port: Option<String>,

    /// Serial line speed.
    #[arg(long, env = "RADAR_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// Seconds to wait before retrying discovery.
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Seconds between endpoint polls.
    #[arg(long)]
    monitor_interval: Option<u64>,
}

impl Cli {
    /// Overrides `config` with every argument that was given.
    ///
    /// # Errors
    ///
    /// Returns an error if `--ws-bind` is not a valid IP address.
    fn apply_to(&self, config: &mut BridgeConfig) -> anyhow::Result<()> {
        if let Some(bind) = &self.ws_bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid WebSocket bind address: '{bind}'"))?;
            config.ws_bind_addr.set_ip(ip);
        }
        if let Some(port) = self.ws_port {
            config.ws_bind_addr.set_port(port);
        }
        if let Some(path) = &self.serial_port {
            config.serial.port_override = Some(path.clone());
        }
        if let Some(baud) = self.baud_rate {
            config.serial.baud_rate = baud;
        }
        if let Some(secs) = self.retry_delay {
            config.retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.monitor_interval {
            config.monitor_interval = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Builds the effective configuration: defaults, then file, then CLI.
    ///
    /// Also returns the file's log level, if it names one.
    fn into_bridge_config(self) -> anyhow::Result<(BridgeConfig, Option<String>)> {
        let mut config = BridgeConfig::default();
        let mut log_level = None;

        if let Some(path) = &self.config {
            let file = FileConfig::load(path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            file.apply(&mut config);
            log_level = file.log_level().map(str::to_string);
        }

        self.apply_to(&mut config)?;
        validate(&config)?;
        Ok((config, log_level))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the optional config file.
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over the file's
///    `[logging] level`, which wins over `info`.
/// 3. The connection supervisor is spawned and starts discovery.
/// 4. The gateway relay forwards telemetry and connection changes to sessions.
/// 5. [`run_server`] serves HTTP and WebSocket requests until Ctrl+C.
/// 6. The supervisor releases the serial link and stops.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, file_log_level) = cli.into_bridge_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    let fallback = file_log_level.unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    info!(
        "radar bridge starting (listen={}, baud={}, retry={:?}, monitor={:?})",
        config.ws_bind_addr,
        config.serial.baud_rate,
        config.retry_delay,
        config.monitor_interval
    );

    // ── Device side ───────────────────────────────────────────────────────────
    let discovery = PortDiscovery::new(Arc::new(SystemPortEnumerator), config.serial.clone());
    let opener = Arc::new(SerialLinkOpener::new(config.serial.baud_rate));
    let (supervisor, supervisor_task) =
        Supervisor::spawn(&config, discovery, opener, EndpointClaims::global().clone());

    // ── Session side ──────────────────────────────────────────────────────────
    let gateway = Arc::new(Gateway::new(
        Arc::new(supervisor.clone()),
        config.movement_requires_scan,
    ));
    let relay = tokio::spawn(Arc::clone(&gateway).relay(
        supervisor.subscribe_telemetry(),
        supervisor.subscribe_status(),
    ));

    // ── Main server loop ──────────────────────────────────────────────────────
    let served = run_server(config.ws_bind_addr, gateway, shutdown_signal()).await;

    supervisor.shutdown().await;
    if let Err(e) = supervisor_task.await {
        error!("supervisor task failed: {e}");
    }
    relay.abort();

    served?;
    info!("radar bridge stopped");
    Ok(())
}

/// Resolves on Ctrl+C.  If the signal handler cannot be installed the server
/// keeps running until the process is killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; initiating graceful shutdown"),
        Err(e) => {
            error!("failed to listen for Ctrl+C signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
