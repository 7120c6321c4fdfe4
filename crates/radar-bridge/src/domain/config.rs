//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It starts from [`Default`], is overlaid by the optional TOML file, and is
//! finally overridden by CLI arguments / environment variables.
//!
//! The infrastructure layer is responsible for populating the struct; nothing
//! in here reads files or the environment.

use std::net::SocketAddr;
use std::time::Duration;

use radar_core::UsbIdentity;

/// Serial-side settings: how the device is found and how the link is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line speed used when opening the endpoint.
    pub baud_rate: u32,

    /// Explicit endpoint path (e.g. `/dev/ttyUSB0` or `COM3`).
    ///
    /// Only honoured when the path appears in the enumerated endpoint list;
    /// a stale override never bypasses discovery.
    pub port_override: Option<String>,

    /// Vendor/product identities that mark an endpoint as the radar.
    pub known_devices: Vec<UsbIdentity>,

    /// Case-insensitive substrings matched against the endpoint path and its
    /// USB manufacturer/product strings.
    pub name_hints: Vec<String>,

    /// Platform naming conventions used when no identity or hint matches.
    pub fallback_prefixes: Vec<String>,
}

impl SerialConfig {
    /// USB identities of the boards the radar firmware usually runs on.
    ///
    /// | Chip / board | VID    | PID    |
    /// |--------------|--------|--------|
    /// | Arduino      | 0x2341 | any    |
    /// | CH340        | 0x1A86 | 0x7523 |
    /// | FTDI FT232   | 0x0403 | 0x6001 |
    /// | CP210x       | 0x10C4 | 0xEA60 |
    pub fn default_known_devices() -> Vec<UsbIdentity> {
        vec![
            UsbIdentity::vendor(0x2341),
            UsbIdentity::exact(0x1A86, 0x7523),
            UsbIdentity::exact(0x0403, 0x6001),
            UsbIdentity::exact(0x10C4, 0xEA60),
        ]
    }

    pub fn default_name_hints() -> Vec<String> {
        ["arduino", "ch340", "usb-serial", "usb serial", "wch"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Endpoint path prefixes for the platform this binary was built for.
    pub fn default_fallback_prefixes() -> Vec<String> {
        let prefixes: &[&str] = if cfg!(windows) {
            &["COM"]
        } else if cfg!(target_os = "macos") {
            &["/dev/cu.usbmodem", "/dev/cu.usbserial"]
        } else {
            &["/dev/ttyUSB", "/dev/ttyACM"]
        };
        prefixes.iter().map(|s| s.to_string()).collect()
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            port_override: None,
            known_devices: Self::default_known_devices(),
            name_hints: Self::default_name_hints(),
            fallback_prefixes: Self::default_fallback_prefixes(),
        }
    }
}

/// All runtime configuration for the radar bridge.
///
/// # Example
///
/// ```rust
/// use radar_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 3020);
/// assert_eq!(cfg.serial.baud_rate, 115_200);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server (and HTTP endpoints) binds to.
    pub ws_bind_addr: SocketAddr,

    pub serial: SerialConfig,

    /// Fixed delay before discovery is retried after a miss or a lost link.
    pub retry_delay: Duration,

    /// How often the port monitor re-enumerates serial endpoints.
    pub monitor_interval: Duration,

    /// Reject `left`/`right`/`stop_movement`/`reset` unless a scan is running.
    pub movement_requires_scan: bool,
}

impl Default for BridgeConfig {
    /// | Field                  | Default          |
    /// |------------------------|------------------|
    /// | ws_bind_addr           | `0.0.0.0:3020`   |
    /// | serial.baud_rate       | 115200           |
    /// | retry_delay            | 5 seconds        |
    /// | monitor_interval       | 3 seconds        |
    /// | movement_requires_scan | `true`           |
    fn default() -> Self {
        Self {
            // The `.parse().unwrap()` call here is safe because this is a
            // compile-time-known valid socket address string.
            ws_bind_addr: "0.0.0.0:3020".parse().unwrap(),
            serial: SerialConfig::default(),
            retry_delay: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(3),
            movement_requires_scan: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ws_port_is_3020() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 3020);
        assert!(cfg.ws_bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_timers_match_reference_behaviour() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.monitor_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_default_serial_settings() {
        let serial = SerialConfig::default();
        assert_eq!(serial.baud_rate, 115_200);
        assert!(serial.port_override.is_none());
        assert!(serial.known_devices.contains(&UsbIdentity::vendor(0x2341)));
        assert!(serial.name_hints.iter().any(|h| h == "ch340"));
    }

    #[test]
    fn test_default_fallback_prefixes_are_not_empty() {
        // Every supported platform has at least one naming convention.
        assert!(!SerialConfig::default_fallback_prefixes().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_fallback_prefixes() {
        let prefixes = SerialConfig::default_fallback_prefixes();
        assert_eq!(prefixes, vec!["/dev/ttyUSB", "/dev/ttyACM"]);
    }

    #[test]
    fn test_movement_gating_enabled_by_default() {
        assert!(BridgeConfig::default().movement_requires_scan);
    }
}
