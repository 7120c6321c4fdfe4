//! Optional TOML configuration file.
//!
//! Every key is optional: whatever the file names is laid over
//! [`BridgeConfig::default()`], and CLI arguments are applied afterwards.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3020
//! movement_requires_scan = true
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! name_hints = ["arduino", "ch340"]
//! fallback_prefixes = ["/dev/ttyUSB", "/dev/ttyACM"]
//!
//! # Replaces the built-in identity list when present.
//! [[serial.devices]]
//! vid = 0x2341
//!
//! [[serial.devices]]
//! vid = 0x1A86
//! pid = 0x7523
//!
//! [timing]
//! retry_delay_secs = 5
//! monitor_interval_secs = 3
//!
//! [logging]
//! level = "debug"
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use radar_core::UsbIdentity;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::BridgeConfig;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── File schema ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub serial: SerialSection,
    pub timing: TimingSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Interface to listen on, e.g. `"0.0.0.0"`.
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub movement_requires_scan: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    /// Explicit endpoint path.
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub devices: Option<Vec<UsbIdentity>>,
    pub name_hints: Option<Vec<String>>,
    pub fallback_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    pub retry_delay_secs: Option<u64>,
    pub monitor_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"radar_bridge=debug"`.
    pub level: Option<String>,
}

impl FileConfig {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.level.as_deref()
    }

    /// Lays every key present in the file over `config`.
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = self.server.host {
            config.ws_bind_addr.set_ip(host);
        }
        if let Some(port) = self.server.port {
            config.ws_bind_addr.set_port(port);
        }
        if let Some(gate) = self.server.movement_requires_scan {
            config.movement_requires_scan = gate;
        }

        let serial = &mut config.serial;
        if let Some(port) = &self.serial.port {
            serial.port_override = Some(port.clone());
        }
        if let Some(baud) = self.serial.baud_rate {
            serial.baud_rate = baud;
        }
        if let Some(devices) = &self.serial.devices {
            serial.known_devices = devices.clone();
        }
        if let Some(hints) = &self.serial.name_hints {
            serial.name_hints = hints.clone();
        }
        if let Some(prefixes) = &self.serial.fallback_prefixes {
            serial.fallback_prefixes = prefixes.clone();
        }

        if let Some(secs) = self.timing.retry_delay_secs {
            config.retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.timing.monitor_interval_secs {
            config.monitor_interval = Duration::from_secs(secs);
        }
    }
}

/// Rejects settings the runtime cannot work with.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first offending setting.
pub fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.serial.baud_rate == 0 {
        return Err(ConfigError::Invalid("baud rate must be positive".into()));
    }
    if config.retry_delay.is_zero() {
        return Err(ConfigError::Invalid("retry delay must be positive".into()));
    }
    if config.monitor_interval.is_zero() {
        return Err(ConfigError::Invalid("monitor interval must be positive".into()));
    }
    if config.serial.port_override.as_deref() == Some("") {
        return Err(ConfigError::Invalid("serial port override is empty".into()));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_changes_nothing() {
        // Arrange
        let file = FileConfig::parse("").unwrap();
        let mut cfg = BridgeConfig::default();

        // Act
        file.apply(&mut cfg);

        // Assert
        assert_eq!(cfg.ws_bind_addr, BridgeConfig::default().ws_bind_addr);
        assert_eq!(cfg.serial, BridgeConfig::default().serial);
        assert!(file.log_level().is_none());
    }

    #[test]
    fn test_full_file_overrides_every_section() {
        let text = r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            movement_requires_scan = false

            [serial]
            port = "/dev/ttyACM0"
            baud_rate = 9600
            name_hints = ["radar"]

            [[serial.devices]]
            vid = 0x2341

            [[serial.devices]]
            vid = 0x1A86
            pid = 0x7523

            [timing]
            retry_delay_secs = 10
            monitor_interval_secs = 1

            [logging]
            level = "debug"
        "#;
        let file = FileConfig::parse(text).unwrap();
        let mut cfg = BridgeConfig::default();

        file.apply(&mut cfg);

        assert_eq!(cfg.ws_bind_addr, "127.0.0.1:9000".parse::<std::net::SocketAddr>().unwrap());
        assert!(!cfg.movement_requires_scan);
        assert_eq!(cfg.serial.port_override.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.name_hints, vec!["radar"]);
        assert_eq!(
            cfg.serial.known_devices,
            vec![UsbIdentity::vendor(0x2341), UsbIdentity::exact(0x1A86, 0x7523)]
        );
        assert_eq!(cfg.retry_delay, Duration::from_secs(10));
        assert_eq!(cfg.monitor_interval, Duration::from_secs(1));
        assert_eq!(file.log_level(), Some("debug"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = FileConfig::parse("[server]\nlisten = \"0.0.0.0\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = FileConfig::load(Path::new("/nonexistent/radar-bridge.toml"));
        match result {
            Err(ConfigError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/radar-bridge.toml"))
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_timers() {
        let mut cfg = BridgeConfig::default();
        assert!(validate(&cfg).is_ok());

        cfg.monitor_interval = Duration::ZERO;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_baud() {
        let mut cfg = BridgeConfig::default();
        cfg.serial.baud_rate = 0;
        assert!(validate(&cfg).is_err());
    }
}
