//! Device connection lifecycle.
//!
//! ```text
//!              start / reconnect
//! Disconnected ───────────────────► Discovering ──(endpoint)──► Connecting
//!      ▲   ▲                             │                          │
//!      │   └──────(nothing found)────────┘                          │ open ok
//!      │                                                            ▼
//!      └──────────(close / unplug / open failure)────────────── Connected
//!
//! Error: transient, entered on OS or link faults; always resolves back to
//! Discovering through the retry timer.
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current state of the single device link.
///
/// Exactly one value holds at any instant.  Only the connection state
/// machine mutates it; everyone else observes snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No link and no scan in progress.  A retry timer may be pending.
    #[default]
    Disconnected,
    /// Enumerating OS serial endpoints.
    Discovering,
    /// An endpoint was selected and is being opened.
    Connecting,
    /// The link is open and telemetry may flow.
    Connected,
    /// A transient fault occurred; the retry path will recover.
    Error,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` when the machine is at rest and may start discovery.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Lowercase name used in logs and the health endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_only_connected_reports_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Error.is_connected());
    }

    #[test]
    fn test_idle_states() {
        assert!(ConnectionState::Disconnected.is_idle());
        assert!(ConnectionState::Error.is_idle());
        assert!(!ConnectionState::Discovering.is_idle());
        assert!(!ConnectionState::Connected.is_idle());
    }

    #[test]
    fn test_display_uses_lowercase_name() {
        assert_eq!(ConnectionState::Discovering.to_string(), "discovering");
        assert_eq!(ConnectionState::Error.to_string(), "error");
    }
}
