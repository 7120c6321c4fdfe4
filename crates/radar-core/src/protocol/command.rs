//! Command encoder: the closed vocabulary clients may send to the device.
//!
//! Each command becomes one ASCII character followed by `\n`:
//!
//! | command         | token |
//! |-----------------|-------|
//! | `start`         | `S`   |
//! | `stop`          | `T`   |
//! | `left`          | `L`   |
//! | `right`         | `R`   |
//! | `stop_movement` | `M`   |
//! | `reset`         | `C`   |
//!
//! The encoder knows nothing about device state.  Whether a command is
//! allowed *right now* (connected? scanning?) is decided by the gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line terminator appended after every command token.
pub const COMMAND_TERMINATOR: u8 = b'\n';

/// Returned when a command name is outside the fixed vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommandError(pub String);

/// One of the six commands the radar firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Begin sweeping.
    Start,
    /// Stop sweeping and return to centre.
    Stop,
    /// Pan the sweep to the left while held.
    Left,
    /// Pan the sweep to the right while held.
    Right,
    /// Stop panning.
    StopMovement,
    /// Re-centre the servo and clear the display.
    Reset,
}

impl Command {
    /// Every command, in table order.
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Stop,
        Command::Left,
        Command::Right,
        Command::StopMovement,
        Command::Reset,
    ];

    /// The single-character wire token.
    pub fn token(self) -> u8 {
        match self {
            Self::Start => b'S',
            Self::Stop => b'T',
            Self::Left => b'L',
            Self::Right => b'R',
            Self::StopMovement => b'M',
            Self::Reset => b'C',
        }
    }

    /// The client-facing name, e.g. `"stop_movement"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Left => "left",
            Self::Right => "right",
            Self::StopMovement => "stop_movement",
            Self::Reset => "reset",
        }
    }

    /// Bytes written to the serial link: token plus terminator.
    pub fn to_wire(self) -> [u8; 2] {
        [self.token(), COMMAND_TERMINATOR]
    }

    /// `start`/`stop` change the shared scan state; the rest only move the servo.
    pub fn changes_scan_state(self) -> bool {
        matches!(self, Self::Start | Self::Stop)
    }

    /// The scan state implied by a successful write, if any.
    pub fn resulting_scan_state(self) -> Option<bool> {
        match self {
            Self::Start => Some(true),
            Self::Stop => Some(false),
            _ => None,
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCommandError(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encodes a client command name into wire bytes.
///
/// # Errors
///
/// Returns [`UnknownCommandError`] for any name outside the vocabulary.
/// Matching is exact and case-sensitive.
///
/// # Examples
///
/// ```rust
/// use radar_core::encode_command;
///
/// assert_eq!(encode_command("start").unwrap(), b"S\n".to_vec());
/// assert!(encode_command("fire").is_err());
/// ```
pub fn encode_command(command: &str) -> Result<Vec<u8>, UnknownCommandError> {
    let command: Command = command.parse()?;
    Ok(command.to_wire().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_table() {
        let expected = [
            ("start", b"S\n"),
            ("stop", b"T\n"),
            ("left", b"L\n"),
            ("right", b"R\n"),
            ("stop_movement", b"M\n"),
            ("reset", b"C\n"),
        ];
        for (name, wire) in expected {
            assert_eq!(encode_command(name).unwrap(), wire.to_vec(), "{name}");
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert_eq!(
            encode_command("jump"),
            Err(UnknownCommandError("jump".to_string()))
        );
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(encode_command("START").is_err());
        assert!(encode_command(" start").is_err());
        assert!(encode_command("").is_err());
    }

    #[test]
    fn test_only_start_and_stop_change_scan_state() {
        let changing: Vec<_> = Command::ALL
            .into_iter()
            .filter(|c| c.changes_scan_state())
            .collect();
        assert_eq!(changing, vec![Command::Start, Command::Stop]);
        assert_eq!(Command::Start.resulting_scan_state(), Some(true));
        assert_eq!(Command::Stop.resulting_scan_state(), Some(false));
        assert_eq!(Command::Left.resulting_scan_state(), None);
    }

    #[test]
    fn test_name_parse_agrees() {
        for c in Command::ALL {
            assert_eq!(c.name().parse::<Command>().unwrap(), c);
        }
    }
}
