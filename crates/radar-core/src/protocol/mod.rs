//! Serial wire protocol: line framing, telemetry decoding, command encoding.

pub mod command;
pub mod framing;
pub mod telemetry;

pub use command::{encode_command, Command, UnknownCommandError};
pub use framing::{LineCodec, LineCodecError, MAX_LINE_LENGTH};
pub use telemetry::{decode_line, parse_line, DecodeError};
