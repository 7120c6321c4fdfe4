//! Line framing for the raw serial byte stream.
//!
//! A serial `read()` may return half a line or several lines at once.
//! [`LineCodec`] buffers bytes and yields one `String` per `\n`-terminated
//! line, which the telemetry decoder then interprets.
//!
//! Framing rules:
//!
//! - Split on a single `\n`; a preceding `\r` is stripped.
//! - Empty lines are dropped.
//! - Invalid UTF-8 is decoded lossily (the device prints garbage while the
//!   bootloader runs after a reset).
//! - A line longer than [`MAX_LINE_LENGTH`] bytes is discarded up to the next
//!   newline so a device that never prints `\n` cannot grow the buffer forever.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio_util::codec::Decoder;
use tracing::debug;

/// Longest accepted line in bytes, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 256;

/// Errors surfaced by [`LineCodec`].
///
/// Framing itself never fails; the only errors come from the underlying reader.
#[derive(Debug, Error)]
pub enum LineCodecError {
    /// The serial read failed (device unplugged, driver error, ...).
    #[error("serial read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A `tokio_util` decoder that splits a byte stream into text lines.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Bytes before this index are known to contain no newline.
    next_index: usize,
    /// `true` while skipping the remainder of an over-long line.
    discarding: bool,
    max_length: usize,
}

impl LineCodec {
    /// Creates a codec with the default [`MAX_LINE_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Creates a codec with a custom maximum line length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            discarding: false,
            max_length,
        }
    }

    /// Maximum accepted line length in bytes.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LineCodecError> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let newline = buf[self.next_index.min(read_to)..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    // End of the over-long line: drop it including the newline.
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_at = self.next_index + offset;
                    self.next_index = 0;
                    let frame = buf.split_to(newline_at + 1);
                    let line = strip_terminator(&frame);
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(String::from_utf8_lossy(line).into_owned()));
                }
                (false, None) if buf.len() > self.max_length => {
                    debug!(
                        "discarding serial line longer than {} bytes",
                        self.max_length
                    );
                    self.discarding = true;
                    self.next_index = 0;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LineCodecError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        // Flush a trailing unterminated line when the stream ends.
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        let line = strip_terminator(&rest);
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

/// Removes a trailing `\n` and then a trailing `\r`, if present.
fn strip_terminator(frame: &[u8]) -> &[u8] {
    let frame = frame.strip_suffix(b"\n").unwrap_or(frame);
    frame.strip_suffix(b"\r").unwrap_or(frame)
}
