//! Telemetry line decoder.
//!
//! The firmware prints one reading per line:
//!
//! ```text
//! Angle: 45 Distance: 120
//! ```
//!
//! The two labelled fields may appear in either order and whitespace around
//! labels and values is ignored.  The older firmware revision printed a
//! compact form which is still accepted:
//!
//! ```text
//! DATA:45,120
//! ```
//!
//! Decoding is stateless and tolerant: anything that does not fit the grammar
//! (status chatter such as `Starting scan...`, truncated lines, non-numeric
//! values, negative distances) is rejected without panicking.  Line framing is
//! handled separately by [`crate::protocol::framing::LineCodec`].

use thiserror::Error;

use crate::domain::telemetry::TelemetryReading;

const ANGLE_LABEL: &str = "Angle:";
const DISTANCE_LABEL: &str = "Distance:";
const LEGACY_PREFIX: &str = "DATA:";

/// Why a line was not turned into a reading.
///
/// Callers normally only care whether a reading came out (see
/// [`decode_line`]); the reason is kept for debug logging.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The line was empty or whitespace only.
    #[error("blank line")]
    Blank,

    /// The line carries neither telemetry label; typically firmware chatter.
    #[error("not a telemetry line")]
    NotTelemetry,

    /// One of the two fields is absent or duplicated.
    #[error("missing or repeated field: {0}")]
    MissingField(&'static str),

    /// Text preceded the first label.
    #[error("unexpected text before telemetry fields")]
    UnexpectedPrefix,

    /// A field value did not parse as the expected integer type.
    #[error("invalid {field} value: {value:?}")]
    InvalidNumber {
        /// `"angle"` or `"distance"`.
        field: &'static str,
        /// The offending text, trimmed.
        value: String,
    },
}

/// Decodes one line into a reading, or `None` if the line is not valid telemetry.
///
/// A distance of `0` yields [`crate::Distance::NoObject`].
///
/// # Examples
///
/// ```rust
/// use radar_core::{decode_line, Distance};
///
/// let reading = decode_line("Angle: 45 Distance: 0").unwrap();
/// assert_eq!(reading.angle, 45);
/// assert_eq!(reading.distance, Distance::NoObject);
///
/// assert!(decode_line("Starting scan...").is_none());
/// ```
pub fn decode_line(line: &str) -> Option<TelemetryReading> {
    parse_line(line).ok()
}

/// Like [`decode_line`] but reports why a line was rejected.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first grammar violation found.
pub fn parse_line(line: &str) -> Result<TelemetryReading, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Blank);
    }

    if let Some(rest) = line.strip_prefix(LEGACY_PREFIX) {
        return parse_legacy(rest);
    }

    parse_labelled(line)
}

fn parse_labelled(line: &str) -> Result<TelemetryReading, DecodeError> {
    let angle_at = find_single(line, ANGLE_LABEL, "angle");
    let distance_at = find_single(line, DISTANCE_LABEL, "distance");

    let (angle_at, distance_at) = match (angle_at, distance_at) {
        (Err(DecodeError::MissingField(_)), Err(DecodeError::MissingField(_)))
            if !line.contains(ANGLE_LABEL) && !line.contains(DISTANCE_LABEL) =>
        {
            return Err(DecodeError::NotTelemetry);
        }
        (a, d) => (a?, d?),
    };

    if !line[..angle_at.min(distance_at)].trim().is_empty() {
        return Err(DecodeError::UnexpectedPrefix);
    }

    let angle_start = angle_at + ANGLE_LABEL.len();
    let distance_start = distance_at + DISTANCE_LABEL.len();
    let (angle_text, distance_text) = if angle_at < distance_at {
        (&line[angle_start..distance_at], &line[distance_start..])
    } else {
        (&line[angle_start..], &line[distance_start..angle_at])
    };

    let angle = parse_field::<i32>(angle_text, "angle")?;
    let distance = parse_field::<u32>(distance_text, "distance")?;
    Ok(TelemetryReading::new(angle, distance))
}

fn parse_legacy(rest: &str) -> Result<TelemetryReading, DecodeError> {
    let (angle_text, distance_text) = rest
        .split_once(',')
        .ok_or(DecodeError::MissingField("distance"))?;
    let angle = parse_field::<i32>(angle_text, "angle")?;
    let distance = parse_field::<u32>(distance_text, "distance")?;
    Ok(TelemetryReading::new(angle, distance))
}

/// Returns the byte offset of `label`, requiring exactly one occurrence.
fn find_single(line: &str, label: &str, field: &'static str) -> Result<usize, DecodeError> {
    let mut hits = line.match_indices(label);
    match (hits.next(), hits.next()) {
        (Some((at, _)), None) => Ok(at),
        _ => Err(DecodeError::MissingField(field)),
    }
}

fn parse_field<T: std::str::FromStr>(text: &str, field: &'static str) -> Result<T, DecodeError> {
    // Separators such as "Angle: 45, Distance: 10" are tolerated.
    let value = text.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
    value.parse::<T>().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
