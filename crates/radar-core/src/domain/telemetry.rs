//! Telemetry readings produced by the radar during a sweep.
//!
//! The firmware reports a distance of `0` when the ultrasonic echo timed out,
//! i.e. nothing was in range.  That value is a sentinel, not a measurement:
//! [`Distance::NoObject`] keeps it distinct from every real reading so no
//! consumer can mistake it for "an object at 0 cm".

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Distance component of a reading.
///
/// On the wire (both serial and JSON) the sentinel is encoded as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Distance {
    /// No echo: nothing detected within range.
    NoObject,
    /// An object was detected this many centimetres away.
    Centimeters(NonZeroU32),
}

impl Distance {
    /// Returns the measured distance, or `None` for the sentinel.
    pub fn centimeters(self) -> Option<u32> {
        match self {
            Self::NoObject => None,
            Self::Centimeters(cm) => Some(cm.get()),
        }
    }

    /// Returns `true` for [`Distance::NoObject`].
    pub fn is_no_object(self) -> bool {
        matches!(self, Self::NoObject)
    }

    /// Wire value: the centimetre count, or `0` for the sentinel.
    pub fn wire_value(self) -> u32 {
        self.centimeters().unwrap_or(0)
    }
}

impl From<u32> for Distance {
    fn from(raw: u32) -> Self {
        NonZeroU32::new(raw).map_or(Self::NoObject, Self::Centimeters)
    }
}

impl From<Distance> for u32 {
    fn from(distance: Distance) -> Self {
        distance.wire_value()
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoObject => f.write_str("no object"),
            Self::Centimeters(cm) => write!(f, "{cm} cm"),
        }
    }
}

/// One decoded measurement: servo angle plus distance.
///
/// Readings are immutable and never retained by the bridge; they are
/// forwarded to every session and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Sweep angle in degrees as reported by the firmware (may be negative).
    pub angle: i32,
    /// Distance to the nearest object, or the "no object" sentinel.
    pub distance: Distance,
}

impl TelemetryReading {
    /// Builds a reading from raw wire values (`distance == 0` becomes the sentinel).
    pub fn new(angle: i32, raw_distance: u32) -> Self {
        Self {
            angle,
            distance: Distance::from(raw_distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_no_object_sentinel() {
        let d = Distance::from(0);
        assert_eq!(d, Distance::NoObject);
        assert!(d.is_no_object());
        assert_eq!(d.centimeters(), None);
    }

    #[test]
    fn test_positive_distance_is_a_measurement() {
        let d = Distance::from(1);
        assert!(!d.is_no_object());
        assert_eq!(d.centimeters(), Some(1));
    }

    #[test]
    fn test_sentinel_differs_from_every_positive_distance() {
        let sentinel = TelemetryReading::new(45, 0);
        for cm in [1, 2, 50, 400, u32::MAX] {
            assert_ne!(sentinel, TelemetryReading::new(45, cm));
        }
    }

    #[test]
    fn test_wire_value_round_trips() {
        assert_eq!(u32::from(Distance::from(0)), 0);
        assert_eq!(u32::from(Distance::from(123)), 123);
    }

    #[test]
    fn test_display() {
        assert_eq!(Distance::NoObject.to_string(), "no object");
        assert_eq!(Distance::from(12).to_string(), "12 cm");
    }
}
