//! Serial endpoint descriptors.
//!
//! A [`SerialEndpoint`] is a snapshot of one OS-level serial path taken during
//! a discovery scan.  Endpoints are recreated on every scan and never
//! persisted; two endpoints are equal when every reported field matches.

use serde::{Deserialize, Serialize};

/// USB vendor/product identifier pair.
///
/// Used both for endpoints (what the OS reported) and for configuration (which
/// adapters are known to carry the radar firmware).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbIdentity {
    /// USB vendor ID, e.g. `0x2341` for Arduino.
    pub vid: u16,
    /// USB product ID.  `None` in configuration means "any product from this vendor".
    #[serde(default)]
    pub pid: Option<u16>,
}

impl UsbIdentity {
    /// Creates an identity that matches one exact vendor/product pair.
    pub const fn exact(vid: u16, pid: u16) -> Self {
        Self {
            vid,
            pid: Some(pid),
        }
    }

    /// Creates an identity that matches every product of a vendor.
    pub const fn vendor(vid: u16) -> Self {
        Self { vid, pid: None }
    }

    /// Returns `true` when `vid`/`pid` reported by the OS satisfy this identity.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid.map_or(true, |p| p == pid)
    }
}

/// One addressable serial path, e.g. `/dev/ttyUSB0` or `COM3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialEndpoint {
    /// OS path or port name used to open the endpoint.
    pub path: String,
    /// USB vendor ID when the endpoint is a USB adapter.
    pub vid: Option<u16>,
    /// USB product ID when the endpoint is a USB adapter.
    pub pid: Option<u16>,
    /// Manufacturer string reported by the USB descriptor.
    pub manufacturer: Option<String>,
    /// Product string reported by the USB descriptor.
    pub product: Option<String>,
}

impl SerialEndpoint {
    /// Creates an endpoint with only a path (non-USB or unknown hardware).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Creates a USB endpoint with vendor/product identifiers.
    pub fn usb(path: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            vid: Some(vid),
            pid: Some(pid),
            ..Self::new(path)
        }
    }

    /// Sets the manufacturer/product descriptor strings.
    pub fn with_descriptors(
        mut self,
        manufacturer: Option<String>,
        product: Option<String>,
    ) -> Self {
        self.manufacturer = manufacturer;
        self.product = product;
        self
    }

    /// Returns `true` if the endpoint's USB identifiers satisfy `identity`.
    pub fn matches_identity(&self, identity: &UsbIdentity) -> bool {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => identity.matches(vid, pid),
            _ => false,
        }
    }

    /// Returns `true` if `needle` occurs (case-insensitively) in the path,
    /// manufacturer, or product string.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            return false;
        }
        [
            Some(self.path.as_str()),
            self.manufacturer.as_deref(),
            self.product.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_identity_matches_any_product() {
        let id = UsbIdentity::vendor(0x2341);
        assert!(id.matches(0x2341, 0x0043));
        assert!(id.matches(0x2341, 0x0001));
        assert!(!id.matches(0x1A86, 0x0043));
    }

    #[test]
    fn test_exact_identity_requires_product() {
        let id = UsbIdentity::exact(0x1A86, 0x7523);
        assert!(id.matches(0x1A86, 0x7523));
        assert!(!id.matches(0x1A86, 0x5523));
    }

    #[test]
    fn test_non_usb_endpoint_never_matches_identity() {
        let ep = SerialEndpoint::new("/dev/ttyS0");
        assert!(!ep.matches_identity(&UsbIdentity::vendor(0x2341)));
    }

    #[test]
    fn test_mentions_is_case_insensitive_across_fields() {
        // Arrange
        let ep = SerialEndpoint::usb("/dev/ttyACM0", 0x2341, 0x0043)
            .with_descriptors(Some("Arduino LLC".to_string()), None);

        // Assert
        assert!(ep.mentions("arduino"));
        assert!(ep.mentions("ACM"));
        assert!(!ep.mentions("ftdi"));
    }

    #[test]
    fn test_mentions_empty_needle_is_false() {
        let ep = SerialEndpoint::new("/dev/ttyUSB0");
        assert!(!ep.mentions(""));
    }
}
