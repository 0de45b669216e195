//! Address forms carried by IO-bundle declarations.
//!
//! Bundles describe devices with up to three address fields: a PCI long
//! address (kept as an opaque string, compared byte for byte), a USB
//! bus/port pair, and a USB vendor/product pair. The numeric parts of the
//! latter two tolerate malformed input by parsing to zero; the configuration
//! source emits such fields and the hotplug path must not reject them.

use serde::{Deserialize, Serialize};

/// Bus/port pair parsed from a bundle `usb_addr` field (`"bus:port"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbAddr {
    /// Decimal bus number
    pub busnum: u16,
    /// Port string as reported by sysfs (e.g. "3.1"); may be empty
    pub portnum: String,
}

impl UsbAddr {
    /// Parse a `"bus:port"` field.
    ///
    /// Returns `None` for the empty string (field absent). The string is
    /// split on the first `:`; a missing port part yields an empty port.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let (bus, port) = match s.split_once(':') {
            Some((bus, port)) => (bus, port),
            None => (s, ""),
        };
        Some(Self { busnum: bus.parse().unwrap_or(0), portnum: port.to_string() })
    }

    /// Whether this address names the given bus/port.
    pub fn matches(&self, busnum: u16, portnum: &str) -> bool {
        self.busnum == busnum && self.portnum == portnum
    }
}

/// Vendor/product pair parsed from a bundle `usb_product` field
/// (`"vvvv:pppp"`, both hex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbProduct {
    pub vendor_id: u32,
    pub product_id: u32,
}

impl UsbProduct {
    /// Parse a `"vvvv:pppp"` field.
    ///
    /// Returns `None` for the empty string. A missing product part yields a
    /// product ID of zero.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let (vendor, product) = match s.split_once(':') {
            Some((vendor, product)) => (vendor, product),
            None => (s, ""),
        };
        Some(Self {
            vendor_id: u32::from_str_radix(vendor, 16).unwrap_or(0),
            product_id: u32::from_str_radix(product, 16).unwrap_or(0),
        })
    }

    /// Whether this pair names the given vendor/product IDs.
    pub fn matches(&self, vendor_id: u32, product_id: u32) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}
