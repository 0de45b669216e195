//! IO-bundle declarations.

use serde::{Deserialize, Serialize};

/// A declared logical adapter: the identity of a physical device plus
/// routing metadata from the configuration source.
///
/// A bundle is passthrough-relevant only through the rule compiled from its
/// three address fields (see the rules module); the grouping metadata is
/// carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoBundle {
    /// Unique identifier of the physical adapter
    pub phy_label: String,

    /// Logical name assigned by the configuration source
    pub logical_label: String,

    /// Assignment group of the adapter
    pub assignment_group: String,

    /// Assignment group of the parent adapter
    pub parent_assignment_group: String,

    /// PCI address in "dd:dd.d" form, or empty
    pub pci_long: String,

    /// USB "bus:port" address, or empty
    pub usb_addr: String,

    /// USB "vvvv:pppp" hex vendor/product, or empty
    pub usb_product: String,

    /// Adapter type tag from the configuration source; zero for untyped
    /// bundles
    pub bundle_type: u8,
}

impl IoBundle {
    /// Create a bundle with only a label set, for callers that fill in
    /// address fields afterwards.
    pub fn new(phy_label: impl Into<String>) -> Self {
        Self { phy_label: phy_label.into(), ..Default::default() }
    }
}
