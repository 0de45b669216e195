//! USB device domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A live USB device as reported by the hotplug watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbDevice {
    /// USB bus number
    pub busnum: u16,

    /// Device number on the bus, reassigned on every re-enumeration
    pub devnum: u16,

    /// Port string as reported by sysfs (e.g. "3.1")
    pub portnum: String,

    pub vendor_id: u32,
    pub product_id: u32,

    /// PCI address of the USB controller the device hangs off, or empty if
    /// the watcher could not resolve it
    pub usb_controller_pci_address: String,
}

impl UsbDevice {
    /// Deduplication identity of this device.
    pub fn id(&self) -> UsbDeviceId {
        UsbDeviceId {
            busnum: self.busnum,
            devnum: self.devnum,
            portnum: self.portnum.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            usb_controller_pci_address: self.usb_controller_pci_address.clone(),
        }
    }
}

impl fmt::Display for UsbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}/{} {:04x}:{:04x} @{}",
            self.busnum,
            self.devnum,
            self.portnum,
            self.vendor_id,
            self.product_id,
            self.usb_controller_pci_address
        )
    }
}

/// Identity of a USB device: the full tuple of identifying fields.
///
/// Two hotplug events describe the same device only if every field agrees;
/// re-enumeration changes `devnum` and therefore the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsbDeviceId {
    pub busnum: u16,
    pub devnum: u16,
    pub portnum: String,
    pub vendor_id: u32,
    pub product_id: u32,
    pub usb_controller_pci_address: String,
}

impl fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}/{} {:04x}:{:04x} @{}",
            self.busnum,
            self.devnum,
            self.portnum,
            self.vendor_id,
            self.product_id,
            self.usb_controller_pci_address
        )
    }
}
