//! Passthrough bindings derived by the reconciler.

use crate::types::usb::{UsbDevice, UsbDeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A live binding of one USB device to one VM via one bundle.
///
/// Created and destroyed only by the reconciler. The payload carries owned
/// copies of everything the hypervisor glue needs to attach or detach the
/// device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passthrough {
    pub device: UsbDevice,

    /// QMP socket path of the claiming VM
    pub qmp_socket_path: String,

    /// Label of the bundle that matched the device
    pub phy_label: String,
}

impl Passthrough {
    /// Identity of this passthrough; the bundle label is not part of it.
    pub fn id(&self) -> PassthroughId {
        PassthroughId { device: self.device.id(), qmp_socket_path: self.qmp_socket_path.clone() }
    }
}

impl fmt::Display for Passthrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (bundle {})", self.device, self.qmp_socket_path, self.phy_label)
    }
}

/// Identity of a passthrough: the device plus the claiming VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassthroughId {
    pub device: UsbDeviceId,
    pub qmp_socket_path: String,
}
