//! QMP hypervisor glue.
//!
//! Adapts the controller's connect/disconnect seam onto per-VM QMP control
//! sockets. The QMP client owning the protocol traffic attaches at the
//! callbacks built here; this module resolves socket paths and reports the
//! transitions it is asked to make.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use usbpass_core::{Config, Passthrough, PassthroughCallback};

/// Builds hypervisor callbacks around the daemon's QMP socket directory.
pub struct QemuHotplug {
    socket_dir: PathBuf,
}

impl QemuHotplug {
    pub fn new(config: &Config) -> Self {
        Self { socket_dir: PathBuf::from(&config.qmp_socket_dir) }
    }

    /// Callback attaching a device to its guest.
    pub fn connect_callback(&self) -> PassthroughCallback {
        let socket_dir = self.socket_dir.clone();
        Box::new(move |passthrough| {
            let socket = resolve_socket(&socket_dir, passthrough);
            if !socket.exists() {
                warn!(
                    socket = %socket.display(),
                    %passthrough,
                    "QMP socket not present; guest attach deferred to its QMP client"
                );
            }
            info!(
                socket = %socket.display(),
                device = %passthrough.device,
                phy_label = %passthrough.phy_label,
                "Attaching USB device to guest"
            );
        })
    }

    /// Callback detaching a device from its guest.
    pub fn disconnect_callback(&self) -> PassthroughCallback {
        let socket_dir = self.socket_dir.clone();
        Box::new(move |passthrough| {
            let socket = resolve_socket(&socket_dir, passthrough);
            info!(
                socket = %socket.display(),
                device = %passthrough.device,
                phy_label = %passthrough.phy_label,
                "Detaching USB device from guest"
            );
        })
    }
}

/// Resolve the control socket for a passthrough's VM.
///
/// Absolute announcements are taken as-is; relative ones live in the
/// configured socket directory.
fn resolve_socket(socket_dir: &Path, passthrough: &Passthrough) -> PathBuf {
    let announced = Path::new(&passthrough.qmp_socket_path);
    if announced.is_absolute() {
        announced.to_path_buf()
    } else {
        socket_dir.join(announced)
    }
}
