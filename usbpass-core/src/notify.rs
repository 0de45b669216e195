//! Controller event notifications.
//!
//! Every accepted mutation and every passthrough transition is reported on
//! a broadcast channel, so the daemon can observe reconciliation without
//! holding the registry lock. Publishing never blocks; an observer that
//! falls behind loses the oldest notifications rather than backpressuring
//! the controller.

use crate::types::{Passthrough, UsbDeviceId};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the notification channel.
const NOTIFY_BUFFER: usize = 128;

/// One observed controller transition.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    BundleAdded { phy_label: String },
    BundleRemoved { phy_label: String },
    DeviceAdded { id: UsbDeviceId },
    DeviceRemoved { id: UsbDeviceId },
    VmAdded { qmp_socket_path: String },
    VmRemoved { qmp_socket_path: String },
    Connected(Passthrough),
    Disconnected(Passthrough),
}

impl ControllerEvent {
    /// True for connect/disconnect transitions, false for input mutations.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Connected(_) | Self::Disconnected(_))
    }

    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BundleAdded { .. } => "bundle-added",
            Self::BundleRemoved { .. } => "bundle-removed",
            Self::DeviceAdded { .. } => "device-added",
            Self::DeviceRemoved { .. } => "device-removed",
            Self::VmAdded { .. } => "vm-added",
            Self::VmRemoved { .. } => "vm-removed",
            Self::Connected(_) => "connected",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// Fan-out handle for controller events. Clones share one channel.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ControllerEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_BUFFER);
        Self { tx }
    }

    /// Report an event. A no-op when nobody is watching.
    pub fn publish(&self, event: ControllerEvent) {
        trace!(kind = event.kind(), "controller event");
        let _ = self.tx.send(event);
    }

    /// Attach an observer. Only events published after this call are seen.
    pub fn watch(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
