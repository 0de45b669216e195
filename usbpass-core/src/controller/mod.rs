//! Controller façade serializing the three producer event streams.
//!
//! Producers (the bundle configuration source, the USB hotplug watcher, and
//! the VM lifecycle manager) call the six entry points from any thread. Each
//! entry point takes the registry lock, applies the mutation, and runs a
//! reconciliation pass before releasing the lock, so every connect and
//! disconnect triggered by an event completes before the next event observes
//! state.
//!
//! Validation failures never surface to producers; bad or duplicate input is
//! logged and ignored.

use crate::notify::{ControllerEvent, Notifier};
use crate::registry::Registry;
use crate::types::{IoBundle, Passthrough, UsbDevice, VirtualMachine};
use metrics::counter;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

mod reconcile;

pub use reconcile::ReconcileReport;

/// Hypervisor-glue callback invoked on a passthrough transition.
///
/// Callbacks run synchronously with the registry lock held and must not call
/// back into the controller. They may block; they must not panic.
pub type PassthroughCallback = Box<dyn Fn(&Passthrough) + Send + Sync>;

/// The USB passthrough controller.
pub struct UsbPassController {
    registry: Mutex<Registry>,
    connect: PassthroughCallback,
    disconnect: PassthroughCallback,
    notifier: Option<Notifier>,
}

impl UsbPassController {
    /// Create a controller with the given hypervisor-glue callbacks.
    pub fn new(connect: PassthroughCallback, disconnect: PassthroughCallback) -> Self {
        Self { registry: Mutex::new(Registry::new()), connect, disconnect, notifier: None }
    }

    /// Report controller events through the given notifier.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // --- Entry points ---

    /// Declare or update an IO bundle.
    #[instrument(skip(self, bundle), fields(phy_label = %bundle.phy_label))]
    pub fn add_io_bundle(&self, bundle: IoBundle) {
        let phy_label = bundle.phy_label.clone();
        let mut registry = self.lock();
        if !registry.insert_bundle(bundle) {
            debug!("Ignoring duplicate bundle declaration");
            return;
        }
        counter!("usbpass.bundle.added").increment(1);
        info!("IO bundle added");
        self.notify(ControllerEvent::BundleAdded { phy_label });
        self.run_reconcile(&mut registry);
    }

    /// Withdraw an IO bundle. Passthroughs bound through it are
    /// disconnected.
    #[instrument(skip(self, bundle), fields(phy_label = %bundle.phy_label))]
    pub fn remove_io_bundle(&self, bundle: &IoBundle) {
        let mut registry = self.lock();
        if registry.remove_bundle(&bundle.phy_label).is_none() {
            debug!("Ignoring removal of unknown bundle");
            return;
        }
        counter!("usbpass.bundle.removed").increment(1);
        info!("IO bundle removed");
        self.notify(ControllerEvent::BundleRemoved { phy_label: bundle.phy_label.clone() });
        self.run_reconcile(&mut registry);
    }

    /// Register a USB device reported by the hotplug watcher.
    #[instrument(skip(self, device), fields(device = %device))]
    pub fn add_usb_device(&self, device: UsbDevice) {
        let id = device.id();
        let mut registry = self.lock();
        if !registry.insert_device(device) {
            debug!("Ignoring duplicate hotplug event");
            return;
        }
        counter!("usbpass.device.added").increment(1);
        info!("USB device added");
        self.notify(ControllerEvent::DeviceAdded { id });
        self.run_reconcile(&mut registry);
    }

    /// Remove a departed USB device. Its passthrough, if any, is
    /// disconnected.
    #[instrument(skip(self, device), fields(device = %device))]
    pub fn remove_usb_device(&self, device: &UsbDevice) {
        let id = device.id();
        let mut registry = self.lock();
        if registry.remove_device(&id).is_none() {
            debug!("Ignoring removal of unknown device");
            return;
        }
        counter!("usbpass.device.removed").increment(1);
        info!("USB device removed");
        self.notify(ControllerEvent::DeviceRemoved { id });
        self.run_reconcile(&mut registry);
    }

    /// Register a VM and its adapter claims.
    #[instrument(skip(self, vm), fields(qmp_socket_path = %vm.qmp_socket_path))]
    pub fn add_virtual_machine(&self, vm: VirtualMachine) {
        let qmp_socket_path = vm.qmp_socket_path.clone();
        let mut registry = self.lock();
        if !registry.insert_vm(vm) {
            debug!("Ignoring duplicate VM announcement");
            return;
        }
        counter!("usbpass.vm.added").increment(1);
        info!("Virtual machine added");
        self.notify(ControllerEvent::VmAdded { qmp_socket_path });
        self.run_reconcile(&mut registry);
    }

    /// Remove a VM. All of its passthroughs are disconnected.
    #[instrument(skip(self, vm), fields(qmp_socket_path = %vm.qmp_socket_path))]
    pub fn remove_virtual_machine(&self, vm: &VirtualMachine) {
        let mut registry = self.lock();
        if registry.remove_vm(&vm.qmp_socket_path).is_none() {
            debug!("Ignoring removal of unknown VM");
            return;
        }
        counter!("usbpass.vm.removed").increment(1);
        info!("Virtual machine removed");
        self.notify(ControllerEvent::VmRemoved { qmp_socket_path: vm.qmp_socket_path.clone() });
        self.run_reconcile(&mut registry);
    }

    /// Disconnect every active passthrough by withdrawing all VM claims.
    ///
    /// Used on daemon shutdown; keeps connects and disconnects balanced.
    pub fn drain(&self) {
        let mut registry = self.lock();
        for qmp_socket_path in registry.vm_paths() {
            registry.remove_vm(&qmp_socket_path);
            self.notify(ControllerEvent::VmRemoved { qmp_socket_path });
        }
        let report = self.run_reconcile(&mut registry);
        if report.disconnected > 0 {
            info!(disconnected = report.disconnected, "Drained USB passthroughs");
        }
    }

    // --- Inspection ---

    pub fn bundle_count(&self) -> usize {
        self.lock().bundle_count()
    }

    pub fn device_count(&self) -> usize {
        self.lock().device_count()
    }

    pub fn vm_count(&self) -> usize {
        self.lock().vm_count()
    }

    pub fn passthrough_count(&self) -> usize {
        self.lock().passthrough_count()
    }

    /// Snapshot of the active passthroughs.
    pub fn active_passthroughs(&self) -> Vec<Passthrough> {
        self.lock().passthroughs().cloned().collect()
    }

    /// Verify registry consistency and convergence: the active passthrough
    /// set must equal the desired set derived from current inputs.
    ///
    /// Diagnostic aid for tests; every entry point leaves the controller in
    /// a state where this passes.
    pub fn check_consistency(&self) -> Result<(), String> {
        let registry = self.lock();
        registry.check_consistency()?;

        let desired = reconcile::desired_passthroughs(&registry);
        if desired.len() != registry.passthrough_count() {
            return Err(format!(
                "diverged: {} active passthroughs, {} desired",
                registry.passthrough_count(),
                desired.len()
            ));
        }
        for passthrough in registry.passthroughs() {
            match desired.get(&passthrough.device.id()) {
                Some(want) if want.id() == passthrough.id() => {}
                _ => return Err(format!("diverged passthrough: {passthrough}")),
            }
        }
        Ok(())
    }

    // --- Internals ---

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Poisoning means a hypervisor callback panicked; that contract
        // violation is fatal.
        self.registry.lock().expect("controller registry lock poisoned")
    }

    fn notify(&self, event: ControllerEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(event);
        }
    }

    fn run_reconcile(&self, registry: &mut Registry) -> ReconcileReport {
        let report = reconcile::reconcile(
            registry,
            |passthrough| {
                info!(%passthrough, "Connecting USB passthrough");
                counter!("usbpass.passthrough.connect").increment(1);
                (self.connect)(passthrough);
                self.notify(ControllerEvent::Connected(passthrough.clone()));
            },
            |passthrough| {
                info!(%passthrough, "Disconnecting USB passthrough");
                counter!("usbpass.passthrough.disconnect").increment(1);
                (self.disconnect)(passthrough);
                self.notify(ControllerEvent::Disconnected(passthrough.clone()));
            },
        );
        if !report.is_empty() {
            debug!(
                connected = report.connected,
                disconnected = report.disconnected,
                "Reconciliation complete"
            );
        }
        report
    }
}
