//! Command dispatch for usbpassd.
//!
//! Producers hand their events to the daemon as [`ControllerCommand`]s over
//! an mpsc channel; the dispatch loop applies them to the controller in
//! arrival order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use usbpass_core::{IoBundle, UsbDevice, UsbPassController, VirtualMachine};

/// One producer event addressed to the controller.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    AddIoBundle(IoBundle),
    RemoveIoBundle(IoBundle),
    AddUsbDevice(UsbDevice),
    RemoveUsbDevice(UsbDevice),
    AddVirtualMachine(VirtualMachine),
    RemoveVirtualMachine(VirtualMachine),
}

/// Drain the command channel until every sender is dropped.
///
/// Controller entry points run hypervisor callbacks synchronously and may
/// block, so each command is applied on the blocking pool. Commands never
/// overlap; the next one is not picked up until the previous has fully
/// reconciled.
pub async fn run(controller: Arc<UsbPassController>, mut rx: mpsc::Receiver<ControllerCommand>) {
    while let Some(command) = rx.recv().await {
        debug!(?command, "Dispatching controller command");
        let controller = controller.clone();
        tokio::task::spawn_blocking(move || apply(&controller, command))
            .await
            .expect("controller entry point panicked");
    }
    debug!("Command channel closed, dispatch loop exiting");
}

fn apply(controller: &UsbPassController, command: ControllerCommand) {
    match command {
        ControllerCommand::AddIoBundle(bundle) => controller.add_io_bundle(bundle),
        ControllerCommand::RemoveIoBundle(bundle) => controller.remove_io_bundle(&bundle),
        ControllerCommand::AddUsbDevice(device) => controller.add_usb_device(device),
        ControllerCommand::RemoveUsbDevice(device) => controller.remove_usb_device(&device),
        ControllerCommand::AddVirtualMachine(vm) => controller.add_virtual_machine(vm),
        ControllerCommand::RemoveVirtualMachine(vm) => controller.remove_virtual_machine(&vm),
    }
}
