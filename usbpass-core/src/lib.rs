//! usbpass core library
//!
//! Shared types and the passthrough controller for the usbpass USB
//! passthrough engine. The controller reconciles three event streams
//! (IO-bundle declarations, USB hotplug events, VM lifecycle events) into a
//! consistent set of device-to-guest passthrough bindings.

pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod paths;
pub mod registry;
pub mod rules;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use controller::{PassthroughCallback, ReconcileReport, UsbPassController};
pub use error::{Result, UsbPassError};
pub use notify::{ControllerEvent, Notifier};
pub use registry::Registry;
pub use rules::{PassthroughAction, PassthroughRule};
pub use types::{
    IoBundle, Passthrough, PassthroughId, UsbAddr, UsbDevice, UsbDeviceId, UsbProduct,
    VirtualMachine,
};
