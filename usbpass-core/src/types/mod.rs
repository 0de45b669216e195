//! Core domain types for usbpass.

pub mod address;
pub mod bundle;
pub mod passthrough;
pub mod usb;
pub mod vm;

// Re-exports
pub use address::{UsbAddr, UsbProduct};
pub use bundle::IoBundle;
pub use passthrough::{Passthrough, PassthroughId};
pub use usb::{UsbDevice, UsbDeviceId};
pub use vm::VirtualMachine;
