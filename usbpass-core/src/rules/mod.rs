//! Passthrough rules compiled from IO-bundle declarations.
//!
//! A bundle's three address fields compile into a [`PassthroughRule`], a
//! pure predicate over live USB devices. Rules are a closed sum; evaluation
//! never allocates and has no side effects.

use crate::types::{IoBundle, UsbAddr, UsbDevice, UsbProduct};

/// Verdict of a rule for one device.
///
/// The ordering is load-bearing: a composition takes the maximum verdict of
/// its sub-rules, so `Do` survives only if every sub-rule matches and a
/// single `Forbid` overrides everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassthroughAction {
    /// Device matches; pass it through to any VM claiming the bundle
    Do,
    /// No opinion from this rule
    No,
    /// Device is reserved away from USB passthrough
    Forbid,
}

/// A compiled predicate over USB devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughRule {
    /// Reserves a whole USB controller: any device behind the PCI address is
    /// forbidden from passthrough. Compiled from bundles that name only a
    /// PCI address.
    PciForbid { pci_long: String },

    /// Matches devices behind one USB controller. Only appears inside a
    /// composition.
    Pci { pci_long: String },

    /// Matches on bus/port and/or vendor/product; every field that is
    /// present must agree with the device.
    UsbDevice { usb_addr: Option<UsbAddr>, usb_product: Option<UsbProduct> },

    /// AND composition of sub-rules.
    Composition { rules: Vec<PassthroughRule> },
}

impl PassthroughRule {
    /// Compile a bundle into a rule.
    ///
    /// Returns `None` when the bundle carries no address fields at all; such
    /// bundles never participate in passthrough decisions.
    pub fn compile(bundle: &IoBundle) -> Option<Self> {
        let has_pci = !bundle.pci_long.is_empty();
        let usb_addr = UsbAddr::parse(&bundle.usb_addr);
        let usb_product = UsbProduct::parse(&bundle.usb_product);

        if !has_pci && usb_addr.is_none() && usb_product.is_none() {
            return None;
        }

        // A bare PCI address reserves the controller instead of matching
        // devices on it.
        if has_pci && usb_addr.is_none() && usb_product.is_none() {
            return Some(Self::PciForbid { pci_long: bundle.pci_long.clone() });
        }

        let mut rules = Vec::with_capacity(2);
        if has_pci {
            rules.push(Self::Pci { pci_long: bundle.pci_long.clone() });
        }
        rules.push(Self::UsbDevice { usb_addr, usb_product });

        Some(Self::Composition { rules })
    }

    /// Evaluate this rule against a device.
    pub fn evaluate(&self, device: &UsbDevice) -> PassthroughAction {
        match self {
            Self::PciForbid { pci_long } => {
                if device.usb_controller_pci_address == *pci_long {
                    PassthroughAction::Forbid
                } else {
                    PassthroughAction::No
                }
            }
            Self::Pci { pci_long } => {
                if device.usb_controller_pci_address == *pci_long {
                    PassthroughAction::Do
                } else {
                    PassthroughAction::No
                }
            }
            Self::UsbDevice { usb_addr, usb_product } => {
                if usb_addr.is_none() && usb_product.is_none() {
                    return PassthroughAction::No;
                }
                let addr_ok = usb_addr
                    .as_ref()
                    .map_or(true, |a| a.matches(device.busnum, &device.portnum));
                let product_ok = usb_product
                    .as_ref()
                    .map_or(true, |p| p.matches(device.vendor_id, device.product_id));
                if addr_ok && product_ok {
                    PassthroughAction::Do
                } else {
                    PassthroughAction::No
                }
            }
            Self::Composition { rules } => rules
                .iter()
                .map(|rule| rule.evaluate(device))
                .max()
                .unwrap_or(PassthroughAction::No),
        }
    }
}
