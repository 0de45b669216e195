//! Virtual machine domain types.

use serde::{Deserialize, Serialize};

/// A guest VM and the adapter labels it claims.
///
/// The VM is identified by the path of its QMP control socket; the lifecycle
/// manager guarantees the path is unique per guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Path of the VM's QMP control socket
    pub qmp_socket_path: String,

    /// IO-bundle phy labels requested by the VM, in declaration order
    pub adapters: Vec<String>,
}

impl VirtualMachine {
    /// Create a VM with no adapters.
    pub fn new(qmp_socket_path: impl Into<String>) -> Self {
        Self { qmp_socket_path: qmp_socket_path.into(), adapters: Vec::new() }
    }

    /// Append an adapter label claim.
    pub fn add_adapter(&mut self, phy_label: impl Into<String>) {
        self.adapters.push(phy_label.into());
    }
}
