//! Canonical stores for bundles, devices, VMs, and the derived passthrough
//! set.
//!
//! The registry is a pure mutator layer: it maintains the three input sets,
//! the compiled rules, the `vms_by_bundle_label` cross index, and the
//! passthrough map, but never invokes hypervisor callbacks. All callback
//! traffic goes through the reconciler in the controller module.
//!
//! Entity data lives in exactly one map per entity, keyed by identity;
//! secondary structures hold keys only.

use crate::rules::PassthroughRule;
use crate::types::{IoBundle, Passthrough, UsbDevice, UsbDeviceId, VirtualMachine};
use std::collections::{HashMap, HashSet};

/// In-memory state of the passthrough controller.
#[derive(Debug, Default)]
pub struct Registry {
    /// phy label -> bundle declaration
    bundles: HashMap<String, IoBundle>,

    /// phy label -> rule compiled at insert; absent for non-rule bundles
    rules: HashMap<String, PassthroughRule>,

    /// device identity -> live device
    devices: HashMap<UsbDeviceId, UsbDevice>,

    /// QMP socket path -> VM
    vms: HashMap<String, VirtualMachine>,

    /// phy label -> QMP socket paths of VMs claiming it. Entries exist for
    /// labels with no bundle; a later bundle add picks them up.
    vms_by_bundle_label: HashMap<String, HashSet<String>>,

    /// device identity -> active passthrough
    passthroughs: HashMap<UsbDeviceId, Passthrough>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Bundles ---

    /// Insert or replace a bundle, compiling its rule.
    ///
    /// Returns false if an identical declaration is already stored (duplicate
    /// event).
    pub fn insert_bundle(&mut self, bundle: IoBundle) -> bool {
        if self.bundles.get(&bundle.phy_label) == Some(&bundle) {
            return false;
        }

        match PassthroughRule::compile(&bundle) {
            Some(rule) => {
                self.rules.insert(bundle.phy_label.clone(), rule);
            }
            None => {
                self.rules.remove(&bundle.phy_label);
            }
        }
        self.bundles.insert(bundle.phy_label.clone(), bundle);
        true
    }

    /// Remove a bundle and its rule.
    ///
    /// VM claims on the label are left in place so a later re-add of the
    /// bundle re-attaches them.
    pub fn remove_bundle(&mut self, phy_label: &str) -> Option<IoBundle> {
        self.rules.remove(phy_label);
        self.bundles.remove(phy_label)
    }

    pub fn bundle(&self, phy_label: &str) -> Option<&IoBundle> {
        self.bundles.get(phy_label)
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Compiled rule for a bundle label, if the bundle exists and has one.
    pub fn rule(&self, phy_label: &str) -> Option<&PassthroughRule> {
        self.rules.get(phy_label)
    }

    /// All compiled rules with their bundle labels.
    pub fn rules(&self) -> impl Iterator<Item = (&String, &PassthroughRule)> {
        self.rules.iter()
    }

    // --- Devices ---

    /// Insert a device. Returns false if the identical device is already
    /// known (duplicate hotplug event).
    pub fn insert_device(&mut self, device: UsbDevice) -> bool {
        let id = device.id();
        if self.devices.contains_key(&id) {
            return false;
        }
        self.devices.insert(id, device);
        true
    }

    pub fn remove_device(&mut self, id: &UsbDeviceId) -> Option<UsbDevice> {
        self.devices.remove(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &UsbDevice> {
        self.devices.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    // --- VMs ---

    /// Insert or replace a VM, maintaining the label index.
    ///
    /// Returns false if an identical VM is already registered. A VM whose
    /// adapter list changed is treated as remove plus add.
    pub fn insert_vm(&mut self, vm: VirtualMachine) -> bool {
        match self.vms.get(&vm.qmp_socket_path) {
            Some(existing) if *existing == vm => return false,
            Some(_) => {
                self.remove_vm(&vm.qmp_socket_path);
            }
            None => {}
        }

        for label in &vm.adapters {
            self.vms_by_bundle_label
                .entry(label.clone())
                .or_default()
                .insert(vm.qmp_socket_path.clone());
        }
        self.vms.insert(vm.qmp_socket_path.clone(), vm);
        true
    }

    /// Remove a VM and its claims from the label index.
    pub fn remove_vm(&mut self, qmp_socket_path: &str) -> Option<VirtualMachine> {
        let vm = self.vms.remove(qmp_socket_path)?;
        for label in &vm.adapters {
            if let Some(claimants) = self.vms_by_bundle_label.get_mut(label) {
                claimants.remove(qmp_socket_path);
                if claimants.is_empty() {
                    self.vms_by_bundle_label.remove(label);
                }
            }
        }
        Some(vm)
    }

    pub fn vm(&self, qmp_socket_path: &str) -> Option<&VirtualMachine> {
        self.vms.get(qmp_socket_path)
    }

    pub fn vm_paths(&self) -> Vec<String> {
        self.vms.keys().cloned().collect()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// QMP socket paths of the VMs claiming a bundle label.
    pub fn vms_claiming(&self, phy_label: &str) -> impl Iterator<Item = &String> {
        self.vms_by_bundle_label.get(phy_label).into_iter().flatten()
    }

    pub(crate) fn claimed_label_count(&self) -> usize {
        self.vms_by_bundle_label.len()
    }

    // --- Passthroughs ---

    pub fn insert_passthrough(&mut self, passthrough: Passthrough) {
        self.passthroughs.insert(passthrough.device.id(), passthrough);
    }

    pub fn remove_passthrough(&mut self, id: &UsbDeviceId) -> Option<Passthrough> {
        self.passthroughs.remove(id)
    }

    pub fn passthrough(&self, id: &UsbDeviceId) -> Option<&Passthrough> {
        self.passthroughs.get(id)
    }

    pub fn passthroughs(&self) -> impl Iterator<Item = &Passthrough> {
        self.passthroughs.values()
    }

    pub fn passthrough_count(&self) -> usize {
        self.passthroughs.len()
    }

    // --- Consistency ---

    /// Verify that the secondary structures agree with the primary maps.
    ///
    /// Intended for tests and debugging; the mutators above maintain these
    /// properties as invariants.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (label, rule) in &self.rules {
            let bundle = self
                .bundles
                .get(label)
                .ok_or_else(|| format!("rule for unknown bundle {label:?}"))?;
            if PassthroughRule::compile(bundle).as_ref() != Some(rule) {
                return Err(format!("stale rule for bundle {label:?}"));
            }
        }
        for (label, bundle) in &self.bundles {
            if PassthroughRule::compile(bundle).is_some() != self.rules.contains_key(label) {
                return Err(format!("missing rule for bundle {label:?}"));
            }
        }

        let mut expected: HashMap<&str, HashSet<&str>> = HashMap::new();
        for vm in self.vms.values() {
            for label in &vm.adapters {
                expected.entry(label.as_str()).or_default().insert(vm.qmp_socket_path.as_str());
            }
        }
        if expected.len() != self.vms_by_bundle_label.len() {
            return Err("label index size mismatch".to_string());
        }
        for (label, claimants) in &self.vms_by_bundle_label {
            let want = expected
                .get(label.as_str())
                .ok_or_else(|| format!("stray label index entry {label:?}"))?;
            if claimants.len() != want.len()
                || !claimants.iter().all(|path| want.contains(path.as_str()))
            {
                return Err(format!("label index mismatch for {label:?}"));
            }
        }

        for (id, passthrough) in &self.passthroughs {
            if *id != passthrough.device.id() {
                return Err(format!("passthrough keyed under wrong identity: {passthrough}"));
            }
            if !self.devices.contains_key(id) {
                return Err(format!("passthrough for unknown device: {passthrough}"));
            }
            if !self.vms.contains_key(&passthrough.qmp_socket_path) {
                return Err(format!("passthrough for unknown VM: {passthrough}"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(path: &str, adapters: &[&str]) -> VirtualMachine {
        VirtualMachine {
            qmp_socket_path: path.to_string(),
            adapters: adapters.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_bundle_insert_compiles_rule() {
        let mut registry = Registry::new();

        let mut bundle = IoBundle::new("TOUCH");
        bundle.usb_addr = "1:3.1".to_string();
        assert!(registry.insert_bundle(bundle.clone()));
        assert!(registry.rule("TOUCH").is_some());

        // Identical declaration is a duplicate
        assert!(!registry.insert_bundle(bundle));

        // Replacing with a non-rule bundle drops the rule
        assert!(registry.insert_bundle(IoBundle::new("TOUCH")));
        assert!(registry.rule("TOUCH").is_none());

        registry.check_consistency().expect("consistent");
    }

    #[test]
    fn test_device_dedup() {
        let mut registry = Registry::new();
        let device = UsbDevice { busnum: 1, portnum: "3.1".to_string(), ..Default::default() };

        assert!(registry.insert_device(device.clone()));
        assert!(!registry.insert_device(device.clone()));
        assert_eq!(registry.device_count(), 1);

        assert!(registry.remove_device(&device.id()).is_some());
        assert!(registry.remove_device(&device.id()).is_none());
    }

    #[test]
    fn test_vm_index_maintenance() {
        let mut registry = Registry::new();

        assert!(registry.insert_vm(vm("/vm/a.sock", &["TOUCH", "SCANNER"])));
        assert!(registry.insert_vm(vm("/vm/b.sock", &["TOUCH"])));

        let touch: Vec<_> = registry.vms_claiming("TOUCH").collect();
        assert_eq!(touch.len(), 2);
        assert_eq!(registry.vms_claiming("SCANNER").count(), 1);
        registry.check_consistency().expect("consistent");

        // Replacing a VM rewrites its claims
        assert!(registry.insert_vm(vm("/vm/a.sock", &["SCANNER"])));
        assert_eq!(registry.vms_claiming("TOUCH").count(), 1);
        registry.check_consistency().expect("consistent");

        // Removing the last claimant drops the index entry
        registry.remove_vm("/vm/a.sock");
        registry.remove_vm("/vm/b.sock");
        assert_eq!(registry.claimed_label_count(), 0);
        registry.check_consistency().expect("consistent");
    }

    #[test]
    fn test_vm_duplicate_is_noop() {
        let mut registry = Registry::new();
        assert!(registry.insert_vm(vm("/vm/a.sock", &["TOUCH"])));
        assert!(!registry.insert_vm(vm("/vm/a.sock", &["TOUCH"])));
        assert_eq!(registry.vm_count(), 1);
        assert_eq!(registry.vms_claiming("TOUCH").count(), 1);
    }

    #[test]
    fn test_index_retains_unknown_bundle_claims() {
        let mut registry = Registry::new();
        registry.insert_vm(vm("/vm/a.sock", &["NOT_YET_DECLARED"]));

        // The claim is indexed even though no bundle exists yet
        assert_eq!(registry.vms_claiming("NOT_YET_DECLARED").count(), 1);
        registry.check_consistency().expect("consistent");
    }
}
