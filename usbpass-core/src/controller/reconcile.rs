//! Differential reconciliation of the passthrough set.
//!
//! One full pass recomputes the desired set of passthroughs from the current
//! bundles, devices, and VM claims, then diffs it against the active set and
//! drives the connect/disconnect callbacks. Observable behavior does not
//! depend on which entry point triggered the pass.

use crate::registry::Registry;
use crate::rules::PassthroughAction;
use crate::types::{Passthrough, UsbDevice, UsbDeviceId};
use std::collections::HashMap;

/// Actions taken by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Number of passthroughs connected
    pub connected: usize,
    /// Number of passthroughs disconnected
    pub disconnected: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.connected == 0 && self.disconnected == 0
    }
}

/// Compute the passthroughs that should exist right now.
///
/// A candidate is produced for every (device, VM, bundle) triple where the
/// bundle's rule matches the device and the VM claims the bundle's label.
/// Devices forbidden by any rule in the registry yield nothing. When several
/// candidates claim one device, the lexicographically smallest QMP socket
/// path wins, ties broken by the smallest bundle label.
pub(crate) fn desired_passthroughs(registry: &Registry) -> HashMap<UsbDeviceId, Passthrough> {
    let mut desired = HashMap::new();

    for device in registry.devices() {
        if is_forbidden(registry, device) {
            continue;
        }

        let mut winner: Option<Passthrough> = None;
        for (phy_label, rule) in registry.rules() {
            if rule.evaluate(device) != PassthroughAction::Do {
                continue;
            }
            for qmp_socket_path in registry.vms_claiming(phy_label) {
                let candidate = Passthrough {
                    device: device.clone(),
                    qmp_socket_path: qmp_socket_path.clone(),
                    phy_label: phy_label.clone(),
                };
                winner = Some(match winner.take() {
                    None => candidate,
                    Some(current) => prefer(current, candidate),
                });
            }
        }

        if let Some(passthrough) = winner {
            desired.insert(passthrough.device.id(), passthrough);
        }
    }

    desired
}

/// Deterministic winner between two claims on the same device.
fn prefer(current: Passthrough, candidate: Passthrough) -> Passthrough {
    let current_key = (&current.qmp_socket_path, &current.phy_label);
    let candidate_key = (&candidate.qmp_socket_path, &candidate.phy_label);
    if candidate_key < current_key {
        candidate
    } else {
        current
    }
}

/// Whether any rule in the registry reserves this device away from
/// passthrough. A forbid verdict from one bundle overrides matches from all
/// others.
fn is_forbidden(registry: &Registry, device: &UsbDevice) -> bool {
    registry.rules().any(|(_, rule)| rule.evaluate(device) == PassthroughAction::Forbid)
}

/// Diff the desired set against the active set, invoking the callbacks for
/// each transition.
///
/// Stale bindings are torn down before new ones are established, so a device
/// never holds two bindings at once. A passthrough whose identity (device
/// plus VM) is unchanged is never cycled; if only its bundle label changed,
/// the stored record is refreshed without callbacks.
pub(crate) fn reconcile(
    registry: &mut Registry,
    mut connect: impl FnMut(&Passthrough),
    mut disconnect: impl FnMut(&Passthrough),
) -> ReconcileReport {
    let desired = desired_passthroughs(registry);
    let mut report = ReconcileReport::default();

    let stale: Vec<UsbDeviceId> = registry
        .passthroughs()
        .filter(|current| {
            desired.get(&current.device.id()).map_or(true, |want| want.id() != current.id())
        })
        .map(|current| current.device.id())
        .collect();
    for id in stale {
        if let Some(current) = registry.remove_passthrough(&id) {
            disconnect(&current);
            report.disconnected += 1;
        }
    }

    for (id, want) in desired {
        match registry.passthrough(&id).map(|current| current.phy_label.clone()) {
            None => {
                connect(&want);
                registry.insert_passthrough(want);
                report.connected += 1;
            }
            Some(current_label) => {
                if current_label != want.phy_label {
                    registry.insert_passthrough(want);
                }
            }
        }
    }

    report
}
