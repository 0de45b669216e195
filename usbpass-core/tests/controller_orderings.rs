//! Event-ordering tests for the passthrough controller.
//!
//! The three producers deliver events in arbitrary order. These tests drive
//! every permutation of a seed event set through a fresh controller and
//! verify that the resulting connect/disconnect traffic does not depend on
//! the order.

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;
use usbpass_core::{IoBundle, UsbDevice, UsbPassController, VirtualMachine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedEvent {
    Bundle,
    Device,
    Vm,
}

/// All permutations of a slice, via Heap's algorithm.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn generate<T: Clone>(k: usize, items: &mut [T], out: &mut Vec<Vec<T>>) {
        if k == 1 {
            out.push(items.to_vec());
            return;
        }
        generate(k - 1, items, out);
        for i in 0..k - 1 {
            let swap_index = if k % 2 == 0 { i } else { 0 };
            items.swap(swap_index, k - 1);
            generate(k - 1, items, out);
        }
    }
    let mut items = items.to_vec();
    let mut out = Vec::new();
    if items.is_empty() {
        return out;
    }
    generate(items.len(), &mut items, &mut out);
    out
}

struct PassthroughEnv {
    bundle: IoBundle,
    device: UsbDevice,
    vm: VirtualMachine,
}

/// The seed scenario: a touch panel on bus 1 port 3.1 behind controller
/// 00:02.0, declared as bundle TOUCH and claimed by one VM.
fn passthrough_env() -> PassthroughEnv {
    PassthroughEnv {
        bundle: IoBundle {
            phy_label: "TOUCH".to_string(),
            usb_addr: "1:3.1".to_string(),
            pci_long: "00:02.0".to_string(),
            ..Default::default()
        },
        device: UsbDevice {
            busnum: 1,
            devnum: 2,
            portnum: "3.1".to_string(),
            vendor_id: 5,
            product_id: 6,
            usb_controller_pci_address: "00:02.0".to_string(),
        },
        vm: VirtualMachine {
            qmp_socket_path: "/vm/qemu.sock".to_string(),
            adapters: vec!["TOUCH".to_string()],
        },
    }
}

fn counting_controller() -> (UsbPassController, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let c = connects.clone();
    let d = disconnects.clone();
    let controller = UsbPassController::new(
        Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }),
        Box::new(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (controller, connects, disconnects)
}

/// Run the env's three add events in every order; return the total connect
/// count over all orderings (each ordering gets a fresh controller).
fn run_order_combinations(env: &PassthroughEnv, expected_qmp_socket_path: &str) -> usize {
    let mut total_connects = 0;
    for ordering in permutations(&[SeedEvent::Bundle, SeedEvent::Device, SeedEvent::Vm]) {
        let connects = Arc::new(AtomicUsize::new(0));
        let c = connects.clone();
        let expected = expected_qmp_socket_path.to_string();
        let controller = UsbPassController::new(
            Box::new(move |passthrough| {
                assert_eq!(
                    passthrough.qmp_socket_path, expected,
                    "passthrough connected to wrong VM"
                );
                c.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_| {}),
        );

        for event in &ordering {
            match event {
                SeedEvent::Bundle => controller.add_io_bundle(env.bundle.clone()),
                SeedEvent::Device => controller.add_usb_device(env.device.clone()),
                SeedEvent::Vm => controller.add_virtual_machine(env.vm.clone()),
            }
        }

        controller.check_consistency().expect("consistent");
        total_connects += connects.load(Ordering::SeqCst);
    }
    total_connects
}

#[test]
fn test_heap_permutations_cover_all_orderings() {
    let perms = permutations(&[1, 2, 3]);
    assert_eq!(perms.len(), 6);
    let mut sorted = perms.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 6);
}

#[test]
fn test_connect_in_every_ordering() {
    let env = passthrough_env();
    // One connect per ordering, six orderings
    assert_eq!(run_order_combinations(&env, "/vm/qemu.sock"), 6);
}

#[test]
fn test_wrong_controller_address_suppresses_connect() {
    let mut env = passthrough_env();
    env.device.usb_controller_pci_address = String::new();
    assert_eq!(run_order_combinations(&env, "/vm/qemu.sock"), 0);
}

#[test]
fn test_port_mismatch_suppresses_connect() {
    let mut env = passthrough_env();
    // Bundle names port 3.1-1, device sits on 3.1
    env.bundle.usb_addr = "1:3.1-1".to_string();
    assert_eq!(run_order_combinations(&env, "/vm/qemu.sock"), 0);
}

#[test]
fn test_vm_removal_releases_the_device() {
    let env = passthrough_env();
    let (controller, connects, disconnects) = counting_controller();

    controller.add_io_bundle(env.bundle.clone());
    controller.add_usb_device(env.device.clone());
    controller.add_virtual_machine(env.vm.clone());
    assert_eq!(controller.passthrough_count(), 1);
    assert_eq!(controller.vm_count(), 1);

    controller.remove_virtual_machine(&env.vm);
    assert_eq!(controller.passthrough_count(), 0);
    assert_eq!(controller.vm_count(), 0);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    controller.check_consistency().expect("consistent");
}

#[test]
fn test_duplicate_device_events_reconnect_only_once() {
    let env = passthrough_env();

    let net = Arc::new(AtomicIsize::new(0));
    let up = net.clone();
    let down = net.clone();
    let controller = UsbPassController::new(
        Box::new(move |_| {
            up.fetch_add(1, Ordering::SeqCst);
        }),
        Box::new(move |_| {
            down.fetch_sub(1, Ordering::SeqCst);
        }),
    );

    controller.add_io_bundle(env.bundle.clone());
    controller.add_usb_device(env.device.clone());
    controller.add_usb_device(env.device.clone());
    controller.add_virtual_machine(env.vm.clone());
    controller.add_usb_device(env.device.clone());
    assert_eq!(net.load(Ordering::SeqCst), 1);

    controller.remove_usb_device(&env.device);
    controller.remove_usb_device(&env.device);
    assert_eq!(net.load(Ordering::SeqCst), 0);

    controller.add_usb_device(env.device.clone());
    assert_eq!(net.load(Ordering::SeqCst), 1);

    controller.add_usb_device(env.device.clone());
    assert_eq!(net.load(Ordering::SeqCst), 1);
    controller.check_consistency().expect("consistent");
}

#[test]
fn test_reserved_controller_forbids_passthrough_in_every_ordering() {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        ReserveBundle,
        MatchBundle,
        Device,
        Vm,
    }

    let reserve = IoBundle { pci_long: "00:14.0".to_string(), ..IoBundle::new("RESERVED") };
    let mut env = passthrough_env();
    env.bundle.pci_long = "00:14.0".to_string();
    env.device.usb_controller_pci_address = "00:14.0".to_string();

    for ordering in
        permutations(&[Event::ReserveBundle, Event::MatchBundle, Event::Device, Event::Vm])
    {
        let (controller, connects, disconnects) = counting_controller();
        for event in &ordering {
            match event {
                Event::ReserveBundle => controller.add_io_bundle(reserve.clone()),
                Event::MatchBundle => controller.add_io_bundle(env.bundle.clone()),
                Event::Device => controller.add_usb_device(env.device.clone()),
                Event::Vm => controller.add_virtual_machine(env.vm.clone()),
            }
        }
        // A transient connect/disconnect pair may occur when the
        // reservation arrives last, but the final state is always empty.
        assert_eq!(
            connects.load(Ordering::SeqCst),
            disconnects.load(Ordering::SeqCst),
            "unbalanced callbacks under ordering {ordering:?}"
        );
        assert_eq!(
            controller.passthrough_count(),
            0,
            "forbidden device stayed connected under ordering {ordering:?}"
        );
        controller.check_consistency().expect("consistent");
    }
}

#[test]
fn test_late_reservation_tears_down_passthrough() {
    let mut env = passthrough_env();
    env.bundle.pci_long = "00:14.0".to_string();
    env.device.usb_controller_pci_address = "00:14.0".to_string();

    let (controller, connects, disconnects) = counting_controller();
    controller.add_io_bundle(env.bundle.clone());
    controller.add_usb_device(env.device.clone());
    controller.add_virtual_machine(env.vm.clone());
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // Reserving the controller afterwards disconnects the device
    let reserve = IoBundle { pci_long: "00:14.0".to_string(), ..IoBundle::new("RESERVED") };
    controller.add_io_bundle(reserve.clone());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(controller.passthrough_count(), 0);

    // Withdrawing the reservation brings it back
    controller.remove_io_bundle(&reserve);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(controller.passthrough_count(), 1);
    controller.check_consistency().expect("consistent");
}

#[test]
fn test_bundle_removal_disconnects_its_passthroughs() {
    let env = passthrough_env();
    let (controller, connects, disconnects) = counting_controller();

    controller.add_io_bundle(env.bundle.clone());
    controller.add_usb_device(env.device.clone());
    controller.add_virtual_machine(env.vm.clone());
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    controller.remove_io_bundle(&env.bundle);
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(controller.passthrough_count(), 0);

    // The VM's claim survived the bundle withdrawal; re-adding re-connects
    controller.add_io_bundle(env.bundle.clone());
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(controller.passthrough_count(), 1);
    controller.check_consistency().expect("consistent");
}
