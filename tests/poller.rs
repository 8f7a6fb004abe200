//! Connection manager state machine, end to end over the mock transport:
//! search → bind → poll → decode → fail/disconnect.

use std::time::Duration;

use padhost::transport::mock::{
    config_bytes, device_bytes, endpoint_record, hid_record, interface_record, MockDevice,
    MockHost,
};
use padhost::transport::UsbSpeed;
use padhost::{ButtonId, ConnectionRegistry, DeviceFamily, Gamepad};

/// An XInput-class pad: vendor device class, interface 0 subclass 0x5d,
/// interrupt IN/OUT, interval 0 so polls are never throttled.
fn xinput_device(vid: u16, pid: u16) -> MockDevice {
    MockDevice::new(vid, pid)
        .with_device_descriptor(device_bytes(0xFF, 0xFF, 0xFF, 64, 1))
        .with_configuration(config_bytes(
            1,
            &[(
                interface_record(0xFF, 0x5D, 0x01),
                vec![
                    endpoint_record(0x81, 0x03, 32, 0),
                    endpoint_record(0x01, 0x03, 32, 0),
                ],
            )],
        ))
}

/// A device nothing classifies: plain vendor class, no HID usage.
fn unknown_device(vid: u16, pid: u16) -> MockDevice {
    MockDevice::new(vid, pid)
        .with_device_descriptor(device_bytes(0x00, 0x00, 0x00, 8, 1))
        .with_configuration(config_bytes(
            1,
            &[(
                interface_record(0xF0, 0x00, 0x00),
                vec![endpoint_record(0x81, 0x03, 8, 0)],
            )],
        ))
}

fn gamepad_for(device: &MockDevice, port: Option<u8>) -> Gamepad {
    let mut host = MockHost::new();
    host.add_device(device.clone());
    let mut pad = Gamepad::new(host, port);
    pad.set_search_delay(Duration::ZERO);
    pad
}

/// The 14-byte XInput wire format: UP + A, left trigger 128/255.
fn xinput_report() -> [u8; 14] {
    let mut report = [0u8; 14];
    report[2] = 0x01; // UP
    report[3] = 0x20; // A
    report[4] = 0x80; // left trigger
    report
}

#[test]
fn binds_and_decodes_xinput_report() {
    let device = xinput_device(0x045E, 0x028E);
    let mut pad = gamepad_for(&device, None);

    // First update binds; the init flush leaves nothing to decode yet.
    assert!(!pad.update());
    assert!(pad.connected());
    assert_eq!(pad.family(), DeviceFamily::XInput);

    device.queue_report(&xinput_report());
    assert!(pad.update());
    assert!(pad.button(ButtonId::Up));
    assert!(pad.button(ButtonId::A));
    assert!((pad.left_trigger() - 128.0 / 255.0).abs() < 1e-3);
    assert_eq!(pad.right_trigger(), 0.0);
    assert_eq!(pad.left_joystick(), (0.0, 0.0));
}

#[test]
fn repeated_report_is_debounced() {
    let device = xinput_device(0x045E, 0x028E);
    let mut pad = gamepad_for(&device, None);
    pad.update();

    device.queue_report(&xinput_report());
    assert!(pad.update());

    // Byte-for-byte repeat: no update, no edges.
    device.queue_report(&xinput_report());
    assert!(!pad.update());
    assert_eq!(pad.events().count(), 0);

    // One differing bit: exactly the buttons whose mapped bits differ.
    let mut released_a = xinput_report();
    released_a[3] = 0x00;
    device.queue_report(&released_a);
    assert!(pad.update());
    let events: Vec<_> = pad.events().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].button, ButtonId::A);
    assert!(!events[0].pressed);
}

#[test]
fn events_repeat_until_next_update() {
    let device = xinput_device(0x045E, 0x028E);
    let mut pad = gamepad_for(&device, None);
    pad.update();

    device.queue_report(&xinput_report());
    pad.update();
    let first: Vec<_> = pad.events().collect();
    let second: Vec<_> = pad.events().collect();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn unclassified_device_is_quarantined_for_the_session() {
    let device = unknown_device(0x1234, 0x5678);
    let registry = ConnectionRegistry::shared();
    let mut host = MockHost::new();
    host.add_device(device.clone());
    let mut pad = Gamepad::with_registry(host, None, registry.clone());
    pad.set_search_delay(Duration::ZERO);

    assert!(!pad.update());
    assert!(!pad.connected());
    assert!(registry.borrow().is_failed((0x1234, 0x5678)));
    assert_eq!(device.descriptor_fetches(), 1);

    // Many more search cycles: the id is never probed again.
    for _ in 0..50 {
        assert!(!pad.update());
    }
    assert_eq!(device.descriptor_fetches(), 1);
}

#[test]
fn one_candidate_attempt_per_search_cycle() {
    let bad_a = unknown_device(0x1111, 0x0001);
    let bad_b = unknown_device(0x2222, 0x0002);
    let registry = ConnectionRegistry::shared();
    let mut host = MockHost::new();
    host.add_device(bad_a.clone());
    host.add_device(bad_b.clone());
    let mut pad = Gamepad::with_registry(host, None, registry.clone());
    pad.set_search_delay(Duration::ZERO);

    pad.update();
    assert!(registry.borrow().is_failed((0x1111, 0x0001)));
    assert!(!registry.borrow().is_failed((0x2222, 0x0002)));

    pad.update();
    assert!(registry.borrow().is_failed((0x2222, 0x0002)));
}

#[test]
fn timeout_ceiling_forces_exactly_one_disconnect() {
    let device = xinput_device(0x045E, 0x028E);
    let mut pad = gamepad_for(&device, None);

    // Bind; every poll after that times out (read queue stays empty).
    // The bind-time update already counts one timeout.
    pad.update();
    assert!(pad.connected());

    for _ in 0..98 {
        assert!(!pad.update());
    }
    // 99 timeouts so far: still connected.
    assert!(pad.connected());

    // The 100th forces the disconnect.
    pad.update();
    assert!(!pad.connected());

    // Timeouts are not a quarantine: the next cycle rebinds the same device.
    pad.update();
    assert!(pad.connected());
}

#[test]
fn hard_read_failure_disconnects_immediately_without_quarantine() {
    let device = xinput_device(0x045E, 0x028E);
    let registry = ConnectionRegistry::shared();
    let mut host = MockHost::new();
    host.add_device(device.clone());
    let mut pad = Gamepad::with_registry(host, None, registry.clone());
    pad.set_search_delay(Duration::ZERO);

    pad.update();
    assert!(pad.connected());

    device.queue_read_error();
    pad.update();
    assert!(!pad.connected());
    assert!(!registry.borrow().is_failed((0x045E, 0x028E)));

    pad.update();
    assert!(pad.connected());
}

#[test]
fn disconnect_is_idempotent_and_resets_state() {
    let device = xinput_device(0x045E, 0x028E);
    let mut pad = gamepad_for(&device, None);
    pad.update();
    device.queue_report(&xinput_report());
    pad.update();
    assert!(pad.button(ButtonId::Up));

    assert!(pad.disconnect());
    assert!(!pad.connected());
    assert!(!pad.button(ButtonId::Up));
    assert_eq!(pad.left_trigger(), 0.0);
    assert_eq!(pad.family(), DeviceFamily::Unknown);

    assert!(!pad.disconnect());
}

#[test]
fn port_filter_matches_hub_path() {
    let device = xinput_device(0x045E, 0x028E).with_port(2);

    let mut wrong_port = gamepad_for(&device, Some(1));
    wrong_port.update();
    assert!(!wrong_port.connected());

    let mut right_port = gamepad_for(&device, Some(2));
    right_port.update();
    assert!(right_port.connected());
}

#[test]
fn rootless_device_only_matches_port_one() {
    let device = xinput_device(0x045E, 0x028E); // no hub path

    let mut port_two = gamepad_for(&device, Some(2));
    port_two.update();
    assert!(!port_two.connected());

    let mut port_one = gamepad_for(&device, Some(1));
    port_one.update();
    assert!(port_one.connected());
}

#[test]
fn shared_registry_prevents_double_claim() {
    let device = xinput_device(0x045E, 0x028E);
    let registry = ConnectionRegistry::shared();

    let mut host_a = MockHost::new();
    host_a.add_device(device.clone());
    let mut pad_a = Gamepad::with_registry(host_a, None, registry.clone());
    pad_a.set_search_delay(Duration::ZERO);

    let mut host_b = MockHost::new();
    host_b.add_device(device.clone());
    let mut pad_b = Gamepad::with_registry(host_b, None, registry.clone());
    pad_b.set_search_delay(Duration::ZERO);

    pad_a.update();
    assert!(pad_a.connected());

    pad_b.update();
    assert!(!pad_b.connected());

    // Releasing the claim frees the device for the other slot.
    pad_a.disconnect();
    pad_b.update();
    assert!(pad_b.connected());
}

#[test]
fn switch_pro_handshake_failure_quarantines() {
    let device = MockDevice::new(0x057E, 0x2009)
        .with_device_descriptor(device_bytes(0x00, 0x00, 0x00, 64, 1))
        .with_configuration(config_bytes(
            1,
            &[(
                interface_record(0x03, 0x00, 0x00),
                vec![
                    endpoint_record(0x81, 0x03, 64, 0),
                    endpoint_record(0x01, 0x03, 64, 0),
                ],
            )],
        ));
    device.fail_writes(true);

    let registry = ConnectionRegistry::shared();
    let mut host = MockHost::new();
    host.add_device(device.clone());
    let mut pad = Gamepad::with_registry(host, None, registry.clone());
    pad.set_search_delay(Duration::ZERO);

    pad.update();
    assert!(!pad.connected());
    assert!(registry.borrow().is_failed((0x057E, 0x2009)));
}

#[test]
fn dualshock4_claims_its_discovered_interface() {
    let device = MockDevice::new(0x054C, 0x09CC)
        .with_device_descriptor(device_bytes(0x00, 0x00, 0x00, 64, 1))
        .with_configuration(config_bytes(
            1,
            &[
                (interface_record(0x01, 0x01, 0x00), vec![]), // audio control
                (interface_record(0x01, 0x02, 0x00), vec![]), // audio streaming
                (
                    interface_record(0x03, 0x00, 0x00),
                    vec![
                        endpoint_record(0x84, 0x03, 64, 0),
                        endpoint_record(0x03, 0x03, 64, 0),
                    ],
                ),
            ],
        ));
    let mut pad = gamepad_for(&device, None);

    pad.update();
    assert!(pad.connected());
    assert_eq!(pad.family(), DeviceFamily::PlayStationDs4);
    assert_eq!(device.claims(), vec![(2, 1)]);
}

#[test]
fn hid_joystick_classified_by_usage_prelude() {
    let device = MockDevice::new(0x0583, 0x2060)
        .with_device_descriptor(device_bytes(0x00, 0x00, 0x00, 8, 1))
        .with_configuration(config_bytes(
            1,
            &[(
                interface_record(0x03, 0x00, 0x00),
                vec![
                    hid_record(0x01, 0x04), // generic desktop / joystick
                    endpoint_record(0x81, 0x03, 8, 0),
                ],
            )],
        ));
    let mut pad = gamepad_for(&device, None);

    pad.update();
    assert!(pad.connected());
    assert_eq!(pad.family(), DeviceFamily::HidJoystick);
}

#[test]
fn high_speed_interval_throttles_polling() {
    // bInterval 7 at high speed = 16 ms.
    let device = MockDevice::new(0x045E, 0x028E)
        .with_speed(UsbSpeed::High)
        .with_device_descriptor(device_bytes(0xFF, 0xFF, 0xFF, 64, 1))
        .with_configuration(config_bytes(
            1,
            &[(
                interface_record(0xFF, 0x5D, 0x01),
                vec![
                    endpoint_record(0x81, 0x03, 32, 7),
                    endpoint_record(0x01, 0x03, 32, 7),
                ],
            )],
        ));
    let mut pad = gamepad_for(&device, None);

    pad.update();
    assert!(pad.connected());
    assert_eq!(pad.poll_interval_ms(), Some(16));

    // Within the interval the transport is left alone entirely.
    device.queue_report(&xinput_report());
    assert!(!pad.update());
    assert_eq!(device.queued_reads(), 1);

    std::thread::sleep(Duration::from_millis(20));
    assert!(pad.update());
    assert!(pad.button(ButtonId::Up));
}
