//! Integration tests for the input forwarding path.
//!
//! `InputForwarder` runs against `MockHidDevice`, which keeps the driver's
//! lock bookkeeping, so these tests see the exact frames that would reach
//! `/dev/usb`.

use ast_bridge::application::forward_input::{ForwardError, ForwarderOptions, InputForwarder};
use ast_bridge::infrastructure::hid::mock::MockHidDevice;
use ast_bridge::infrastructure::hid::HidRequest;
use ast_core::protocol::{IusbHeader, MouseButtons, MouseMode, HEADER_LEN};

fn seq_no(frame: &[u8]) -> u32 {
    IusbHeader::decode(&frame[..HEADER_LEN])
        .expect("valid header")
        .seq_no
}

#[test]
fn test_typing_a_word_emits_press_release_pairs_in_sequence() {
    let device = MockHidDevice::with_keyboard_and_mouse();
    let script = device.script();
    let mut forwarder =
        InputForwarder::start(Box::new(device), ForwarderOptions::default()).expect("start");

    // "ab": press a, release a, press b, release b
    for scancode in [0x1E, 0x9E, 0x30, 0xB0] {
        assert!(forwarder.push_scancode(scancode).expect("write"));
    }

    let frames = script.buffers(HidRequest::KeyboardData);
    assert_eq!(frames.len(), 4);
    let seqs: Vec<u32> = frames.iter().map(|f| seq_no(f)).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    let usages: Vec<u8> = frames.iter().map(|f| f[HEADER_LEN + 3]).collect();
    assert_eq!(usages, vec![0x04, 0x00, 0x05, 0x00]);
}

#[test]
fn test_keyboard_and_mouse_sequences_are_independent() {
    let device = MockHidDevice::with_keyboard_and_mouse();
    let script = device.script();
    let mut forwarder =
        InputForwarder::start(Box::new(device), ForwarderOptions::default()).expect("start");

    forwarder.push_scancode(0x1E).expect("key");
    forwarder.pointer_motion(3, -3, 0, 0).expect("motion");
    forwarder.pointer_motion(1, 0, 1, 0).expect("wheel");
    forwarder.push_scancode(0x9E).expect("key");

    let keys = script.buffers(HidRequest::KeyboardData);
    let mice = script.buffers(HidRequest::MouseData);
    assert_eq!(keys.iter().map(|f| seq_no(f)).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(mice.iter().map(|f| seq_no(f)).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(mice[1][HEADER_LEN + 1] & MouseButtons::WHEEL_DOWN, MouseButtons::WHEEL_DOWN);
}

#[test]
fn test_absolute_mode_is_requested_from_relative_device() {
    let device = MockHidDevice::with_keyboard_and_mouse();
    let script = device.script();
    script.set_mouse_mode(MouseMode::Relative as u8);

    let _forwarder = InputForwarder::start(
        Box::new(device),
        ForwarderOptions {
            mouse_mode: MouseMode::Absolute,
            led_query_blocking: false,
        },
    )
    .expect("start");

    assert_eq!(script.buffers(HidRequest::MouseRelToAbs).len(), 1);
    assert_eq!(script.mouse_mode(), MouseMode::Absolute as u8);
}

#[test]
fn test_missing_keyboard_is_fatal() {
    let device = MockHidDevice::new();
    device.script().add_device(0x31, 1, 1);

    let result = InputForwarder::start(Box::new(device), ForwarderOptions::default());

    assert!(matches!(result, Err(ForwardError::Lock { .. })));
}

#[test]
fn test_shutdown_returns_interfaces_to_driver() {
    let device = MockHidDevice::with_keyboard_and_mouse();
    let script = device.script();
    let forwarder =
        InputForwarder::start(Box::new(device), ForwarderOptions::default()).expect("start");
    assert_eq!(script.held_locks(), 2);

    forwarder.shutdown();

    assert_eq!(script.held_locks(), 0);
    assert_eq!(script.buffers(HidRequest::ReleaseInterface).len(), 2);
}
