//! Mock HID redirection device for unit testing.
//!
//! [`MockHidDevice`] answers the interface-management calls the way the
//! driver does: it advertises a configurable list of free interfaces, grants
//! locks with increasing keys, forgets them on release, tracks the mouse mode
//! and writes the LED bits into LED query buffers.  Data writes are recorded
//! so tests can inspect the exact frames sent.
//!
//! Any request can be made to fail through [`HidScript::fail`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ast_core::protocol::frames::DATA_OFFSET;
use ast_core::protocol::interface::{
    DeviceInfo, LockRequest, MouseModeRecord, DEVICE_INFO_LEN, LOCK_REQUEST_LEN,
    MOUSE_MODE_RECORD_LEN,
};
use ast_core::protocol::MouseMode;

use super::{HidDevice, HidError, HidRequest};

const DEV_COUNT_OFFSET: usize = 34;
const FIRST_DEVICE_OFFSET: usize = 35;

#[derive(Debug)]
struct DriverState {
    /// Free interfaces as `(device_type, device_no, interface_no)`.
    free: Vec<(u8, u8, u8)>,
    /// Held locks as `(device_type, device_no, interface_no, key)`.
    held: Vec<(u8, u8, u8, u32)>,
    next_key: u32,
    mouse_mode: u8,
    led_bits: u8,
    failing: HashSet<HidRequest>,
    calls: Vec<(HidRequest, Vec<u8>)>,
}

impl Default for DriverState {
    fn default() -> Self {
        Self {
            free: Vec::new(),
            held: Vec::new(),
            next_key: 0x1000,
            mouse_mode: MouseMode::Absolute as u8,
            led_bits: 0,
            failing: HashSet::new(),
            calls: Vec::new(),
        }
    }
}

/// Shared handle for configuring and inspecting a [`MockHidDevice`].
#[derive(Debug, Clone, Default)]
pub struct HidScript {
    state: Arc<Mutex<DriverState>>,
}

impl HidScript {
    /// Advertises a free interface.
    pub fn add_device(&self, device_type: u8, device_no: u8, interface_no: u8) {
        self.lock().free.push((device_type, device_no, interface_no));
    }

    /// Makes every future `request` call fail.
    pub fn fail(&self, request: HidRequest) {
        self.lock().failing.insert(request);
    }

    pub fn set_led_bits(&self, bits: u8) {
        self.lock().led_bits = bits;
    }

    pub fn set_mouse_mode(&self, mode: u8) {
        self.lock().mouse_mode = mode;
    }

    pub fn mouse_mode(&self) -> u8 {
        self.lock().mouse_mode
    }

    /// Number of locks currently held.
    pub fn held_locks(&self) -> usize {
        self.lock().held.len()
    }

    /// Every call made, with the buffer as it was passed in.
    pub fn calls(&self) -> Vec<(HidRequest, Vec<u8>)> {
        self.lock().calls.clone()
    }

    /// Buffers passed to `request`, in order.
    pub fn buffers(&self, request: HidRequest) -> Vec<Vec<u8>> {
        self.lock()
            .calls
            .iter()
            .filter(|(r, _)| *r == request)
            .map(|(_, buf)| buf.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DriverState> {
        self.state.lock().expect("lock poisoned")
    }
}

/// In-memory [`HidDevice`].
#[derive(Debug, Default)]
pub struct MockHidDevice {
    script: HidScript,
}

impl MockHidDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device advertising one keyboard (1/0) and one mouse (1/1).
    pub fn with_keyboard_and_mouse() -> Self {
        let device = Self::new();
        device.script.add_device(0x30, 1, 0);
        device.script.add_device(0x31, 1, 1);
        device
    }

    pub fn script(&self) -> HidScript {
        self.script.clone()
    }
}

fn failure(request: HidRequest, message: &str) -> HidError {
    HidError::Request {
        request,
        source: std::io::Error::new(std::io::ErrorKind::Other, message.to_string()),
    }
}

impl HidDevice for MockHidDevice {
    fn call(&mut self, request: HidRequest, buf: &mut [u8]) -> Result<(), HidError> {
        let mut state = self.script.lock();
        state.calls.push((request, buf.to_vec()));
        if state.failing.contains(&request) {
            return Err(failure(request, "mock failure"));
        }

        match request {
            HidRequest::GetInterfaces => {
                if buf.len() < FIRST_DEVICE_OFFSET + DEVICE_INFO_LEN {
                    return Err(failure(request, "short buffer"));
                }
                let wanted = buf[0];
                let matching: Vec<_> = state.free.iter().filter(|d| d.0 == wanted).collect();
                buf[DEV_COUNT_OFFSET] = matching.len() as u8;
                if let Some(&&(device_type, device_no, interface_no)) = matching.first() {
                    let info = DeviceInfo {
                        device_type,
                        device_no,
                        interface_no,
                        lock_type: buf[1],
                        instance: 0,
                    };
                    buf[FIRST_DEVICE_OFFSET..FIRST_DEVICE_OFFSET + DEVICE_INFO_LEN]
                        .copy_from_slice(&info.encode());
                }
                Ok(())
            }
            HidRequest::RequestInterface => {
                let mut record = LockRequest::decode(buf)
                    .map_err(|_| failure(request, "short buffer"))?;
                let wanted = (
                    record.info.device_type,
                    record.info.device_no,
                    record.info.interface_no,
                );
                let Some(pos) = state.free.iter().position(|d| *d == wanted) else {
                    return Err(failure(request, "interface not free"));
                };
                state.free.remove(pos);
                let key = state.next_key;
                state.next_key += 1;
                state.held.push((wanted.0, wanted.1, wanted.2, key));
                record.key = key;
                buf[..LOCK_REQUEST_LEN].copy_from_slice(&record.encode());
                Ok(())
            }
            HidRequest::ReleaseInterface => {
                let record = LockRequest::decode(buf)
                    .map_err(|_| failure(request, "short buffer"))?;
                let info = record.info;
                let Some(pos) = state.held.iter().position(|h| {
                    (h.0, h.1, h.2, h.3)
                        == (info.device_type, info.device_no, info.interface_no, record.key)
                }) else {
                    return Err(failure(request, "lock not held"));
                };
                let (device_type, device_no, interface_no, _) = state.held.remove(pos);
                state.free.push((device_type, device_no, interface_no));
                Ok(())
            }
            HidRequest::MouseGetMode => {
                let mut record = MouseModeRecord::decode(buf)
                    .map_err(|_| failure(request, "short buffer"))?;
                record.data = state.mouse_mode;
                buf[..MOUSE_MODE_RECORD_LEN].copy_from_slice(&record.encode());
                Ok(())
            }
            HidRequest::MouseAbsToRel => {
                state.mouse_mode = MouseMode::Relative as u8;
                Ok(())
            }
            HidRequest::MouseRelToAbs => {
                state.mouse_mode = MouseMode::Absolute as u8;
                Ok(())
            }
            HidRequest::KeyboardLed | HidRequest::KeyboardLedNoWait => {
                if buf.len() <= DATA_OFFSET {
                    return Err(failure(request, "short buffer"));
                }
                buf[DATA_OFFSET] = state.led_bits;
                Ok(())
            }
            HidRequest::KeyboardData | HidRequest::MouseData => Ok(()),
        }
    }
}
