//! Interface-management records exchanged with the HID redirection driver.
//!
//! Locking a device is a two-step exchange:
//!
//! 1. **Enumerate.**  The caller fills a [`FreeDeviceQuery`] (device type and
//!    lock type) and the driver answers in the same buffer with a device list:
//!    a count followed by the first free device.
//! 2. **Request.**  The caller sends a [`LockRequest`] for that device; the
//!    driver fills in the granted session key.
//!
//! Release sends the same [`LockRequest`] record carrying the key.  Mouse
//! mode changes use a [`MouseModeRecord`].
//!
//! All records are packed with little-endian integers.

use super::header::{read_u32_le, DeviceType, HEADER_LEN};
use super::lock::DeviceLock;
use super::ProtocolError;

/// Encoded size of a [`DeviceInfo`].
pub const DEVICE_INFO_LEN: usize = 5;

/// Encoded size of the enumerate buffer: type, lock type, header, count, one device.
pub const FREE_DEVICE_INFO_LEN: usize = 2 + HEADER_LEN + 1 + DEVICE_INFO_LEN;

/// Encoded size of a [`LockRequest`].
pub const LOCK_REQUEST_LEN: usize = DEVICE_INFO_LEN + 4;

/// Encoded size of a [`MouseModeRecord`].
pub const MOUSE_MODE_RECORD_LEN: usize = 4 + DEVICE_INFO_LEN + 1;

const DEV_COUNT_OFFSET: usize = 2 + HEADER_LEN;
const FIRST_DEVICE_OFFSET: usize = DEV_COUNT_OFFSET + 1;

/// Lock semantics requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockType {
    Exclusive = 0x01,
    Shared = 0x02,
}

/// Pointer mode of the emulated mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MouseMode {
    Relative = 1,
    Absolute = 2,
}

impl TryFrom<u8> for MouseMode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MouseMode::Relative),
            2 => Ok(MouseMode::Absolute),
            other => Err(ProtocolError::MalformedRecord(format!(
                "unknown mouse mode {other}"
            ))),
        }
    }
}

// ── DeviceInfo ────────────────────────────────────────────────────────────────

/// One device entry as the driver describes it.  Fields are kept raw because
/// the driver may leave some of them zero in replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub device_type: u8,
    pub device_no: u8,
    pub interface_no: u8,
    pub lock_type: u8,
    pub instance: u8,
}

impl DeviceInfo {
    /// Describes the device held by `lock`, as used for release and mode
    /// records.
    pub fn for_lock(lock: &DeviceLock) -> Self {
        Self {
            device_type: lock.device_type() as u8,
            device_no: lock.device_no(),
            interface_no: lock.interface_no(),
            lock_type: LockType::Exclusive as u8,
            instance: 0,
        }
    }

    pub fn encode(&self) -> [u8; DEVICE_INFO_LEN] {
        [
            self.device_type,
            self.device_no,
            self.interface_no,
            self.lock_type,
            self.instance,
        ]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require_len(buf, DEVICE_INFO_LEN)?;
        Ok(Self {
            device_type: buf[0],
            device_no: buf[1],
            interface_no: buf[2],
            lock_type: buf[3],
            instance: buf[4],
        })
    }
}

// ── Enumerate ─────────────────────────────────────────────────────────────────

/// Request for the list of free interfaces of one device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeDeviceQuery {
    pub device_type: DeviceType,
    pub lock_type: LockType,
}

impl FreeDeviceQuery {
    /// Encodes the full in/out buffer; the reply area is zeroed.
    pub fn encode(&self) -> [u8; FREE_DEVICE_INFO_LEN] {
        let mut buf = [0u8; FREE_DEVICE_INFO_LEN];
        buf[0] = self.device_type as u8;
        buf[1] = self.lock_type as u8;
        buf
    }
}

/// The driver's answer to a [`FreeDeviceQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceList {
    pub count: u8,
    /// First free device; `None` when `count` is zero.
    pub first: Option<DeviceInfo>,
}

impl DeviceList {
    /// Parses the reply written into a [`FreeDeviceQuery`] buffer.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InsufficientData`] if `buf` is shorter than
    /// [`FREE_DEVICE_INFO_LEN`].
    pub fn decode_reply(buf: &[u8]) -> Result<Self, ProtocolError> {
        require_len(buf, FREE_DEVICE_INFO_LEN)?;
        let count = buf[DEV_COUNT_OFFSET];
        let first = if count == 0 {
            None
        } else {
            Some(DeviceInfo::decode(&buf[FIRST_DEVICE_OFFSET..])?)
        };
        Ok(Self { count, first })
    }
}

// ── Request / release ─────────────────────────────────────────────────────────

/// Lock request or release record.  On request the driver fills in `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub info: DeviceInfo,
    pub key: u32,
}

impl LockRequest {
    /// An exclusive request for `device`, as found by enumeration.
    pub fn exclusive(device_type: DeviceType, device: &DeviceInfo) -> Self {
        Self {
            info: DeviceInfo {
                device_type: device_type as u8,
                device_no: device.device_no,
                interface_no: device.interface_no,
                lock_type: LockType::Exclusive as u8,
                instance: 0,
            },
            key: 0,
        }
    }

    /// A release record for a held lock.
    pub fn release(lock: &DeviceLock) -> Self {
        Self {
            info: DeviceInfo::for_lock(lock),
            key: lock.key(),
        }
    }

    pub fn encode(&self) -> [u8; LOCK_REQUEST_LEN] {
        let mut buf = [0u8; LOCK_REQUEST_LEN];
        buf[..DEVICE_INFO_LEN].copy_from_slice(&self.info.encode());
        buf[DEVICE_INFO_LEN..].copy_from_slice(&self.key.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require_len(buf, LOCK_REQUEST_LEN)?;
        Ok(Self {
            info: DeviceInfo::decode(buf)?,
            key: read_u32_le(buf, DEVICE_INFO_LEN),
        })
    }

    /// Builds the lock granted by a successful request reply.
    pub fn into_lock(self, device_type: DeviceType) -> DeviceLock {
        DeviceLock::new(
            device_type,
            self.info.device_no,
            self.info.interface_no,
            self.key,
        )
    }
}

// ── Mouse mode ────────────────────────────────────────────────────────────────

/// Record used to read or switch the mouse pointer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseModeRecord {
    pub key: u32,
    pub info: DeviceInfo,
    pub data: u8,
}

impl MouseModeRecord {
    pub fn for_lock(lock: &DeviceLock, data: u8) -> Self {
        Self {
            key: lock.key(),
            info: DeviceInfo::for_lock(lock),
            data,
        }
    }

    pub fn encode(&self) -> [u8; MOUSE_MODE_RECORD_LEN] {
        let mut buf = [0u8; MOUSE_MODE_RECORD_LEN];
        buf[0..4].copy_from_slice(&self.key.to_le_bytes());
        buf[4..4 + DEVICE_INFO_LEN].copy_from_slice(&self.info.encode());
        buf[MOUSE_MODE_RECORD_LEN - 1] = self.data;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require_len(buf, MOUSE_MODE_RECORD_LEN)?;
        Ok(Self {
            key: read_u32_le(buf, 0),
            info: DeviceInfo::decode(&buf[4..])?,
            data: buf[MOUSE_MODE_RECORD_LEN - 1],
        })
    }
}

fn require_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}
