//! USB HID redirection driver access.
//!
//! Every driver operation is an ioctl on `/dev/usb` whose argument is a
//! pointer to a caller-owned buffer.  The driver reads the request from that
//! buffer and, for read-direction calls, writes its reply into the same
//! buffer.  Buffer layouts live in [`ast_core::protocol::interface`] and
//! [`ast_core::protocol::frames`].
//!
//! # Testability
//!
//! The [`HidDevice`] trait lets the application layer run against
//! [`mock::MockHidDevice`], which simulates the driver's lock bookkeeping.

use std::path::PathBuf;

use thiserror::Error;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

/// Driver operations, one per ioctl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HidRequest {
    /// Enumerate free interfaces of one device type.
    GetInterfaces,
    /// Lock an interface; the driver fills in the key.
    RequestInterface,
    /// Release a locked interface.
    ReleaseInterface,
    KeyboardData,
    /// Query keyboard LEDs, waiting for a change.
    KeyboardLed,
    /// Query keyboard LEDs, returning the current state immediately.
    KeyboardLedNoWait,
    MouseData,
    MouseAbsToRel,
    MouseRelToAbs,
    MouseGetMode,
}

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

impl HidRequest {
    /// Driver command number.
    pub fn number(&self) -> u8 {
        match self {
            HidRequest::GetInterfaces => 0xF1,
            HidRequest::RequestInterface => 0xF2,
            HidRequest::ReleaseInterface => 0xF3,
            HidRequest::KeyboardData => 0x11,
            HidRequest::KeyboardLed => 0x12,
            HidRequest::KeyboardLedNoWait => 0x14,
            HidRequest::MouseData => 0x21,
            HidRequest::MouseAbsToRel => 0x22,
            HidRequest::MouseRelToAbs => 0x23,
            HidRequest::MouseGetMode => 0x24,
        }
    }

    /// Whether the driver writes a reply into the buffer.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            HidRequest::GetInterfaces
                | HidRequest::RequestInterface
                | HidRequest::KeyboardLed
                | HidRequest::KeyboardLedNoWait
        )
    }

    /// Full ioctl number: `_IOC(dir, 'U', nr, 0x3FFF)`.
    pub fn ioctl_number(&self) -> u32 {
        let dir = if self.is_read() { IOC_READ } else { IOC_WRITE };
        (dir << 30) | (0x3FFF << 16) | ((b'U' as u32) << 8) | self.number() as u32
    }
}

/// Errors from the HID redirection device.
#[derive(Debug, Error)]
pub enum HidError {
    #[error("cannot open HID device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HID request {request:?} failed: {source}")]
    Request {
        request: HidRequest,
        #[source]
        source: std::io::Error,
    },

    #[error("HID device not supported on this platform")]
    Unsupported,
}

/// Access to the HID redirection driver.
pub trait HidDevice: Send {
    /// Issues `request` with `buf` as its in/out argument.
    fn call(&mut self, request: HidRequest, buf: &mut [u8]) -> Result<(), HidError>;
}

/// Opens the platform HID device.
///
/// # Errors
///
/// [`HidError::Open`] if the node cannot be opened; [`HidError::Unsupported`]
/// off Linux.
pub fn open_hid_device(path: &std::path::Path) -> Result<Box<dyn HidDevice>, HidError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxHidDevice::open(path)?))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = path;
        Err(HidError::Unsupported)
    }
}
