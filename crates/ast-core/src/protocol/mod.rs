//! Binary framing for the IUSB HID redirection driver.
//!
//! - [`header`]    – the 32-byte IUSB header and its checksum.
//! - [`frames`]    – keyboard, mouse and LED frames plus the stateful builder.
//! - [`interface`] – lock enumerate/request/release and mouse-mode records.
//! - [`lock`]      – the [`DeviceLock`] grant that authorizes frames.
//! - [`sequence`]  – the per-lock sequence counter.

pub mod frames;
pub mod header;
pub mod interface;
pub mod lock;
pub mod sequence;

use thiserror::Error;

pub use frames::{
    HidFrame, HidFrameBuilder, KeyboardReport, LedState, MouseButtons, MouseReport,
    ScancodeDecoder, HID_FRAME_LEN,
};
pub use header::{DeviceType, Direction, HidProtocol, IusbHeader, HEADER_LEN};
pub use interface::{
    DeviceInfo, DeviceList, FreeDeviceQuery, LockRequest, LockType, MouseMode, MouseModeRecord,
};
pub use lock::DeviceLock;
pub use sequence::SequenceCounter;

/// Errors raised while decoding driver records.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The buffer is shorter than the record requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The header does not start with `"IUSB    "`.
    #[error("bad IUSB signature")]
    BadSignature,

    #[error("unknown device type: 0x{0:02X}")]
    UnknownDeviceType(u8),

    #[error("unknown HID protocol: 0x{0:02X}")]
    UnknownProtocol(u8),

    /// A field value is out of range.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}
