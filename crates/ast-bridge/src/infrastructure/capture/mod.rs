//! Video capture engine device access.
//!
//! The engine is driven through one control call that takes an opcode and
//! returns a status code plus a size.  Frames and the cursor pattern are read
//! from a shared read-only memory mapping; see
//! [`ast_core::domain::capture`] for its layout.
//!
//! # Testability
//!
//! The [`CaptureDevice`] trait lets the application layer run against
//! [`mock::MockCaptureDevice`] in tests.  The Linux implementation issues the
//! real ioctl and mmap calls.

use std::path::PathBuf;

use thiserror::Error;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

/// Control operations understood by the capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CaptureOpcode {
    ResetEngine = 0,
    StartCapture = 1,
    StopCapture = 2,
    GetVideo = 3,
    GetCursor = 4,
    ClearBuffers = 5,
    SetVideoConfig = 6,
    GetVideoConfig = 7,
    SetScalarConfig = 8,
    EnableVideoDac = 9,
}

/// Result code of a control call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Success,
    Error,
    /// The screen did not change since the last GetVideo.
    NoVideoChange,
    BlankScreen,
    /// GetCursor: no hardware cursor is shown.
    NoCursor,
    Other(i32),
}

impl CaptureStatus {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => CaptureStatus::Success,
            1 => CaptureStatus::Error,
            2 => CaptureStatus::NoVideoChange,
            3 => CaptureStatus::BlankScreen,
            -2 => CaptureStatus::NoCursor,
            other => CaptureStatus::Other(other),
        }
    }
}

/// What a control call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlReply {
    pub status: CaptureStatus,
    /// Opcode-specific size: payload length for GetVideo, valid cursor info
    /// bytes for GetCursor.
    pub size: usize,
}

impl ControlReply {
    pub fn new(status: CaptureStatus, size: usize) -> Self {
        Self { status, size }
    }

    pub fn is_success(&self) -> bool {
        self.status == CaptureStatus::Success
    }
}

/// Errors from the capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open capture device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot map capture memory: {0}")]
    Map(#[source] std::io::Error),

    #[error("capture control {opcode:?} failed: {source}")]
    Control {
        opcode: CaptureOpcode,
        #[source]
        source: std::io::Error,
    },

    #[error("capture device not supported on this platform")]
    Unsupported,
}

/// Access to the capture engine.
pub trait CaptureDevice: Send {
    /// Issues one control call.
    ///
    /// A returned reply may still carry a non-success status; `Err` means the
    /// call itself failed.
    fn control(&mut self, opcode: CaptureOpcode) -> Result<ControlReply, CaptureError>;

    /// The shared memory mapping.  The driver may be writing it concurrently.
    fn memory(&self) -> &[u8];
}

/// Opens the platform capture device.
///
/// # Errors
///
/// [`CaptureError::Open`] or [`CaptureError::Map`] if the device node cannot
/// be opened or mapped; [`CaptureError::Unsupported`] off Linux.
pub fn open_capture_device(
    path: &std::path::Path,
    mmap_size: usize,
) -> Result<Box<dyn CaptureDevice>, CaptureError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxCaptureDevice::open(path, mmap_size)?))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = (path, mmap_size);
        Err(CaptureError::Unsupported)
    }
}
