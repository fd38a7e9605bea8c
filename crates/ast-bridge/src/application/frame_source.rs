//! Frame source use case: drives the capture engine and reads frames and
//! cursor state out of its shared memory.
//!
//! Control-call failures never escape this module as errors.  They are
//! logged and reported as [`FramePoll::Failed`] / [`CursorPoll::Failed`], and
//! the caller simply tries again on the next tick.

use ast_core::domain::capture::CURSOR_INFO_OFFSET;
use ast_core::domain::cursor::{CursorInfo, CursorPattern, CURSOR_INFO_PREFIX_LEN};
use ast_core::domain::RawFrame;
use tracing::{debug, info, warn};

use crate::infrastructure::capture::{CaptureDevice, CaptureError, CaptureOpcode, CaptureStatus};

/// Result of asking the engine for a frame.
#[derive(Debug)]
pub enum FramePoll {
    /// A new frame, copied out of capture memory.
    Changed(RawFrame),
    /// The screen has not changed since the last frame.
    NoChange,
    /// The engine reports a blank screen.
    Blank,
    /// The control call failed or the memory did not hold a valid frame.
    Failed,
}

/// Result of asking the engine for the hardware cursor.
#[derive(Debug)]
pub enum CursorPoll {
    /// A new cursor shape together with its position.
    Shape(CursorPattern),
    /// Only the position was updated.
    Position(CursorInfo),
    /// No cursor is shown.
    Hidden,
    /// Nothing reported this time.
    Idle,
    Failed,
}

/// Owns the capture device and issues its control calls.
pub struct FrameSource {
    device: Box<dyn CaptureDevice>,
    running: bool,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            running: false,
        }
    }

    /// Resets the engine and starts capturing.
    ///
    /// # Errors
    ///
    /// Returns the [`CaptureError`] of the first failing call.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.control_checked(CaptureOpcode::ResetEngine)?;
        self.control_checked(CaptureOpcode::StartCapture)?;
        self.running = true;
        info!("video capture started");
        Ok(())
    }

    /// Stops and immediately restarts capturing, used when a new client
    /// attaches.  Failures are logged.
    pub fn restart(&mut self) {
        if let Err(e) = self.control_checked(CaptureOpcode::StopCapture) {
            warn!(error = %e, "stop capture failed");
        }
        match self.control_checked(CaptureOpcode::StartCapture) {
            Ok(()) => {
                self.running = true;
                info!("video capture restarted");
            }
            Err(e) => warn!(error = %e, "start capture failed"),
        }
    }

    /// Stops capturing.  Failures are logged.
    pub fn stop(&mut self) {
        if let Err(e) = self.control_checked(CaptureOpcode::StopCapture) {
            warn!(error = %e, "stop capture failed");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Asks the engine for the next frame.
    pub fn poll_frame(&mut self) -> FramePoll {
        let reply = match self.device.control(CaptureOpcode::GetVideo) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "get video failed");
                return FramePoll::Failed;
            }
        };

        match reply.status {
            CaptureStatus::Success => {
                match RawFrame::from_capture_memory(self.device.memory(), reply.size) {
                    Ok(frame) => FramePoll::Changed(frame),
                    Err(e) => {
                        warn!(error = %e, size = reply.size, "invalid frame in capture memory");
                        FramePoll::Failed
                    }
                }
            }
            CaptureStatus::NoVideoChange => FramePoll::NoChange,
            CaptureStatus::BlankScreen => FramePoll::Blank,
            status => {
                debug!(?status, "get video returned no frame");
                FramePoll::Failed
            }
        }
    }

    /// Asks the engine for the hardware cursor.
    ///
    /// More than [`CURSOR_INFO_PREFIX_LEN`] valid bytes means a new shape;
    /// fewer means a position update only.
    pub fn poll_cursor(&mut self) -> CursorPoll {
        let reply = match self.device.control(CaptureOpcode::GetCursor) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "get cursor failed");
                return CursorPoll::Failed;
            }
        };

        if reply.status == CaptureStatus::NoCursor {
            return CursorPoll::Hidden;
        }
        if reply.size == 0 {
            return CursorPoll::Idle;
        }

        let block = self
            .device
            .memory()
            .get(CURSOR_INFO_OFFSET..)
            .unwrap_or_default();
        let parsed = if reply.size > CURSOR_INFO_PREFIX_LEN {
            CursorPattern::parse(block).map(CursorPoll::Shape)
        } else {
            CursorInfo::parse(block).map(CursorPoll::Position)
        };
        parsed.unwrap_or_else(|e| {
            warn!(error = %e, "invalid cursor block in capture memory");
            CursorPoll::Failed
        })
    }

    /// Issues `opcode` and turns a non-success status into an error.
    fn control_checked(&mut self, opcode: CaptureOpcode) -> Result<(), CaptureError> {
        let reply = self.device.control(opcode)?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(CaptureError::Control {
                opcode,
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("engine returned {:?}", reply.status),
                ),
            })
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
