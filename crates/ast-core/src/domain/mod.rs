//! Capture-side domain: capture memory layout, cursor transcoding and the
//! command hand-off to the display consumer.
//!
//! Nothing here touches a device; buffers come in as byte slices.

pub mod capture;
pub mod command;
pub mod cursor;
pub mod lifecycle;
pub mod mailbox;

pub use capture::{CaptureLayoutError, FrameHeader, RawFrame, VideoMode};
pub use command::{Command, CommandCategory, CommandKind, ImageSource, Rect, SurfaceCommand};
pub use cursor::{
    CursorInfo, CursorPattern, CursorPosition, CursorShape, CursorTranscoder, CursorType,
    ShapeFormat,
};
pub use lifecycle::{ReleaseLifecycleManager, ReleaseOutcome};
pub use mailbox::{CommandMailbox, SlotState};
