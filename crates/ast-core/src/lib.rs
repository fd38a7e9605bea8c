//! # ast-core
//!
//! Shared library for AST-Bridge, the glue between a BMC's video capture
//! engine / USB HID redirector and a remote-display protocol server.
//!
//! This crate holds everything that can be expressed over plain byte
//! buffers.  It has no dependencies on device files, ioctls or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! The bridge moves data in two directions:
//!
//! - **Input** flows *towards* the managed host.  Keyboard scancodes and
//!   pointer motion are turned into checksummed IUSB frames and written to the
//!   USB redirection driver, which replays them as a real USB keyboard and
//!   mouse.
//! - **Video** flows *away* from the managed host.  The capture engine writes
//!   compressed frames and a hardware cursor pattern into shared memory; the
//!   bridge wraps them into commands the display server pulls one at a time.
//!
//! This crate is split accordingly:
//!
//! - **`protocol`** – IUSB header and HID frame encoding, the driver's lock
//!   records, and the stateful [`HidFrameBuilder`].
//!
//! - **`keymap`** – The immutable scancode to HID usage table.
//!
//! - **`domain`** – Capture memory parsing, cursor transcoding, the
//!   [`Command`] set, the single-slot [`CommandMailbox`] and the
//!   [`ReleaseLifecycleManager`].

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::{
    Command, CommandMailbox, CursorPattern, CursorShape, CursorTranscoder, RawFrame,
    ReleaseLifecycleManager, SlotState,
};
pub use keymap::ModifierFlags;
pub use protocol::{DeviceLock, DeviceType, HidFrame, HidFrameBuilder, LedState, ProtocolError};
