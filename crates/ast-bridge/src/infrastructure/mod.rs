//! Infrastructure layer of the bridge.
//!
//! Contains the OS-facing adapters: the capture engine (`/dev/videocap`),
//! the HID redirection driver (`/dev/usb`), the display-protocol runtime
//! boundary and configuration storage.
//!
//! **Dependency rule**: the application layer only sees the device traits and
//! error types declared here, never a concrete adapter.  Concrete adapters are
//! chosen in `main.rs`.

pub mod capture;
pub mod display;
pub mod hid;
pub mod storage;
