//! Key code translation for keyboard reports sent to the HID redirector.
//!
//! The canonical representation on the device side is the USB HID Usage ID
//! (page 0x07, Keyboard/Keypad).  Incoming events are PC set-1 scancodes.

pub mod scancode;

pub use scancode::{classify, usage_for, KeyClass, ModifierFlags, SCANCODE_TO_USAGE, UNMAPPED};
