//! PC scancode (set 1) to USB HID Usage ID translation.
//!
//! # How scancodes arrive (for beginners)
//!
//! The display-protocol client forwards raw PC/AT set-1 scancodes, one byte at
//! a time:
//!
//! - The low 7 bits identify the physical key (`0x1E` is the `A` key).
//! - Bit 7 (`0x80`) marks a *release* ("break") rather than a press.
//! - Keys added after the original PC/XT keyboard (arrows, right Ctrl, ...)
//!   are sent as two bytes: the prefix `0xE0` followed by the base scancode.
//!
//! The decoder in [`crate::protocol::frames`] folds the `0xE0` prefix into
//! bit 7 of the key code, so extended keys occupy the range `0x80..=0xFF`.
//! The result is an 8-bit *key code* used to index the table below.
//!
//! # The table
//!
//! [`SCANCODE_TO_USAGE`] is a compile-time constant array of 256 entries,
//! indexed by key code.  Gaps hold [`UNMAPPED`].  Modifiers and the
//! navigation cluster are classified before the table is consulted; see
//! [`classify`].

// ── Modifier flags ────────────────────────────────────────────────────────────

/// The HID boot-keyboard modifier byte.
///
/// Bit positions follow the USB HID usage order `0xE0..=0xE7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierFlags(pub u8);

impl ModifierFlags {
    pub const LEFT_CTRL: u8 = 1 << 0;
    pub const LEFT_SHIFT: u8 = 1 << 1;
    pub const LEFT_ALT: u8 = 1 << 2;
    pub const LEFT_META: u8 = 1 << 3;
    pub const RIGHT_CTRL: u8 = 1 << 4;
    pub const RIGHT_SHIFT: u8 = 1 << 5;
    pub const RIGHT_ALT: u8 = 1 << 6;
    pub const RIGHT_META: u8 = 1 << 7;

    /// Sets `bit` when `pressed`, clears it otherwise.
    pub fn apply(&mut self, bit: u8, pressed: bool) {
        if pressed {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

// ── Scancode constants ────────────────────────────────────────────────────────

/// Prefix byte announcing an extended (two-byte) scancode.
pub const EXTENDED_PREFIX: u8 = 0xE0;

/// Release ("break") bit of a scancode byte.
pub const RELEASE_BIT: u8 = 0x80;

/// Bit set on the key code of an extended key.
pub const EXTENDED_BIT: u8 = 0x80;

/// Table entry for key codes with no HID usage.
pub const UNMAPPED: u8 = 0x00;

/// What a key code means to the report builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// A modifier key; the payload is its [`ModifierFlags`] bit.  The report
    /// carries no key usage for these.
    Modifier(u8),
    /// A navigation key with an explicit usage.
    Navigation(u8),
    /// Anything else; translated through [`SCANCODE_TO_USAGE`].
    Table,
}

/// Classifies a decoded key code.
pub fn classify(keycode: u8) -> KeyClass {
    match keycode {
        0x1D => KeyClass::Modifier(ModifierFlags::LEFT_CTRL),
        0x2A => KeyClass::Modifier(ModifierFlags::LEFT_SHIFT),
        0x36 => KeyClass::Modifier(ModifierFlags::RIGHT_SHIFT),
        0x38 => KeyClass::Modifier(ModifierFlags::LEFT_ALT),
        // Right Ctrl/Alt arrive either as the evdev-style codes 97/100 or as
        // the extended forms E0 1D / E0 38.
        0x61 | 0x9D => KeyClass::Modifier(ModifierFlags::RIGHT_CTRL),
        0x64 | 0xB8 => KeyClass::Modifier(ModifierFlags::RIGHT_ALT),
        0xDB => KeyClass::Modifier(ModifierFlags::LEFT_META),
        0xDC => KeyClass::Modifier(ModifierFlags::RIGHT_META),
        0xC7 => KeyClass::Navigation(SCANCODE_TO_USAGE[102]), // Home
        0xC8 => KeyClass::Navigation(SCANCODE_TO_USAGE[103]), // Up
        0xC9 => KeyClass::Navigation(SCANCODE_TO_USAGE[104]), // Page Up
        0xCB => KeyClass::Navigation(SCANCODE_TO_USAGE[105]), // Left
        0xCD => KeyClass::Navigation(SCANCODE_TO_USAGE[106]), // Right
        0xCF => KeyClass::Navigation(SCANCODE_TO_USAGE[107]), // End
        0xD0 => KeyClass::Navigation(SCANCODE_TO_USAGE[108]), // Down
        0xD1 => KeyClass::Navigation(SCANCODE_TO_USAGE[109]), // Page Down
        0xD2 => KeyClass::Navigation(SCANCODE_TO_USAGE[110]), // Insert
        0xD3 => KeyClass::Navigation(SCANCODE_TO_USAGE[111]), // Delete
        _ => KeyClass::Table,
    }
}

/// Looks up the HID usage for `keycode`, returning `None` for gaps.
pub fn usage_for(keycode: u8) -> Option<u8> {
    match SCANCODE_TO_USAGE[keycode as usize] {
        UNMAPPED => None,
        usage => Some(usage),
    }
}

/// Key code (0x00–0xFF) to HID usage (page 0x07) table.
///
/// Entries `0x00..=0x58` follow the set-1 layout of the main block, keypad
/// and F-keys.  Entries `0x59..=0x77` cover the evdev-numbered keys that
/// remote clients send for keypad Enter, right Ctrl, the navigation cluster
/// and multimedia keys.  Entries above `0x77` are mostly international and
/// vendor keys; everything else is [`UNMAPPED`].
pub const SCANCODE_TO_USAGE: [u8; 256] = [
    // 0x00
    0x00, 0x29, 0x1E, 0x1F, 0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x2D, 0x2E, 0x2A, 0x2B,
    // 0x10
    0x14, 0x1A, 0x08, 0x15, 0x17, 0x1C, 0x18, 0x0C, 0x12, 0x13, 0x2F, 0x30, 0x28, 0xE0, 0x04, 0x16,
    // 0x20
    0x07, 0x09, 0x0A, 0x0B, 0x0D, 0x0E, 0x0F, 0x33, 0x34, 0x35, 0xE1, 0x32, 0x1D, 0x1B, 0x06, 0x19,
    // 0x30
    0x05, 0x11, 0x10, 0x36, 0x37, 0x38, 0xE5, 0x55, 0xE2, 0x2C, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E,
    // 0x40
    0x3F, 0x40, 0x41, 0x42, 0x43, 0x53, 0x47, 0x5F, 0x60, 0x61, 0x56, 0x5C, 0x5D, 0x5E, 0x57, 0x59,
    // 0x50
    0x5A, 0x5B, 0x62, 0x63, 0x00, 0x94, 0x64, 0x44, 0x45, 0x87, 0x92, 0x93, 0x8A, 0x88, 0x8B, 0x8C,
    // 0x60
    0x58, 0xE4, 0x54, 0x46, 0xE6, 0x00, 0x4A, 0x52, 0x4B, 0x50, 0x4F, 0x4D, 0x51, 0x4E, 0x49, 0x4C,
    // 0x70
    0x00, 0xEF, 0xEE, 0xED, 0x66, 0x67, 0x00, 0x48, 0x00, 0x85, 0x90, 0x91, 0x89, 0xE3, 0xE7, 0x65,
    // 0x80
    0xF3, 0x79, 0x76, 0x7A, 0x77, 0x7C, 0x74, 0x7D, 0xF4, 0x7B, 0x75, 0x00, 0xFB, 0x00, 0xF8, 0x00,
    // 0x90
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x00, 0xF9, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF1, 0xF2,
    // 0xA0
    0x00, 0xEC, 0x00, 0xEB, 0xE8, 0xEA, 0xE9, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFA, 0x00, 0x00,
    // 0xB0
    0xF7, 0xF5, 0xF6, 0xB6, 0xB7, 0x00, 0x00, 0x68, 0x69, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70,
    // 0xC0
    0x71, 0x72, 0x73, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0xD0
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0xE0
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0xF0
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
