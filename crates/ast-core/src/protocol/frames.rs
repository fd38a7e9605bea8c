//! HID frames: keyboard reports, mouse reports and LED status queries.
//!
//! # Frame layout
//!
//! ```text
//!  0..32  IusbHeader (sealed)
//! 32      DataLen      8 keyboard, 4 mouse, 0 LED query
//! 33..41  Data         report bytes, zero padded
//! ```
//!
//! Every frame is [`HID_FRAME_LEN`] bytes on the wire and announces
//! [`HID_DATA_PACKET_LEN`] in the header: the DataLen byte plus the 8-byte
//! data area.  `DataLen` tells the driver how much of the data area is used.
//!
//! # Builder state
//!
//! [`HidFrameBuilder`] keeps the only mutable state of the input path:
//!
//! - the scancode decoder (pending `0xE0` prefix and the modifier byte),
//! - the last button mask sent to the mouse, for debouncing.
//!
//! Sequence numbers are not part of the builder; they come from the
//! [`DeviceLock`] passed to each call.

use tracing::trace;

use super::header::{DeviceType, HidProtocol, IusbHeader, HEADER_LEN};
use super::lock::DeviceLock;
use super::ProtocolError;
use crate::keymap::scancode::{
    classify, usage_for, KeyClass, ModifierFlags, EXTENDED_BIT, EXTENDED_PREFIX, RELEASE_BIT,
};

// ── Layout constants ──────────────────────────────────────────────────────────

/// `DataPktLen` announced by every HID frame.
pub const HID_DATA_PACKET_LEN: u32 = 9;

/// Offset of the `DataLen` byte.
pub const DATA_LEN_OFFSET: usize = HEADER_LEN;

/// Offset of the first data byte.
pub const DATA_OFFSET: usize = HEADER_LEN + 1;

/// Total encoded size of a HID frame.
pub const HID_FRAME_LEN: usize = HEADER_LEN + HID_DATA_PACKET_LEN as usize;

/// `DataLen` of a keyboard report.
pub const KEYBOARD_REPORT_LEN: u8 = 8;

/// `DataLen` of a relative mouse report.
pub const MOUSE_REPORT_LEN: u8 = 4;

const DATA_AREA_LEN: usize = HID_FRAME_LEN - DATA_OFFSET;

/// Mouse button bits of the report's first byte.
pub struct MouseButtons;

impl MouseButtons {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
    /// Synthetic bit for a negative wheel delta.
    pub const WHEEL_UP: u8 = 0x10;
    /// Synthetic bit for a positive wheel delta.
    pub const WHEEL_DOWN: u8 = 0x20;
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Boot-protocol keyboard report carried by a keyboard frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: ModifierFlags,
    /// HID usage of the pressed key, or 0 for "no key".
    pub usage: u8,
}

impl KeyboardReport {
    /// Encodes the 8-byte report: modifiers, auto-repeat flag, usage, padding.
    pub fn to_bytes(&self) -> [u8; 8] {
        // Byte 1 enables the device's automatic key-break handling.
        [self.modifiers.bits(), 1, self.usage, 0, 0, 0, 0, 0]
    }
}

/// Relative mouse report carried by a mouse frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseReport {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl MouseReport {
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.buttons,
            self.dx as u8,
            self.dy as u8,
            self.wheel as u8,
        ]
    }
}

/// Keyboard LED state reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

impl LedState {
    pub const CAPS_LOCK: u8 = 0x01;
    pub const NUM_LOCK: u8 = 0x02;
    pub const SCROLL_LOCK: u8 = 0x04;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            caps_lock: bits & Self::CAPS_LOCK != 0,
            num_lock: bits & Self::NUM_LOCK != 0,
            scroll_lock: bits & Self::SCROLL_LOCK != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.caps_lock {
            bits |= Self::CAPS_LOCK;
        }
        if self.num_lock {
            bits |= Self::NUM_LOCK;
        }
        if self.scroll_lock {
            bits |= Self::SCROLL_LOCK;
        }
        bits
    }

    /// Reads the LED byte from a frame buffer the driver has filled in
    /// response to an LED query.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InsufficientData`] if `frame` ends before the data byte.
    pub fn from_response(frame: &[u8]) -> Result<Self, ProtocolError> {
        frame
            .get(DATA_OFFSET)
            .map(|bits| Self::from_bits(*bits))
            .ok_or(ProtocolError::InsufficientData {
                needed: DATA_OFFSET + 1,
                available: frame.len(),
            })
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// A sealed, ready-to-send HID frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidFrame {
    header: IusbHeader,
    data_len: u8,
    data: [u8; DATA_AREA_LEN],
}

impl HidFrame {
    /// Draws the next sequence number from `lock` and seals the header.
    fn new(
        lock: &DeviceLock,
        device_type: DeviceType,
        protocol: HidProtocol,
        payload: &[u8],
    ) -> Self {
        let mut header = IusbHeader::new(
            device_type,
            protocol,
            HID_DATA_PACKET_LEN,
            lock.device_no(),
            lock.interface_no(),
            lock.next_seq_no(),
            lock.key(),
        );
        header.seal();

        let mut data = [0u8; DATA_AREA_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            header,
            data_len: payload.len() as u8,
            data,
        }
    }

    pub fn header(&self) -> &IusbHeader {
        &self.header
    }

    pub fn seq_no(&self) -> u32 {
        self.header.seq_no
    }

    pub fn data_len(&self) -> u8 {
        self.data_len
    }

    /// The used part of the data area.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.data_len as usize]
    }

    /// Encodes the full frame for the driver.
    pub fn to_bytes(&self) -> [u8; HID_FRAME_LEN] {
        let mut buf = [0u8; HID_FRAME_LEN];
        buf[..HEADER_LEN].copy_from_slice(&self.header.encode());
        buf[DATA_LEN_OFFSET] = self.data_len;
        buf[DATA_OFFSET..].copy_from_slice(&self.data);
        buf
    }
}

// ── Scancode decoder ──────────────────────────────────────────────────────────

/// Turns a stream of set-1 scancode bytes into keyboard reports.
#[derive(Debug, Default)]
pub struct ScancodeDecoder {
    extended: bool,
    modifiers: ModifierFlags,
}

impl ScancodeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one scancode byte.
    ///
    /// Returns `None` for the extended prefix `0xE0`, which only arms the
    /// decoder for the next byte.  Every other byte produces a report:
    ///
    /// - modifiers update the modifier byte and report usage 0;
    /// - a release always reports usage 0;
    /// - navigation keys use their dedicated usage;
    /// - everything else goes through the scancode table, gaps giving 0.
    pub fn decode(&mut self, scancode: u8) -> Option<KeyboardReport> {
        if scancode == EXTENDED_PREFIX {
            self.extended = true;
            return None;
        }

        let released = scancode & RELEASE_BIT != 0;
        let mut keycode = scancode & !RELEASE_BIT;
        if self.extended {
            self.extended = false;
            keycode |= EXTENDED_BIT;
        }

        let usage = match classify(keycode) {
            KeyClass::Modifier(bit) => {
                self.modifiers.apply(bit, !released);
                0
            }
            _ if released => 0,
            KeyClass::Navigation(usage) => usage,
            KeyClass::Table => usage_for(keycode).unwrap_or(0),
        };

        trace!(scancode, keycode, released, usage, "decoded scancode");
        Some(KeyboardReport {
            modifiers: self.modifiers,
            usage,
        })
    }

    pub fn modifiers(&self) -> ModifierFlags {
        self.modifiers
    }

    pub fn is_extended_pending(&self) -> bool {
        self.extended
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Builds sealed frames for the keyboard and mouse devices.
#[derive(Debug, Default)]
pub struct HidFrameBuilder {
    decoder: ScancodeDecoder,
    last_buttons: u8,
}

impl HidFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a keyboard frame for one scancode byte.
    ///
    /// Returns `None` for the extended prefix byte; no sequence number is
    /// consumed in that case.
    pub fn build_key_report(&mut self, lock: &DeviceLock, scancode: u8) -> Option<HidFrame> {
        let report = self.decoder.decode(scancode)?;
        Some(HidFrame::new(
            lock,
            DeviceType::Keyboard,
            HidProtocol::KeyboardData,
            &report.to_bytes(),
        ))
    }

    /// Builds a relative mouse frame.
    ///
    /// The wheel direction is folded into the button mask
    /// ([`MouseButtons::WHEEL_UP`] for negative, [`MouseButtons::WHEEL_DOWN`]
    /// for positive).  A report with the same folded mask as the previous one
    /// and no pointer motion is suppressed and `None` is returned.  Comparing
    /// the mask alone would also drop plain relative motion, so a non-zero
    /// delta always goes out.  Deltas outside the signed byte range are
    /// clamped.
    pub fn build_mouse_report(
        &mut self,
        lock: &DeviceLock,
        dx: i32,
        dy: i32,
        wheel: i32,
        buttons: u8,
    ) -> Option<HidFrame> {
        let mut mask = buttons;
        if wheel < 0 {
            mask |= MouseButtons::WHEEL_UP;
        }
        if wheel > 0 {
            mask |= MouseButtons::WHEEL_DOWN;
        }

        if mask == self.last_buttons && dx == 0 && dy == 0 {
            trace!(mask, "mouse report suppressed");
            return None;
        }
        self.last_buttons = mask;

        let report = MouseReport {
            buttons: mask,
            dx: clamp_i8(dx),
            dy: clamp_i8(dy),
            wheel: clamp_i8(wheel),
        };
        Some(HidFrame::new(
            lock,
            DeviceType::Mouse,
            HidProtocol::MouseData,
            &report.to_bytes(),
        ))
    }

    /// Button-only update: a mouse report with no motion and no wheel.
    pub fn build_mouse_buttons(&mut self, lock: &DeviceLock, buttons: u8) -> Option<HidFrame> {
        self.build_mouse_report(lock, 0, 0, 0, buttons)
    }

    /// Builds an LED status query.  The driver writes the LED bits into the
    /// first data byte of the same buffer; see [`LedState::from_response`].
    pub fn build_led_query(&self, lock: &DeviceLock) -> HidFrame {
        HidFrame::new(lock, DeviceType::Keyboard, HidProtocol::KeyboardStatus, &[])
    }

    /// Current modifier byte of the keyboard decoder.
    pub fn modifiers(&self) -> ModifierFlags {
        self.decoder.modifiers()
    }

    /// Last button mask sent to the mouse.
    pub fn last_buttons(&self) -> u8 {
        self.last_buttons
    }
}

fn clamp_i8(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}
