//! The 32-byte IUSB header that prefixes every frame exchanged with the
//! HID redirection driver.
//!
//! # Wire layout
//!
//! All multi-byte fields are little-endian.  The struct is packed; there is no
//! padding between fields.
//!
//! ```text
//!  0..8   Signature       "IUSB    " (ASCII, space padded)
//!  8      Major           1
//!  9      Minor           0
//! 10      HeaderLen       32
//! 11      HeaderCheckSum  see below
//! 12..16  DataPktLen      u32
//! 16      ServerCaps
//! 17      DeviceType      0x30 keyboard, 0x31 mouse, 0x32 generic HID
//! 18      Protocol        0x10 kbd data, 0x11 kbd status, 0x20 mouse data, 0x21 mouse alive
//! 19      Direction       0x80 from remote, 0x00 to remote
//! 20      DeviceNo
//! 21      InterfaceNo
//! 22      ClientData
//! 23      Instance
//! 24..28  SeqNo           u32
//! 28..32  Key             u32 session key granted by the lock exchange
//! ```
//!
//! # The checksum (for beginners)
//!
//! The checksum byte is chosen so that the sum of all 32 header bytes,
//! including the checksum itself, is `0` modulo 256.  To compute it, add every
//! header byte with the checksum slot treated as zero, then take the two's
//! complement of the low byte.  A receiver validates a header by summing all
//! bytes and checking for zero; this crate only ever computes and embeds it.

use super::ProtocolError;

// ── Layout constants ──────────────────────────────────────────────────────────

/// Fixed ASCII signature at the start of every header.
pub const IUSB_SIGNATURE: [u8; 8] = *b"IUSB    ";

/// Protocol major version written into every header.
pub const IUSB_MAJOR: u8 = 1;

/// Protocol minor version written into every header.
pub const IUSB_MINOR: u8 = 0;

/// Size of the encoded header in bytes.
pub const HEADER_LEN: usize = 32;

/// Byte offset of the checksum field.
pub const CHECKSUM_OFFSET: usize = 11;

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Device class addressed by a frame or a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    Keyboard = 0x30,
    Mouse = 0x31,
    Hid = 0x32,
}

impl TryFrom<u8> for DeviceType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x30 => Ok(DeviceType::Keyboard),
            0x31 => Ok(DeviceType::Mouse),
            0x32 => Ok(DeviceType::Hid),
            other => Err(ProtocolError::UnknownDeviceType(other)),
        }
    }
}

/// Payload protocol carried after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HidProtocol {
    KeyboardData = 0x10,
    KeyboardStatus = 0x11,
    MouseData = 0x20,
    MouseAlive = 0x21,
}

impl TryFrom<u8> for HidProtocol {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(HidProtocol::KeyboardData),
            0x11 => Ok(HidProtocol::KeyboardStatus),
            0x20 => Ok(HidProtocol::MouseData),
            0x21 => Ok(HidProtocol::MouseAlive),
            other => Err(ProtocolError::UnknownProtocol(other)),
        }
    }
}

/// Direction flag.  Frames built by this crate always travel from the remote
/// side towards the emulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    ToRemote = 0x00,
    FromRemote = 0x80,
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        if value & 0x80 != 0 {
            Direction::FromRemote
        } else {
            Direction::ToRemote
        }
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

/// Decoded form of the 32-byte IUSB header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IusbHeader {
    pub major: u8,
    pub minor: u8,
    pub header_len: u8,
    /// Embedded checksum.  Zero until [`IusbHeader::seal`] is called.
    pub checksum: u8,
    pub data_packet_len: u32,
    pub server_caps: u8,
    pub device_type: DeviceType,
    pub protocol: HidProtocol,
    pub direction: Direction,
    pub device_no: u8,
    pub interface_no: u8,
    pub client_data: u8,
    pub instance: u8,
    pub seq_no: u32,
    pub key: u32,
}

impl IusbHeader {
    /// Creates an unsealed header for a frame travelling towards the device.
    ///
    /// Version, header length and direction are filled with their fixed
    /// values; `checksum` is zero.
    pub fn new(
        device_type: DeviceType,
        protocol: HidProtocol,
        data_packet_len: u32,
        device_no: u8,
        interface_no: u8,
        seq_no: u32,
        key: u32,
    ) -> Self {
        Self {
            major: IUSB_MAJOR,
            minor: IUSB_MINOR,
            header_len: HEADER_LEN as u8,
            checksum: 0,
            data_packet_len,
            server_caps: 0,
            device_type,
            protocol,
            direction: Direction::FromRemote,
            device_no,
            interface_no,
            client_data: 0,
            instance: 0,
            seq_no,
            key,
        }
    }

    /// Computes the checksum over the other fields and embeds it.
    pub fn seal(&mut self) {
        self.checksum = 0;
        self.checksum = header_checksum(&self.encode());
    }

    /// Encodes the header exactly as stored, including the current checksum.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&IUSB_SIGNATURE);
        buf[8] = self.major;
        buf[9] = self.minor;
        buf[10] = self.header_len;
        buf[CHECKSUM_OFFSET] = self.checksum;
        buf[12..16].copy_from_slice(&self.data_packet_len.to_le_bytes());
        buf[16] = self.server_caps;
        buf[17] = self.device_type as u8;
        buf[18] = self.protocol as u8;
        buf[19] = self.direction as u8;
        buf[20] = self.device_no;
        buf[21] = self.interface_no;
        buf[22] = self.client_data;
        buf[23] = self.instance;
        buf[24..28].copy_from_slice(&self.seq_no.to_le_bytes());
        buf[28..32].copy_from_slice(&self.key.to_le_bytes());
        buf
    }

    /// Decodes a header from the first [`HEADER_LEN`] bytes of `buf`.
    ///
    /// The checksum is carried over as-is and is not validated.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InsufficientData`] if `buf` is shorter than 32 bytes.
    /// - [`ProtocolError::BadSignature`] if the signature does not match.
    /// - [`ProtocolError::UnknownDeviceType`] / [`ProtocolError::UnknownProtocol`]
    ///   for out-of-range enum bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }
        if buf[0..8] != IUSB_SIGNATURE {
            return Err(ProtocolError::BadSignature);
        }
        Ok(Self {
            major: buf[8],
            minor: buf[9],
            header_len: buf[10],
            checksum: buf[CHECKSUM_OFFSET],
            data_packet_len: read_u32_le(buf, 12),
            server_caps: buf[16],
            device_type: DeviceType::try_from(buf[17])?,
            protocol: HidProtocol::try_from(buf[18])?,
            direction: Direction::from(buf[19]),
            device_no: buf[20],
            interface_no: buf[21],
            client_data: buf[22],
            instance: buf[23],
            seq_no: read_u32_le(buf, 24),
            key: read_u32_le(buf, 28),
        })
    }
}

// ── Checksum helpers ──────────────────────────────────────────────────────────

/// Returns the wrapping byte sum of `bytes`.
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Computes the checksum for an encoded header, treating the checksum slot
/// as zero regardless of its current content.
///
/// The result is `(256 - sum) mod 256`.
pub fn header_checksum(header: &[u8; HEADER_LEN]) -> u8 {
    let sum = byte_sum(header).wrapping_sub(header[CHECKSUM_OFFSET]);
    0u8.wrapping_sub(sum)
}

pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
