//! Layout of the capture engine's shared memory and the frame header it writes.
//!
//! # Memory map
//!
//! ```text
//! 0x000000  FrameHeader (86 bytes, packed, little-endian)
//! 0x001000  Cursor info block (see crate::domain::cursor)
//! 0x004000  Compressed frame payload
//! 0x404000  end of mapping
//! ```
//!
//! The driver writes this memory while we read it.  Every read taken here is
//! a plain copy and may be torn if the driver is mid-update; nothing in this
//! module detects that.

use std::sync::Arc;

use thiserror::Error;

/// Size of the read-only capture mapping.
pub const CAPTURE_MMAP_SIZE: usize = 0x40_4000;

/// Encoded size of [`FrameHeader`].
pub const FRAME_HEADER_LEN: usize = 86;

/// Size of the header area copied in front of the payload in a frame image;
/// the header is followed by two bytes of padding.
pub const FRAME_IMAGE_PREFIX_LEN: usize = 88;

/// Offset of the cursor info block.
pub const CURSOR_INFO_OFFSET: usize = 0x1000;

/// Offset of the compressed payload.
pub const FRAME_PAYLOAD_OFFSET: usize = 0x4000;

/// Raised when a buffer is too short for the layout it is parsed as.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureLayoutError {
    #[error("capture data truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
}

pub(crate) fn require_len(buf: &[u8], needed: usize) -> Result<(), CaptureLayoutError> {
    if buf.len() < needed {
        Err(CaptureLayoutError::Truncated {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn read_i16(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    read_u32(buf, offset) as i32
}

// ── Frame header ──────────────────────────────────────────────────────────────

/// A video mode as reported by the capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoMode {
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub rate: u16,
    pub index: u8,
}

impl VideoMode {
    fn parse(buf: &[u8], offset: usize) -> Self {
        Self {
            width: read_u16(buf, offset),
            height: read_u16(buf, offset + 2),
            depth: read_u16(buf, offset + 4),
            rate: read_u16(buf, offset + 6),
            index: buf[offset + 8],
        }
    }

    /// A zero width or height means the engine sees no input signal.
    pub fn has_signal(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

/// Compression settings used for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionInfo {
    pub mode: u8,
    pub jpeg_scale: u8,
    pub jpeg_table: u8,
    pub jpeg_yuv: u8,
    pub sharp_mode: u8,
    pub advance_table: u8,
    pub advance_scale: u8,
    pub macroblock_count: i32,
    pub rc4_enabled: bool,
    pub rc4_reset: bool,
    pub mode_420: bool,
}

/// Decoded capture frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub version: u16,
    pub header_len: u16,
    pub source_mode: VideoMode,
    pub destination_mode: VideoMode,
    pub frame_start: i32,
    pub frame_number: i32,
    pub vertical_size: u16,
    pub horizontal_size: u16,
    pub compression: CompressionInfo,
    pub compressed_frame_size: i32,
    /// Size of the compressed payload at [`FRAME_PAYLOAD_OFFSET`].
    pub compressed_size: i32,
    pub input_signal: bool,
    /// Hardware cursor position at capture time.
    pub cursor_x: i16,
    pub cursor_y: i16,
}

impl FrameHeader {
    /// Parses the header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`CaptureLayoutError::Truncated`] if `buf` is shorter than
    /// [`FRAME_HEADER_LEN`].
    pub fn parse(buf: &[u8]) -> Result<Self, CaptureLayoutError> {
        require_len(buf, FRAME_HEADER_LEN)?;
        Ok(Self {
            version: read_u16(buf, 0),
            header_len: read_u16(buf, 2),
            source_mode: VideoMode::parse(buf, 4),
            destination_mode: VideoMode::parse(buf, 13),
            frame_start: read_i32(buf, 22),
            frame_number: read_i32(buf, 26),
            vertical_size: read_u16(buf, 30),
            horizontal_size: read_u16(buf, 32),
            // 34..42 reserved
            compression: CompressionInfo {
                mode: buf[42],
                jpeg_scale: buf[43],
                jpeg_table: buf[44],
                jpeg_yuv: buf[45],
                sharp_mode: buf[46],
                advance_table: buf[47],
                advance_scale: buf[48],
                macroblock_count: read_i32(buf, 49),
                rc4_enabled: buf[53] != 0,
                rc4_reset: buf[54] != 0,
                mode_420: buf[55] != 0,
            },
            // 56..65 engine tuning, 73..81 debug counters
            compressed_frame_size: read_i32(buf, 65),
            compressed_size: read_i32(buf, 69),
            input_signal: buf[81] != 0,
            cursor_x: read_i16(buf, 82),
            cursor_y: read_i16(buf, 84),
        })
    }

    /// Source resolution `(width, height)`.
    pub fn resolution(&self) -> (u16, u16) {
        (self.source_mode.width, self.source_mode.height)
    }
}

// ── Raw frame ─────────────────────────────────────────────────────────────────

/// One captured frame: the parsed header plus the image blob handed to the
/// display consumer.
///
/// The image blob is the 88-byte header area followed by the compressed
/// payload.  It is reference counted so the last frame can be kept in a cache
/// while a copy travels to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    header: FrameHeader,
    image: Arc<[u8]>,
}

impl RawFrame {
    /// Copies a frame out of capture memory.
    ///
    /// `payload_len` is the size reported by the GetVideo control call.
    ///
    /// # Errors
    ///
    /// [`CaptureLayoutError::Truncated`] if the mapping does not contain the
    /// header or `payload_len` bytes at [`FRAME_PAYLOAD_OFFSET`].
    pub fn from_capture_memory(memory: &[u8], payload_len: usize) -> Result<Self, CaptureLayoutError> {
        let header = FrameHeader::parse(memory)?;
        require_len(memory, FRAME_PAYLOAD_OFFSET + payload_len)?;

        let mut image = Vec::with_capacity(FRAME_IMAGE_PREFIX_LEN + payload_len);
        image.extend_from_slice(&memory[..FRAME_IMAGE_PREFIX_LEN]);
        image.extend_from_slice(&memory[FRAME_PAYLOAD_OFFSET..FRAME_PAYLOAD_OFFSET + payload_len]);
        Ok(Self {
            header,
            image: image.into(),
        })
    }

    /// Rebuilds a frame from a previously produced image blob.
    pub fn from_image(image: Vec<u8>) -> Result<Self, CaptureLayoutError> {
        require_len(&image, FRAME_IMAGE_PREFIX_LEN)?;
        let header = FrameHeader::parse(&image)?;
        Ok(Self {
            header,
            image: image.into(),
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// The full image blob: header area plus payload.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Compressed payload without the header area.
    pub fn payload(&self) -> &[u8] {
        &self.image[FRAME_IMAGE_PREFIX_LEN..]
    }

    /// Number of owners currently sharing the image blob.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.image)
    }
}
