//! Hardware cursor patterns and their conversion to display cursor shapes.
//!
//! # Cursor info block (at capture offset `0x1000`)
//!
//! ```text
//!  0      type       0 mono, 1 color, 255 no cursor
//!  1..5   checksum   u32
//!  5..7   pos_x      u16
//!  7..9   pos_y      u16
//!  9..11  offset_x   u16 columns cropped from the left of the 64x64 pattern
//! 11..13  offset_y   u16 rows cropped from the top
//! 13..    pattern    64 * 64 u16 samples, row-major
//! ```
//!
//! The GetCursor control call reports how many bytes are valid.  Only the
//! first 13 bytes are present when the cursor merely moved; the full block
//! is present when the shape changed.
//!
//! # Sample formats (for beginners)
//!
//! Each 16-bit sample packs four 4-bit channels `AAAA RRRR GGGG BBBB`.
//!
//! - **Color** cursors expand every 4-bit channel to 8 bits by repeating the
//!   nibble (`0x8` becomes `0x88`), producing BGRA8888 pixels.
//! - **Mono** cursors only look at the two top bits.  When both are clear the
//!   pixel is opaque and its low bits toggle the XOR mask; when bit 14 is set
//!   the XOR mask bit is cleared according to the sample.  Both cases set the
//!   AND mask bit.  A sample with only bit 15 set is transparent and leaves
//!   both masks clear.
//!
//! The consumer expects 128 spare bytes after the pixel data; every shape
//! buffer is allocated with that trailer.

use super::capture::{read_u16, read_u32, require_len, CaptureLayoutError};

/// Edge length of the square hardware cursor pattern.
pub const CURSOR_DIM: usize = 64;

/// Number of samples in a pattern.
pub const CURSOR_SAMPLES: usize = CURSOR_DIM * CURSOR_DIM;

/// Size of the info prefix preceding the pattern.
pub const CURSOR_INFO_PREFIX_LEN: usize = 13;

/// Size of the full info block.
pub const CURSOR_INFO_LEN: usize = CURSOR_INFO_PREFIX_LEN + CURSOR_SAMPLES * 2;

/// Spare bytes the consumer expects after the shape data.
pub const CURSOR_TRAILER_LEN: usize = 128;

const MONO_TRANSPARENT_BITS: u16 = 0xC000;
const MONO_INVERT_BIT: u16 = 0x4000;

/// Cursor type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorType {
    Mono,
    Color,
    /// The engine reports that no cursor is shown.
    Hidden,
    /// Any other value; treated like [`CursorType::Hidden`].
    Unknown(u8),
}

impl CursorType {
    pub const HIDDEN_RAW: u8 = 255;

    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => CursorType::Mono,
            1 => CursorType::Color,
            Self::HIDDEN_RAW => CursorType::Hidden,
            other => CursorType::Unknown(other),
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, CursorType::Mono | CursorType::Color)
    }
}

/// Cursor position in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

/// The 13-byte prefix of the cursor info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorInfo {
    pub kind: CursorType,
    pub checksum: u32,
    pub position: CursorPosition,
    pub offset_x: u16,
    pub offset_y: u16,
}

impl CursorInfo {
    pub fn parse(buf: &[u8]) -> Result<Self, CaptureLayoutError> {
        require_len(buf, CURSOR_INFO_PREFIX_LEN)?;
        Ok(Self {
            kind: CursorType::from_raw(buf[0]),
            checksum: read_u32(buf, 1),
            position: CursorPosition {
                x: read_u16(buf, 5),
                y: read_u16(buf, 7),
            },
            offset_x: read_u16(buf, 9),
            offset_y: read_u16(buf, 11),
        })
    }

    /// Visible width: `64 - offset_x`, never negative.
    pub fn width(&self) -> usize {
        CURSOR_DIM.saturating_sub(self.offset_x as usize)
    }

    /// Visible height: `64 - offset_y`, never negative.
    pub fn height(&self) -> usize {
        CURSOR_DIM.saturating_sub(self.offset_y as usize)
    }
}

/// A full cursor pattern: info prefix plus the 64x64 samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPattern {
    pub info: CursorInfo,
    samples: Box<[u16]>,
}

impl CursorPattern {
    /// Parses a full info block.
    ///
    /// # Errors
    ///
    /// [`CaptureLayoutError::Truncated`] if `buf` is shorter than
    /// [`CURSOR_INFO_LEN`].
    pub fn parse(buf: &[u8]) -> Result<Self, CaptureLayoutError> {
        require_len(buf, CURSOR_INFO_LEN)?;
        let info = CursorInfo::parse(buf)?;
        let samples = buf[CURSOR_INFO_PREFIX_LEN..CURSOR_INFO_LEN]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { info, samples })
    }

    /// Builds a pattern from samples, mainly for tests and tools.
    ///
    /// `samples` is truncated or zero-padded to [`CURSOR_SAMPLES`].
    pub fn from_samples(info: CursorInfo, samples: &[u16]) -> Self {
        let mut all = vec![0u16; CURSOR_SAMPLES];
        let n = samples.len().min(CURSOR_SAMPLES);
        all[..n].copy_from_slice(&samples[..n]);
        Self {
            info,
            samples: all.into_boxed_slice(),
        }
    }

    /// Sample at column `x`, row `y` of the uncropped 64x64 grid.
    pub fn sample(&self, x: usize, y: usize) -> u16 {
        self.samples[y * CURSOR_DIM + x]
    }
}

// ── Shape ─────────────────────────────────────────────────────────────────────

/// Pixel format of a [`CursorShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeFormat {
    /// `[AND mask | XOR mask]`, 1 bit per pixel, rows padded to whole bytes.
    Mono,
    /// BGRA8888, row-major.
    Alpha,
}

/// A cursor shape ready for the display consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorShape {
    pub format: ShapeFormat,
    pub width: u16,
    pub height: u16,
    pub hot_spot_x: u16,
    pub hot_spot_y: u16,
    /// Pixel data followed by [`CURSOR_TRAILER_LEN`] spare bytes.
    data: Vec<u8>,
}

impl CursorShape {
    /// A zero-filled full-size alpha shape, used while no cursor is shown.
    pub fn blank() -> Self {
        Self {
            format: ShapeFormat::Alpha,
            width: CURSOR_DIM as u16,
            height: CURSOR_DIM as u16,
            hot_spot_x: 0,
            hot_spot_y: 0,
            data: vec![0u8; CURSOR_SAMPLES * 4 + CURSOR_TRAILER_LEN],
        }
    }

    /// Entire buffer including the trailer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Buffer size announced to the consumer.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Bytes per mask row for mono shapes.
    pub fn mask_stride(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    /// AND mask of a mono shape; empty for alpha shapes.
    pub fn and_mask(&self) -> &[u8] {
        match self.format {
            ShapeFormat::Mono => &self.data[..self.mask_len()],
            ShapeFormat::Alpha => &[],
        }
    }

    /// XOR mask of a mono shape; empty for alpha shapes.
    pub fn xor_mask(&self) -> &[u8] {
        match self.format {
            ShapeFormat::Mono => {
                let len = self.mask_len();
                &self.data[len..2 * len]
            }
            ShapeFormat::Alpha => &[],
        }
    }

    /// BGRA pixel at `(x, y)` of an alpha shape.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if self.format != ShapeFormat::Alpha || x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        let i = (y * self.width as usize + x) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    fn mask_len(&self) -> usize {
        self.mask_stride() * self.height as usize
    }
}

// ── Transcoder ────────────────────────────────────────────────────────────────

/// Converts hardware cursor patterns into display cursor shapes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CursorTranscoder;

impl CursorTranscoder {
    /// Transcodes `pattern` by its type.
    ///
    /// Hidden and unknown types yield [`CursorShape::blank`]; the caller is
    /// expected to emit a hide command for them instead of a shape.
    pub fn transcode(pattern: &CursorPattern) -> CursorShape {
        match pattern.info.kind {
            CursorType::Color => Self::transcode_color(pattern),
            CursorType::Mono => Self::transcode_mono(pattern),
            CursorType::Hidden | CursorType::Unknown(_) => CursorShape::blank(),
        }
    }

    fn transcode_color(pattern: &CursorPattern) -> CursorShape {
        let width = pattern.info.width();
        let height = pattern.info.height();
        let (ox, oy) = (pattern.info.offset_x as usize, pattern.info.offset_y as usize);
        let mut data = vec![0u8; width * height * 4 + CURSOR_TRAILER_LEN];

        for y in 0..height {
            for x in 0..width {
                let d = pattern.sample(ox + x, oy + y);
                let i = (y * width + x) * 4;
                data[i] = expand_nibble(d);
                data[i + 1] = expand_nibble(d >> 4);
                data[i + 2] = expand_nibble(d >> 8);
                data[i + 3] = expand_nibble(d >> 12);
            }
        }

        CursorShape {
            format: ShapeFormat::Alpha,
            width: width as u16,
            height: height as u16,
            hot_spot_x: 0,
            hot_spot_y: 0,
            data,
        }
    }

    fn transcode_mono(pattern: &CursorPattern) -> CursorShape {
        let width = pattern.info.width();
        let height = pattern.info.height();
        let (ox, oy) = (pattern.info.offset_x as usize, pattern.info.offset_y as usize);
        let stride = (width + 7) / 8;
        let mask_len = stride * height;
        let mut data = vec![0u8; 2 * mask_len + CURSOR_TRAILER_LEN];

        {
            let (and_mask, rest) = data.split_at_mut(mask_len);
            let xor_mask = &mut rest[..mask_len];

            for y in 0..height {
                for x in 0..width {
                    let d = pattern.sample(ox + x, oy + y);
                    let bit: u16 = 1 << (7 - (x % 8));
                    let idx = y * stride + x / 8;

                    if d & MONO_TRANSPARENT_BITS == 0 {
                        xor_mask[idx] ^= (d & bit) as u8;
                        and_mask[idx] |= bit as u8;
                    }
                    if d & MONO_INVERT_BIT != 0 {
                        xor_mask[idx] &= !((d ^ bit) as u8);
                        and_mask[idx] |= bit as u8;
                    }
                }
            }
        }

        CursorShape {
            format: ShapeFormat::Mono,
            width: width as u16,
            height: height as u16,
            hot_spot_x: 0,
            hot_spot_y: 0,
            data,
        }
    }
}

/// `0xN` becomes `0xNN`.
fn expand_nibble(value: u16) -> u8 {
    let v = (value & 0xF) as u8;
    v | (v << 4)
}
