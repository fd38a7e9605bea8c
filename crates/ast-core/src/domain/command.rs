//! Commands handed from the capture producer to the display consumer.
//!
//! Commands travel in two independent categories, each with its own
//! single-slot mailbox:
//!
//! - the **draw** category carries frames ([`Command::Draw`]) and primary
//!   surface changes ([`Command::SurfaceLifecycle`]);
//! - the **cursor** category carries [`Command::CursorSet`],
//!   [`Command::CursorMove`] and [`Command::CursorHide`].
//!
//! A command is created by the producer, published once, taken once by the
//! consumer and released once.  Payloads are reference counted, so releasing
//! a command only drops this command's share of them.

use std::sync::Arc;

use super::capture::RawFrame;
use super::cursor::{CursorPosition, CursorShape};

/// Axis-aligned rectangle in surface coordinates; `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    /// A rectangle covering a whole `width` x `height` surface.
    pub fn covering(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Where a draw command's image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Freshly copied out of capture memory this tick.
    Captured,
    /// Re-served from the last-frame cache because the screen did not change.
    Cached,
}

/// Changes to the primary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCommand {
    /// Destroy the primary surface and recreate it at the new size.
    Resize { width: u32, height: u32 },
}

/// The closed set of commands the consumer may receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Draw {
        bbox: Rect,
        frame: RawFrame,
        source: ImageSource,
    },
    CursorSet {
        position: CursorPosition,
        shape: Arc<CursorShape>,
    },
    CursorMove {
        position: CursorPosition,
    },
    CursorHide,
    SurfaceLifecycle(SurfaceCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Draw { .. } => CommandKind::Draw,
            Command::CursorSet { .. } | Command::CursorMove { .. } | Command::CursorHide => {
                CommandKind::Cursor
            }
            Command::SurfaceLifecycle(_) => CommandKind::Surface,
        }
    }

    /// Which mailbox this command travels through.
    pub fn category(&self) -> CommandCategory {
        match self.kind() {
            CommandKind::Draw | CommandKind::Surface => CommandCategory::Draw,
            CommandKind::Cursor => CommandCategory::Cursor,
        }
    }

    /// Bytes of payload referenced by this command.
    pub fn payload_len(&self) -> usize {
        match self {
            Command::Draw { frame, .. } => frame.image().len(),
            Command::CursorSet { shape, .. } => shape.data_size(),
            Command::CursorMove { .. } | Command::CursorHide | Command::SurfaceLifecycle(_) => 0,
        }
    }
}

/// Wire-level command type codes used by the display protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandKind {
    Draw = 1,
    Cursor = 3,
    Surface = 5,
}

impl TryFrom<u8> for CommandKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CommandKind::Draw),
            3 => Ok(CommandKind::Cursor),
            5 => Ok(CommandKind::Surface),
            other => Err(other),
        }
    }
}

/// The two independent single-slot categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Draw,
    Cursor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::tests::capture_memory;

    #[test]
    fn test_categories_split_draw_and_cursor() {
        // Arrange
        let mem = capture_memory(800, 600, &[1, 2]);
        let frame = RawFrame::from_capture_memory(&mem, 2).expect("frame");
        let draw = Command::Draw {
            bbox: Rect::covering(800, 600),
            frame,
            source: ImageSource::Captured,
        };
        let resize = Command::SurfaceLifecycle(SurfaceCommand::Resize {
            width: 1024,
            height: 768,
        });

        // Act / Assert
        assert_eq!(draw.category(), CommandCategory::Draw);
        assert_eq!(resize.category(), CommandCategory::Draw);
        assert_eq!(resize.kind(), CommandKind::Surface);
        assert_eq!(Command::CursorHide.category(), CommandCategory::Cursor);
        assert_eq!(draw.payload_len(), 88 + 2);
    }

    #[test]
    fn test_command_kind_codes() {
        assert_eq!(CommandKind::try_from(1), Ok(CommandKind::Draw));
        assert_eq!(CommandKind::try_from(3), Ok(CommandKind::Cursor));
        assert_eq!(CommandKind::try_from(5), Ok(CommandKind::Surface));
        assert_eq!(CommandKind::try_from(2), Err(2));
    }

    #[test]
    fn test_rect_covering() {
        let rect = Rect::covering(1280, 1024);
        assert_eq!((rect.width(), rect.height()), (1280, 1024));
    }
}
