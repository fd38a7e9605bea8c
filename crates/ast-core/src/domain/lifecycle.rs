//! Reclaiming commands once the consumer is done with them.
//!
//! The consumer hands every command it took back through
//! [`ReleaseLifecycleManager::release`].  Releasing consumes the command, so
//! its payload shares are dropped exactly once and it cannot be read
//! afterwards.  The slot the command came from is then returned to Empty so
//! the producer may publish again.

use std::sync::Arc;

use tracing::{debug, warn};

use super::command::{Command, CommandKind};
use super::mailbox::{CommandMailbox, SlotState};

/// What a single release did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub kind: CommandKind,
    /// Payload bytes whose share was dropped by this release.
    pub reclaimed_bytes: usize,
    /// Whether the command's slot went from Taken back to Empty.
    pub slot_freed: bool,
}

/// Frees released commands and reopens their mailbox slot.
#[derive(Debug, Clone)]
pub struct ReleaseLifecycleManager {
    draw: Arc<CommandMailbox<Command>>,
    cursor: Arc<CommandMailbox<Command>>,
}

impl ReleaseLifecycleManager {
    pub fn new(draw: Arc<CommandMailbox<Command>>, cursor: Arc<CommandMailbox<Command>>) -> Self {
        Self { draw, cursor }
    }

    /// Releases `command`.
    ///
    /// The match below is exhaustive over the closed command set; adding a
    /// variant without a release rule does not compile.
    pub fn release(&self, command: Command) -> ReleaseOutcome {
        let kind = command.kind();
        let reclaimed_bytes = command.payload_len();

        let mailbox = match &command {
            // Frame image share and envelope; the draw slot reopens.
            Command::Draw { .. } => &self.draw,
            // Envelope only.
            Command::SurfaceLifecycle(_) => &self.draw,
            // Shape share and envelope.
            Command::CursorSet { .. } => &self.cursor,
            Command::CursorMove { .. } | Command::CursorHide => &self.cursor,
        };
        drop(command);

        let slot_freed = mailbox.mark_released();
        if slot_freed {
            debug!(?kind, reclaimed_bytes, "command released");
        } else {
            warn!(
                ?kind,
                state = ?mailbox.state(),
                "released a command whose slot was not taken"
            );
        }

        ReleaseOutcome {
            kind,
            reclaimed_bytes,
            slot_freed,
        }
    }

    pub fn draw_slot(&self) -> SlotState {
        self.draw.state()
    }

    pub fn cursor_slot(&self) -> SlotState {
        self.cursor.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::tests::capture_memory;
    use crate::domain::capture::RawFrame;
    use crate::domain::command::{ImageSource, Rect, SurfaceCommand};
    use crate::domain::cursor::{CursorPosition, CursorShape};

    fn manager() -> (
        ReleaseLifecycleManager,
        Arc<CommandMailbox<Command>>,
        Arc<CommandMailbox<Command>>,
    ) {
        let draw = Arc::new(CommandMailbox::new());
        let cursor = Arc::new(CommandMailbox::new());
        let manager = ReleaseLifecycleManager::new(Arc::clone(&draw), Arc::clone(&cursor));
        (manager, draw, cursor)
    }

    #[test]
    fn test_release_draw_frees_image_and_reopens_draw_slot() {
        // Arrange
        let (manager, draw, _) = manager();
        let mem = capture_memory(800, 600, &[1, 2, 3]);
        let frame = RawFrame::from_capture_memory(&mem, 3).expect("frame");
        let cached = frame.clone();
        draw.try_publish(Command::Draw {
            bbox: Rect::covering(800, 600),
            frame,
            source: ImageSource::Captured,
        })
        .expect("publish");
        let taken = draw.try_take().expect("take");

        // Act
        let outcome = manager.release(taken);

        // Assert
        assert_eq!(outcome.kind, CommandKind::Draw);
        assert_eq!(outcome.reclaimed_bytes, 88 + 3);
        assert!(outcome.slot_freed);
        assert_eq!(manager.draw_slot(), SlotState::Empty);
        assert_eq!(cached.share_count(), 1);
    }

    #[test]
    fn test_release_surface_reopens_draw_slot() {
        // Arrange
        let (manager, draw, cursor) = manager();
        draw.try_publish(Command::SurfaceLifecycle(SurfaceCommand::Resize {
            width: 1024,
            height: 768,
        }))
        .expect("publish");
        cursor.try_publish(Command::CursorHide).expect("publish");
        let taken = draw.try_take().expect("take");

        // Act
        let outcome = manager.release(taken);

        // Assert
        assert_eq!(outcome.kind, CommandKind::Surface);
        assert_eq!(outcome.reclaimed_bytes, 0);
        assert!(outcome.slot_freed);
        assert_eq!(manager.cursor_slot(), SlotState::Pending);
    }

    #[test]
    fn test_release_cursor_set_drops_shape_share() {
        // Arrange
        let (manager, _, cursor) = manager();
        let shape = Arc::new(CursorShape::blank());
        cursor
            .try_publish(Command::CursorSet {
                position: CursorPosition { x: 1, y: 2 },
                shape: Arc::clone(&shape),
            })
            .expect("publish");
        let taken = cursor.try_take().expect("take");

        // Act
        let outcome = manager.release(taken);

        // Assert
        assert_eq!(outcome.kind, CommandKind::Cursor);
        assert_eq!(outcome.reclaimed_bytes, shape.data_size());
        assert_eq!(Arc::strong_count(&shape), 1);
        assert_eq!(manager.cursor_slot(), SlotState::Empty);
    }

    #[test]
    fn test_release_without_take_does_not_free_slot() {
        // Arrange
        let (manager, _, cursor) = manager();
        cursor
            .try_publish(Command::CursorMove {
                position: CursorPosition::default(),
            })
            .expect("publish");

        // Act
        let outcome = manager.release(Command::CursorHide);

        // Assert
        assert!(!outcome.slot_freed);
        assert_eq!(manager.cursor_slot(), SlotState::Pending);
    }
}
