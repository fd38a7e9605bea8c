//! Draining consumer used when no display-protocol server is attached.
//!
//! Every poll takes whatever is pending in both slots and releases it right
//! away, logging what went past.  It registers itself as one attached client
//! so the cursor path runs too.

use ast_core::domain::{Command, ImageSource, SurfaceCommand};
use tracing::debug;

use crate::application::display_session::DisplayHandle;

/// Counters of everything drained so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainStats {
    pub frames: u64,
    pub cached_frames: u64,
    pub resizes: u64,
    pub cursor_commands: u64,
    pub released_bytes: u64,
}

#[derive(Debug)]
pub struct HeadlessConsumer {
    handle: DisplayHandle,
    stats: DrainStats,
}

impl HeadlessConsumer {
    /// Attaches to the session as a client.
    pub fn attach(handle: DisplayHandle) -> Self {
        handle.on_client_presence_changed(true);
        Self {
            handle,
            stats: DrainStats::default(),
        }
    }

    /// Takes and releases the pending draw and cursor commands.  Returns the
    /// number of commands drained.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        let pending = [self.handle.poll_command(), self.handle.poll_cursor_command()];
        for command in pending.into_iter().flatten() {
            self.record(&command);
            let outcome = self.handle.on_command_released(command);
            self.stats.released_bytes += outcome.reclaimed_bytes as u64;
            drained += 1;
        }
        drained
    }

    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Detaches from the session.
    pub fn detach(self) -> DrainStats {
        self.handle.on_client_presence_changed(false);
        self.stats
    }

    fn record(&mut self, command: &Command) {
        match command {
            Command::Draw { bbox, frame, source } => {
                self.stats.frames += 1;
                if *source == ImageSource::Cached {
                    self.stats.cached_frames += 1;
                }
                debug!(
                    width = bbox.width(),
                    height = bbox.height(),
                    bytes = frame.image().len(),
                    ?source,
                    "draw"
                );
            }
            Command::SurfaceLifecycle(SurfaceCommand::Resize { width, height }) => {
                self.stats.resizes += 1;
                debug!(width, height, "primary surface resized");
            }
            Command::CursorSet { position, shape } => {
                self.stats.cursor_commands += 1;
                debug!(x = position.x, y = position.y, format = ?shape.format, "cursor set");
            }
            Command::CursorMove { position } => {
                self.stats.cursor_commands += 1;
                debug!(x = position.x, y = position.y, "cursor move");
            }
            Command::CursorHide => {
                self.stats.cursor_commands += 1;
                debug!("cursor hide");
            }
        }
    }
}
