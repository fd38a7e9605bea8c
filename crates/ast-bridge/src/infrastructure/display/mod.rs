//! Display-protocol runtime boundary.
//!
//! The runtime that serves remote viewers pulls commands through a
//! [`DisplayHandle`](crate::application::display_session::DisplayHandle).
//! The only call the bridge makes the other way is [`DisplayRuntime::wake_up`],
//! telling a runtime that asked for notification that a command is ready.
//!
//! Without a runtime attached, [`headless::HeadlessConsumer`] stands in for
//! one: it drains and releases every command so capture keeps cycling.

use tracing::trace;

pub mod headless;

/// Outbound calls into the display-protocol runtime.
pub trait DisplayRuntime: Send + Sync {
    /// A command is ready to be polled.
    fn wake_up(&self);
}

/// Runtime that only records wake-ups in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRuntime;

impl DisplayRuntime for LoggingRuntime {
    fn wake_up(&self) {
        trace!("display runtime woken up");
    }
}
