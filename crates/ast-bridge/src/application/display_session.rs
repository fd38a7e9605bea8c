//! Display session: the producer side of the command hand-off and the
//! consumer-facing contract of the display protocol.
//!
//! # Two halves (for beginners)
//!
//! A display-protocol runtime polls for commands on its own schedule, maybe
//! from another thread.  The capture side runs on a periodic tick.  The two
//! only meet in a pair of single-slot mailboxes, one for draw commands and
//! one for cursor commands.
//!
//! - [`DisplaySession`] is the producer.  It owns the frame source, the frame
//!   cache and the cursor state, and [`DisplaySession::tick`] is the only
//!   place commands are published.  It needs `&mut self`, so exactly one
//!   task drives it.
//! - [`DisplayHandle`] is the consumer's view: poll, release, presence and
//!   notification calls.  It is `Clone + Send + Sync` and only touches the
//!   mailboxes and a few atomics.
//!
//! ```text
//!   tick() ──publish──▶ [draw slot] ──poll_command──────────▶ runtime
//!          ──publish──▶ [cursor slot] ──poll_cursor_command──▶ runtime
//!                                     ◀──on_command_released──
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use ast_core::domain::{
    Command, CommandMailbox, CursorPosition, CursorTranscoder, CursorType, ImageSource, RawFrame,
    Rect, ReleaseLifecycleManager, ReleaseOutcome, SlotState, SurfaceCommand,
};
use tracing::{debug, info, warn};

use super::frame_cache::FrameCache;
use super::frame_source::{CursorPoll, FramePoll, FrameSource};
use crate::infrastructure::capture::CaptureError;
use crate::infrastructure::display::DisplayRuntime;

/// Producer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Re-serve the cached frame when the screen has not changed.
    pub resend_cached_frame: bool,
    /// Surface size used while the engine reports no signal.
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            resend_cached_frame: true,
            default_width: 800,
            default_height: 600,
        }
    }
}

/// What one [`DisplaySession::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Capture was restarted for a newly attached client.
    pub restarted: bool,
    /// A command was placed in the draw slot.
    pub draw_published: bool,
    /// The draw slot was still occupied, so no frame was polled.
    pub draw_busy: bool,
    /// A command was placed in the cursor slot.
    pub cursor_published: bool,
    /// The runtime was woken up.
    pub woke_runtime: bool,
}

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionShared {
    draw: Arc<CommandMailbox<Command>>,
    cursor: Arc<CommandMailbox<Command>>,
    lifecycle: ReleaseLifecycleManager,
    presence: AtomicU32,
    capture_started: AtomicBool,
    restart_pending: AtomicBool,
    notify_requested: AtomicBool,
}

impl SessionShared {
    fn new() -> Self {
        let draw = Arc::new(CommandMailbox::new());
        let cursor = Arc::new(CommandMailbox::new());
        Self {
            lifecycle: ReleaseLifecycleManager::new(Arc::clone(&draw), Arc::clone(&cursor)),
            draw,
            cursor,
            presence: AtomicU32::new(0),
            capture_started: AtomicBool::new(false),
            restart_pending: AtomicBool::new(false),
            notify_requested: AtomicBool::new(false),
        }
    }
}

// ── Consumer handle ───────────────────────────────────────────────────────────

/// The calls a display-protocol runtime makes into the session.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    shared: Arc<SessionShared>,
}

impl DisplayHandle {
    /// Takes the pending draw command, if any.
    pub fn poll_command(&self) -> Option<Command> {
        self.shared.draw.try_take()
    }

    /// Takes the pending cursor command.  Always `None` while no client is
    /// attached.
    pub fn poll_cursor_command(&self) -> Option<Command> {
        if self.shared.presence.load(Ordering::Acquire) == 0 {
            return None;
        }
        self.shared.cursor.try_take()
    }

    /// Hands a taken command back once the runtime is done with its memory.
    pub fn on_command_released(&self, command: Command) -> ReleaseOutcome {
        self.shared.lifecycle.release(command)
    }

    /// A client attached (`true`) or detached (`false`).
    ///
    /// Attaching while capture runs schedules a capture restart on the next
    /// tick, so the new client receives a full frame.
    pub fn on_client_presence_changed(&self, present: bool) {
        if present {
            let count = self.shared.presence.fetch_add(1, Ordering::AcqRel) + 1;
            if self.shared.capture_started.load(Ordering::Acquire) {
                self.shared.restart_pending.store(true, Ordering::Release);
            }
            info!(clients = count, "client attached");
        } else {
            let previous = self
                .shared
                .presence
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            match previous {
                Ok(n) => info!(clients = n - 1, "client detached"),
                Err(_) => warn!("client detached with no client attached"),
            }
        }
    }

    /// Asks to be woken up when a command becomes available.
    ///
    /// Returns `false` when a command is already pending, in which case the
    /// runtime should poll again instead of waiting.
    pub fn request_notification(&self) -> bool {
        if self.shared.draw.state() == SlotState::Pending
            || self.shared.cursor.state() == SlotState::Pending
        {
            return false;
        }
        self.shared.notify_requested.store(true, Ordering::Release);
        true
    }

    pub fn client_count(&self) -> u32 {
        self.shared.presence.load(Ordering::Acquire)
    }

    pub fn draw_slot(&self) -> SlotState {
        self.shared.draw.state()
    }

    pub fn cursor_slot(&self) -> SlotState {
        self.shared.cursor.state()
    }
}

// ── Producer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CursorState {
    visible: bool,
    /// A cursor command has been produced since the session was created.
    announced: bool,
    position: CursorPosition,
}

/// Producer side of the display session.
pub struct DisplaySession {
    source: FrameSource,
    cache: FrameCache,
    runtime: Arc<dyn DisplayRuntime>,
    options: SessionOptions,
    shared: Arc<SessionShared>,
    surface: (u32, u32),
    deferred: Option<RawFrame>,
    cursor: CursorState,
}

impl DisplaySession {
    pub fn new(
        source: FrameSource,
        cache: FrameCache,
        runtime: Arc<dyn DisplayRuntime>,
        options: SessionOptions,
    ) -> Self {
        Self {
            source,
            cache,
            runtime,
            surface: (options.default_width, options.default_height),
            options,
            shared: Arc::new(SessionShared::new()),
            deferred: None,
            cursor: CursorState::default(),
        }
    }

    /// A handle for the display-protocol runtime.
    pub fn handle(&self) -> DisplayHandle {
        DisplayHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Resets and starts the capture engine.
    ///
    /// # Errors
    ///
    /// Returns the [`CaptureError`] of the failing control call.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.source.start()?;
        self.shared.capture_started.store(true, Ordering::Release);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.shared.capture_started.store(false, Ordering::Release);
        self.source.stop();
    }

    /// Current primary surface size.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor.visible
    }

    /// One producer step: restart capture if a client attached, fill the
    /// draw slot if it is free, fill the cursor slot if a client is present,
    /// then wake the runtime if it asked for it.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.shared.restart_pending.swap(false, Ordering::AcqRel) {
            self.source.restart();
            report.restarted = true;
        }

        if self.shared.draw.is_empty() {
            if let Some(command) = self.next_draw_command() {
                report.draw_published = self.publish(&self.shared.draw, command);
            }
        } else {
            debug!(state = ?self.shared.draw.state(), "draw slot busy, deferring capture");
            report.draw_busy = true;
        }

        if self.shared.presence.load(Ordering::Acquire) > 0 && self.shared.cursor.is_empty() {
            if let Some(command) = self.next_cursor_command() {
                report.cursor_published = self.publish(&self.shared.cursor, command);
            }
        }

        if (report.draw_published || report.cursor_published)
            && self.shared.notify_requested.swap(false, Ordering::AcqRel)
        {
            self.runtime.wake_up();
            report.woke_runtime = true;
        }
        report
    }

    fn publish(&self, mailbox: &CommandMailbox<Command>, command: Command) -> bool {
        match mailbox.try_publish(command) {
            Ok(()) => true,
            Err(command) => {
                debug!(kind = ?command.kind(), "slot taken concurrently, command dropped");
                false
            }
        }
    }

    fn next_draw_command(&mut self) -> Option<Command> {
        if let Some(frame) = self.deferred.take() {
            return Some(self.draw(frame, ImageSource::Captured));
        }

        match self.source.poll_frame() {
            FramePoll::Changed(frame) => {
                self.cache.store(&frame);
                let target = self.target_size(&frame);
                if target != self.surface {
                    info!(
                        from = ?self.surface,
                        to = ?target,
                        "resolution changed, resizing primary surface"
                    );
                    self.surface = target;
                    self.deferred = Some(frame);
                    return Some(Command::SurfaceLifecycle(SurfaceCommand::Resize {
                        width: target.0,
                        height: target.1,
                    }));
                }
                Some(self.draw(frame, ImageSource::Captured))
            }
            FramePoll::NoChange if self.options.resend_cached_frame => {
                let frame = self.cache.last()?.clone();
                Some(self.draw(frame, ImageSource::Cached))
            }
            FramePoll::NoChange | FramePoll::Blank | FramePoll::Failed => None,
        }
    }

    fn draw(&self, frame: RawFrame, source: ImageSource) -> Command {
        Command::Draw {
            bbox: Rect::covering(self.surface.0, self.surface.1),
            frame,
            source,
        }
    }

    fn target_size(&self, frame: &RawFrame) -> (u32, u32) {
        let mode = frame.header().source_mode;
        if mode.has_signal() {
            (u32::from(mode.width), u32::from(mode.height))
        } else {
            debug!("no signal, keeping default surface size");
            (self.options.default_width, self.options.default_height)
        }
    }

    fn next_cursor_command(&mut self) -> Option<Command> {
        match self.source.poll_cursor() {
            CursorPoll::Shape(pattern) => {
                let kind = pattern.info.kind;
                if !kind.is_visible() {
                    if let CursorType::Unknown(raw) = kind {
                        warn!(raw, "unknown cursor type, hiding cursor");
                    }
                    return self.hide_cursor();
                }
                let shape = CursorTranscoder::transcode(&pattern);
                let position = pattern.info.position;
                if !self.cursor.visible {
                    info!("cursor shown");
                }
                self.cursor = CursorState {
                    visible: true,
                    announced: true,
                    position,
                };
                Some(Command::CursorSet {
                    position,
                    shape: Arc::new(shape),
                })
            }
            CursorPoll::Position(info) => {
                if !self.cursor.visible || info.position == self.cursor.position {
                    return None;
                }
                self.cursor.position = info.position;
                Some(Command::CursorMove {
                    position: info.position,
                })
            }
            CursorPoll::Hidden => self.hide_cursor(),
            CursorPoll::Idle | CursorPoll::Failed => None,
        }
    }

    /// The first hide is always sent, so the consumer starts from a known
    /// state even when the engine never reports a cursor.
    fn hide_cursor(&mut self) -> Option<Command> {
        if self.cursor.announced && !self.cursor.visible {
            return None;
        }
        self.cursor.visible = false;
        self.cursor.announced = true;
        info!("cursor hidden");
        Some(Command::CursorHide)
    }
}

impl std::fmt::Debug for DisplaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplaySession")
            .field("source", &self.source)
            .field("surface", &self.surface)
            .field("deferred", &self.deferred.is_some())
            .field("cursor_visible", &self.cursor.visible)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::application::frame_source::tests::{cursor_reply, source, video_reply};
    use crate::infrastructure::capture::mock::{CaptureScript, MockReply};
    use crate::infrastructure::capture::{CaptureOpcode, CaptureStatus};

    #[derive(Debug, Default)]
    struct CountingRuntime {
        wakeups: AtomicUsize,
    }

    impl DisplayRuntime for CountingRuntime {
        fn wake_up(&self) {
            self.wakeups.fetch_add(1, Ordering::SeqCst);
        }
    }

    type Fixture = (
        DisplaySession,
        DisplayHandle,
        CaptureScript,
        Arc<CountingRuntime>,
    );

    fn session(options: SessionOptions) -> Fixture {
        let (source, script) = source();
        let runtime = Arc::new(CountingRuntime::default());
        let mut session =
            DisplaySession::new(source, FrameCache::new(None), runtime.clone(), options);
        session.start().expect("start");
        script.clear_calls();
        let handle = session.handle();
        (session, handle, script, runtime)
    }

    fn no_change() -> MockReply {
        MockReply::status(CaptureStatus::NoVideoChange, 0)
    }

    fn take_and_release(handle: &DisplayHandle) -> Command {
        let command = handle.poll_command().expect("draw command");
        handle.on_command_released(command.clone());
        command
    }

    #[test]
    fn test_changed_frame_at_current_size_publishes_draw() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[1, 2]));

        // Act
        let report = session.tick();

        // Assert
        assert!(report.draw_published);
        match handle.poll_command() {
            Some(Command::Draw { bbox, frame, source }) => {
                assert_eq!(bbox, Rect::covering(800, 600));
                assert_eq!(frame.payload(), &[1, 2]);
                assert_eq!(source, ImageSource::Captured);
            }
            other => panic!("expected a draw, got {other:?}"),
        }
    }

    #[test]
    fn test_busy_draw_slot_skips_capture_poll() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[1]));
        session.tick();
        let taken = handle.poll_command().expect("taken");

        // Act – the command is taken but not yet released
        let report = session.tick();

        // Assert
        assert!(report.draw_busy);
        assert!(!report.draw_published);
        assert_eq!(script.count(CaptureOpcode::GetVideo), 1);
        handle.on_command_released(taken);
        assert_eq!(handle.draw_slot(), SlotState::Empty);
    }

    #[test]
    fn test_resolution_change_resizes_then_draws_deferred_frame() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(1024, 768, &[4, 5]));

        // Act
        session.tick();
        let resize = take_and_release(&handle);
        session.tick();
        let draw = take_and_release(&handle);

        // Assert
        assert_eq!(
            resize,
            Command::SurfaceLifecycle(SurfaceCommand::Resize {
                width: 1024,
                height: 768
            })
        );
        match draw {
            Command::Draw { bbox, frame, .. } => {
                assert_eq!(bbox, Rect::covering(1024, 768));
                assert_eq!(frame.payload(), &[4, 5]);
            }
            other => panic!("expected a draw, got {other:?}"),
        }
        assert_eq!(script.count(CaptureOpcode::GetVideo), 1);
        assert_eq!(session.surface_size(), (1024, 768));
    }

    #[test]
    fn test_no_signal_keeps_default_surface() {
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(0, 0, &[]));

        session.tick();

        assert!(matches!(handle.poll_command(), Some(Command::Draw { .. })));
        assert_eq!(session.surface_size(), (800, 600));
    }

    #[test]
    fn test_no_change_without_cache_publishes_nothing() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, no_change());

        // Act
        let report = session.tick();

        // Assert
        assert!(!report.draw_published);
        assert!(handle.poll_command().is_none());
    }

    #[test]
    fn test_no_change_re_serves_cached_frame() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[7]));
        script.push(CaptureOpcode::GetVideo, no_change());
        session.tick();
        take_and_release(&handle);

        // Act
        session.tick();

        // Assert
        match handle.poll_command() {
            Some(Command::Draw { frame, source, .. }) => {
                assert_eq!(source, ImageSource::Cached);
                assert_eq!(frame.payload(), &[7]);
            }
            other => panic!("expected a cached draw, got {other:?}"),
        }
    }

    #[test]
    fn test_no_change_with_resend_disabled_publishes_nothing() {
        let (mut session, handle, script, _) = session(SessionOptions {
            resend_cached_frame: false,
            ..SessionOptions::default()
        });
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[7]));
        script.push(CaptureOpcode::GetVideo, no_change());
        session.tick();
        take_and_release(&handle);

        session.tick();

        assert!(handle.poll_command().is_none());
    }

    #[test]
    fn test_cursor_is_not_polled_without_client() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 5, 5, true));

        // Act
        session.tick();

        // Assert
        assert_eq!(script.count(CaptureOpcode::GetCursor), 0);
        assert!(handle.poll_cursor_command().is_none());
    }

    #[test]
    fn test_cursor_set_move_and_hide_sequence() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        handle.on_client_presence_changed(true);
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 5, 6, true));
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 5, 6, false));
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 9, 6, false));
        script.push(
            CaptureOpcode::GetCursor,
            MockReply::status(CaptureStatus::NoCursor, 0),
        );
        script.push(
            CaptureOpcode::GetCursor,
            MockReply::status(CaptureStatus::NoCursor, 0),
        );

        // Act
        let mut commands = Vec::new();
        for _ in 0..5 {
            session.tick();
            if let Some(command) = handle.poll_cursor_command() {
                handle.on_command_released(command.clone());
                commands.push(command);
            }
        }

        // Assert – the unchanged position and the second hide emit nothing
        assert_eq!(commands.len(), 3);
        match &commands[0] {
            Command::CursorSet { position, shape } => {
                assert_eq!(*position, CursorPosition { x: 5, y: 6 });
                assert_eq!(shape.width, 64);
            }
            other => panic!("expected a cursor set, got {other:?}"),
        }
        assert_eq!(
            commands[1],
            Command::CursorMove {
                position: CursorPosition { x: 9, y: 6 }
            }
        );
        assert_eq!(commands[2], Command::CursorHide);
        assert!(!session.cursor_visible());
    }

    #[test]
    fn test_initial_no_cursor_report_sends_one_hide() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());
        handle.on_client_presence_changed(true);
        for _ in 0..2 {
            script.push(
                CaptureOpcode::GetCursor,
                MockReply::status(CaptureStatus::NoCursor, 0),
            );
        }

        // Act
        session.tick();
        let first = handle.poll_cursor_command();
        if let Some(command) = first.clone() {
            handle.on_command_released(command);
        }
        let report = session.tick();

        // Assert
        assert_eq!(first, Some(Command::CursorHide));
        assert!(!report.cursor_published);
        assert!(handle.poll_cursor_command().is_none());
    }

    #[test]
    fn test_unknown_cursor_type_hides_visible_cursor() {
        let (mut session, handle, script, _) = session(SessionOptions::default());
        handle.on_client_presence_changed(true);
        script.push(CaptureOpcode::GetCursor, cursor_reply(0, 1, 1, true));
        script.push(CaptureOpcode::GetCursor, cursor_reply(7, 1, 1, true));

        session.tick();
        let set = handle.poll_cursor_command().expect("set");
        handle.on_command_released(set);
        session.tick();

        assert_eq!(handle.poll_cursor_command(), Some(Command::CursorHide));
    }

    #[test]
    fn test_pending_cursor_command_is_not_overwritten() {
        let (mut session, handle, script, _) = session(SessionOptions::default());
        handle.on_client_presence_changed(true);
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 5, 6, true));
        script.push(CaptureOpcode::GetCursor, cursor_reply(1, 9, 9, false));

        session.tick();
        session.tick();

        assert!(matches!(
            handle.poll_cursor_command(),
            Some(Command::CursorSet { .. })
        ));
        assert_eq!(script.count(CaptureOpcode::GetCursor), 1);
    }

    #[test]
    fn test_client_attach_restarts_running_capture() {
        // Arrange
        let (mut session, handle, script, _) = session(SessionOptions::default());

        // Act
        handle.on_client_presence_changed(true);
        let report = session.tick();

        // Assert
        assert!(report.restarted);
        let calls = script.calls();
        assert_eq!(
            &calls[..2],
            &[CaptureOpcode::StopCapture, CaptureOpcode::StartCapture]
        );
        assert_eq!(handle.client_count(), 1);
    }

    #[test]
    fn test_client_detach_never_goes_below_zero() {
        let (_session, handle, _, _) = session(SessionOptions::default());

        handle.on_client_presence_changed(false);
        handle.on_client_presence_changed(true);
        handle.on_client_presence_changed(false);
        handle.on_client_presence_changed(false);

        assert_eq!(handle.client_count(), 0);
    }

    #[test]
    fn test_requested_notification_wakes_runtime_once() {
        // Arrange
        let (mut session, handle, script, runtime) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[1]));
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[2]));

        // Act
        let waiting = handle.request_notification();
        let first = session.tick();
        take_and_release(&handle);
        let second = session.tick();

        // Assert
        assert!(waiting);
        assert!(first.woke_runtime);
        assert!(!second.woke_runtime);
        assert_eq!(runtime.wakeups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_notification_with_pending_command_returns_false() {
        let (mut session, handle, script, _) = session(SessionOptions::default());
        script.push(CaptureOpcode::GetVideo, video_reply(800, 600, &[1]));
        session.tick();

        assert!(!handle.request_notification());
    }
}
