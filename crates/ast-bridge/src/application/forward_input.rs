//! Input forwarding use case: keyboard and pointer events to the HID
//! redirection driver.
//!
//! # Lifecycle (for beginners)
//!
//! 1. [`InputForwarder::start`] locks one keyboard and one mouse interface.
//!    Without both locks no frame may be sent, so failing here is fatal.
//! 2. The mouse is switched to the configured pointer mode.  A failure is
//!    only logged; the device keeps working in its current mode.
//! 3. Events are turned into frames by [`HidFrameBuilder`] and written with
//!    one ioctl each.  A failed write drops that event and nothing else.
//! 4. [`InputForwarder::shutdown`] releases both locks.

use ast_core::protocol::interface::MouseModeRecord;
use ast_core::protocol::{
    DeviceLock, DeviceType, HidFrame, HidFrameBuilder, LedState, MouseMode, ProtocolError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::lock_negotiator::{DeviceLockNegotiator, LockError};
use crate::infrastructure::hid::{HidDevice, HidError, HidRequest};

/// Errors raised by the input forwarder.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// A device lock could not be acquired at startup.
    #[error("cannot lock {device_type:?}: {source}")]
    Lock {
        device_type: DeviceType,
        #[source]
        source: LockError,
    },

    /// A frame could not be written; the event is lost.
    #[error("writing {device_type:?} frame failed: {source}")]
    Write {
        device_type: DeviceType,
        #[source]
        source: HidError,
    },

    #[error("mouse mode change failed: {0}")]
    MouseMode(#[source] HidError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Startup options of the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderOptions {
    pub mouse_mode: MouseMode,
    /// Use the blocking LED query call.
    pub led_query_blocking: bool,
}

impl Default for ForwarderOptions {
    fn default() -> Self {
        Self {
            mouse_mode: MouseMode::Relative,
            led_query_blocking: false,
        }
    }
}

/// Sends keyboard and pointer frames on behalf of the display session.
pub struct InputForwarder {
    device: Box<dyn HidDevice>,
    builder: HidFrameBuilder,
    keyboard: DeviceLock,
    mouse: DeviceLock,
    leds: LedState,
    led_query_blocking: bool,
}

impl InputForwarder {
    /// Locks the keyboard and the mouse, then applies the mouse mode.
    ///
    /// # Errors
    ///
    /// [`ForwardError::Lock`] if either lock cannot be acquired.  A keyboard
    /// lock taken before a failing mouse lock is released again.
    pub fn start(
        mut device: Box<dyn HidDevice>,
        options: ForwarderOptions,
    ) -> Result<Self, ForwardError> {
        let (keyboard, mouse) = {
            let mut negotiator = DeviceLockNegotiator::new(device.as_mut());
            let keyboard =
                negotiator
                    .acquire(DeviceType::Keyboard)
                    .map_err(|source| ForwardError::Lock {
                        device_type: DeviceType::Keyboard,
                        source,
                    })?;
            let mouse = match negotiator.acquire(DeviceType::Mouse) {
                Ok(lock) => lock,
                Err(source) => {
                    negotiator.release(&keyboard);
                    return Err(ForwardError::Lock {
                        device_type: DeviceType::Mouse,
                        source,
                    });
                }
            };
            (keyboard, mouse)
        };

        let mut forwarder = Self {
            device,
            builder: HidFrameBuilder::new(),
            keyboard,
            mouse,
            leds: LedState::default(),
            led_query_blocking: options.led_query_blocking,
        };

        if let Err(e) = forwarder.set_mouse_mode(options.mouse_mode) {
            warn!(error = %e, "keeping current mouse mode");
        }
        info!("input forwarding ready");
        Ok(forwarder)
    }

    /// Reads the mouse pointer mode and switches it if it differs from
    /// `wanted`.  Returns the mode in effect afterwards.
    ///
    /// # Errors
    ///
    /// [`ForwardError::MouseMode`] if the driver rejects either call.
    pub fn set_mouse_mode(&mut self, wanted: MouseMode) -> Result<MouseMode, ForwardError> {
        let mut buf = MouseModeRecord::for_lock(&self.mouse, 0).encode();
        self.device
            .call(HidRequest::MouseGetMode, &mut buf)
            .map_err(ForwardError::MouseMode)?;
        let current = MouseModeRecord::decode(&buf)?.data;

        if current == wanted as u8 {
            debug!(?wanted, "mouse mode already set");
            return Ok(wanted);
        }

        let request = match wanted {
            MouseMode::Relative => HidRequest::MouseAbsToRel,
            MouseMode::Absolute => HidRequest::MouseRelToAbs,
        };
        let mut buf = MouseModeRecord::for_lock(&self.mouse, wanted as u8).encode();
        self.device
            .call(request, &mut buf)
            .map_err(ForwardError::MouseMode)?;
        info!(from = current, to = ?wanted, "mouse mode switched");
        Ok(wanted)
    }

    /// Sends one keyboard scancode byte.
    ///
    /// Returns `Ok(false)` for the extended prefix, which produces no frame.
    ///
    /// # Errors
    ///
    /// [`ForwardError::Write`] if the driver rejects the frame.
    pub fn push_scancode(&mut self, scancode: u8) -> Result<bool, ForwardError> {
        let Some(frame) = self.builder.build_key_report(&self.keyboard, scancode) else {
            return Ok(false);
        };
        self.write(DeviceType::Keyboard, HidRequest::KeyboardData, &frame)?;
        Ok(true)
    }

    /// Sends relative pointer motion with wheel and buttons.
    ///
    /// Returns `Ok(false)` when the report was suppressed as a repeat.
    ///
    /// # Errors
    ///
    /// [`ForwardError::Write`] if the driver rejects the frame.
    pub fn pointer_motion(
        &mut self,
        dx: i32,
        dy: i32,
        wheel: i32,
        buttons: u8,
    ) -> Result<bool, ForwardError> {
        let Some(frame) = self
            .builder
            .build_mouse_report(&self.mouse, dx, dy, wheel, buttons)
        else {
            return Ok(false);
        };
        self.write(DeviceType::Mouse, HidRequest::MouseData, &frame)?;
        Ok(true)
    }

    /// Sends a button change without motion.
    ///
    /// # Errors
    ///
    /// [`ForwardError::Write`] if the driver rejects the frame.
    pub fn pointer_buttons(&mut self, buttons: u8) -> Result<bool, ForwardError> {
        let Some(frame) = self.builder.build_mouse_buttons(&self.mouse, buttons) else {
            return Ok(false);
        };
        self.write(DeviceType::Mouse, HidRequest::MouseData, &frame)?;
        Ok(true)
    }

    /// Queries the keyboard LEDs.  On failure the last known state is
    /// returned.
    pub fn query_leds(&mut self) -> LedState {
        let frame = self.builder.build_led_query(&self.keyboard);
        let mut buf = frame.to_bytes();
        let request = if self.led_query_blocking {
            HidRequest::KeyboardLed
        } else {
            HidRequest::KeyboardLedNoWait
        };

        match self.device.call(request, &mut buf) {
            Ok(()) => match LedState::from_response(&buf) {
                Ok(leds) => {
                    if leds != self.leds {
                        debug!(?leds, "keyboard LEDs changed");
                    }
                    self.leds = leds;
                }
                Err(e) => warn!(error = %e, "malformed LED reply"),
            },
            Err(e) => warn!(error = %e, "LED query failed, using cached state"),
        }
        self.leds
    }

    /// Current modifier byte of the keyboard decoder.
    pub fn modifiers(&self) -> u8 {
        self.builder.modifiers().bits()
    }

    pub fn keyboard_lock(&self) -> &DeviceLock {
        &self.keyboard
    }

    pub fn mouse_lock(&self) -> &DeviceLock {
        &self.mouse
    }

    /// Releases both device locks.
    pub fn shutdown(mut self) {
        let mut negotiator = DeviceLockNegotiator::new(self.device.as_mut());
        negotiator.release(&self.keyboard);
        negotiator.release(&self.mouse);
    }

    fn write(
        &mut self,
        device_type: DeviceType,
        request: HidRequest,
        frame: &HidFrame,
    ) -> Result<(), ForwardError> {
        let mut buf = frame.to_bytes();
        self.device
            .call(request, &mut buf)
            .map_err(|source| ForwardError::Write {
                device_type,
                source,
            })
    }
}

impl std::fmt::Debug for InputForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputForwarder")
            .field("keyboard", &self.keyboard)
            .field("mouse", &self.mouse)
            .field("leds", &self.leds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::hid::mock::{HidScript, MockHidDevice};
    use ast_core::protocol::header::byte_sum;
    use ast_core::protocol::MouseButtons;

    fn start(options: ForwarderOptions) -> (InputForwarder, HidScript) {
        let device = MockHidDevice::with_keyboard_and_mouse();
        let script = device.script();
        let forwarder = InputForwarder::start(Box::new(device), options).expect("start");
        (forwarder, script)
    }

    #[test]
    fn test_start_locks_both_devices_and_switches_mouse_mode() {
        // Arrange / Act – the mock starts in absolute mode
        let (forwarder, script) = start(ForwarderOptions::default());

        // Assert
        assert_eq!(script.held_locks(), 2);
        assert_eq!(forwarder.keyboard_lock().device_type(), DeviceType::Keyboard);
        assert_eq!(forwarder.mouse_lock().address(), 0x0101);
        assert_eq!(script.mouse_mode(), MouseMode::Relative as u8);
        assert_eq!(script.buffers(HidRequest::MouseAbsToRel).len(), 1);
    }

    #[test]
    fn test_start_skips_mode_switch_when_already_set() {
        let (_forwarder, script) = start(ForwarderOptions {
            mouse_mode: MouseMode::Absolute,
            led_query_blocking: false,
        });

        assert!(script.buffers(HidRequest::MouseRelToAbs).is_empty());
        assert_eq!(script.buffers(HidRequest::MouseGetMode).len(), 1);
    }

    #[test]
    fn test_start_fails_without_mouse_and_releases_keyboard() {
        // Arrange
        let device = MockHidDevice::new();
        let script = device.script();
        script.add_device(0x30, 1, 0);

        // Act
        let result = InputForwarder::start(Box::new(device), ForwarderOptions::default());

        // Assert
        assert!(matches!(
            result,
            Err(ForwardError::Lock {
                device_type: DeviceType::Mouse,
                ..
            })
        ));
        assert_eq!(script.held_locks(), 0);
    }

    #[test]
    fn test_mouse_mode_failure_is_not_fatal() {
        let device = MockHidDevice::with_keyboard_and_mouse();
        device.script().fail(HidRequest::MouseGetMode);

        let result = InputForwarder::start(Box::new(device), ForwarderOptions::default());

        assert!(result.is_ok());
    }

    #[test]
    fn test_push_scancode_writes_checksummed_frame() {
        // Arrange
        let (mut forwarder, script) = start(ForwarderOptions::default());

        // Act
        let sent = forwarder.push_scancode(30).expect("push");
        let prefix = forwarder.push_scancode(0xE0).expect("push prefix");

        // Assert
        assert!(sent);
        assert!(!prefix);
        let frames = script.buffers(HidRequest::KeyboardData);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 41);
        assert_eq!(byte_sum(&frames[0][..32]), 0);
        assert_eq!(frames[0][35], 0x04);
    }

    #[test]
    fn test_pointer_repeat_is_suppressed() {
        // Arrange
        let (mut forwarder, script) = start(ForwarderOptions::default());

        // Act
        let first = forwarder.pointer_buttons(MouseButtons::LEFT).expect("press");
        let repeat = forwarder.pointer_buttons(MouseButtons::LEFT).expect("repeat");
        let moved = forwarder.pointer_motion(4, 0, 0, MouseButtons::LEFT).expect("drag");

        // Assert
        assert!(first);
        assert!(!repeat);
        assert!(moved);
        assert_eq!(script.buffers(HidRequest::MouseData).len(), 2);
    }

    #[test]
    fn test_write_failure_drops_event_only() {
        // Arrange
        let (mut forwarder, script) = start(ForwarderOptions::default());
        script.fail(HidRequest::KeyboardData);

        // Act
        let result = forwarder.push_scancode(30);

        // Assert
        assert!(matches!(result, Err(ForwardError::Write { .. })));
        assert!(forwarder.pointer_motion(1, 1, 0, 0).expect("mouse still works"));
    }

    #[test]
    fn test_led_query_decodes_and_caches() {
        // Arrange
        let (mut forwarder, script) = start(ForwarderOptions::default());
        script.set_led_bits(LedState::CAPS_LOCK | LedState::SCROLL_LOCK);

        // Act
        let leds = forwarder.query_leds();
        script.fail(HidRequest::KeyboardLedNoWait);
        let cached = forwarder.query_leds();

        // Assert
        assert!(leds.caps_lock);
        assert!(!leds.num_lock);
        assert!(leds.scroll_lock);
        assert_eq!(cached, leds);
    }

    #[test]
    fn test_blocking_led_query_uses_blocking_call() {
        let (mut forwarder, script) = start(ForwarderOptions {
            mouse_mode: MouseMode::Relative,
            led_query_blocking: true,
        });

        forwarder.query_leds();

        assert_eq!(script.buffers(HidRequest::KeyboardLed).len(), 1);
        assert!(script.buffers(HidRequest::KeyboardLedNoWait).is_empty());
    }

    #[test]
    fn test_shutdown_releases_locks() {
        let (forwarder, script) = start(ForwarderOptions::default());

        forwarder.shutdown();

        assert_eq!(script.held_locks(), 0);
    }
}
