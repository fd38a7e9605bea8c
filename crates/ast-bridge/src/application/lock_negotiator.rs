//! Device lock negotiation with the HID redirection driver.
//!
//! Before any keyboard or mouse frame may be sent, the bridge must hold an
//! exclusive lock on a redirected interface of that device type.  Acquiring
//! is an enumerate call followed by a request call; see
//! [`ast_core::protocol::interface`] for the records exchanged.
//!
//! Releasing is best effort.  The key alone authorizes frames, so a failed
//! release only leaks the interface until the driver is reset.

use ast_core::protocol::interface::{DeviceList, FreeDeviceQuery, LockRequest, LockType};
use ast_core::protocol::{DeviceLock, DeviceType};
use thiserror::Error;
use tracing::{info, warn};

use crate::infrastructure::hid::{HidDevice, HidError, HidRequest};

/// Errors raised while acquiring a device lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The driver lists no free interface of the requested type.
    #[error("no free {0:?} interface available")]
    NoDeviceAvailable(DeviceType),

    /// The driver refused the lock request.
    #[error("lock request for {device_type:?} denied: {source}")]
    LockDenied {
        device_type: DeviceType,
        #[source]
        source: HidError,
    },

    /// The enumerate call itself failed.
    #[error(transparent)]
    Device(#[from] HidError),

    #[error("malformed driver reply: {0}")]
    Protocol(#[from] ast_core::ProtocolError),
}

/// Acquires and releases locks over a [`HidDevice`].
pub struct DeviceLockNegotiator<'a> {
    device: &'a mut dyn HidDevice,
}

impl<'a> DeviceLockNegotiator<'a> {
    pub fn new(device: &'a mut dyn HidDevice) -> Self {
        Self { device }
    }

    /// Locks the first free interface of `device_type` exclusively.
    ///
    /// # Errors
    ///
    /// - [`LockError::Device`] if enumeration fails.
    /// - [`LockError::NoDeviceAvailable`] if no interface is free.
    /// - [`LockError::LockDenied`] if the request call fails.
    pub fn acquire(&mut self, device_type: DeviceType) -> Result<DeviceLock, LockError> {
        let mut query = FreeDeviceQuery {
            device_type,
            lock_type: LockType::Exclusive,
        }
        .encode();
        self.device.call(HidRequest::GetInterfaces, &mut query)?;

        let list = DeviceList::decode_reply(&query)?;
        let device = list
            .first
            .ok_or(LockError::NoDeviceAvailable(device_type))?;

        let mut request = LockRequest::exclusive(device_type, &device).encode();
        self.device
            .call(HidRequest::RequestInterface, &mut request)
            .map_err(|source| LockError::LockDenied {
                device_type,
                source,
            })?;

        let lock = LockRequest::decode(&request)?.into_lock(device_type);
        info!(
            ?device_type,
            device_no = lock.device_no(),
            interface_no = lock.interface_no(),
            address = format_args!("0x{:04X}", lock.address()),
            "device lock acquired"
        );
        Ok(lock)
    }

    /// Releases `lock`.  Returns whether the driver accepted the release;
    /// failures are logged and otherwise ignored.
    pub fn release(&mut self, lock: &DeviceLock) -> bool {
        let mut record = LockRequest::release(lock).encode();
        match self.device.call(HidRequest::ReleaseInterface, &mut record) {
            Ok(()) => {
                info!(device_type = ?lock.device_type(), "device lock released");
                true
            }
            Err(e) => {
                warn!(device_type = ?lock.device_type(), error = %e, "device lock release failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::hid::mock::MockHidDevice;

    #[test]
    fn test_acquire_returns_granted_key_and_address() {
        // Arrange
        let mut device = MockHidDevice::new();
        device.script().add_device(0x30, 2, 3);
        let mut negotiator = DeviceLockNegotiator::new(&mut device);

        // Act
        let lock = negotiator.acquire(DeviceType::Keyboard).expect("lock");

        // Assert
        assert_eq!(lock.device_type(), DeviceType::Keyboard);
        assert_eq!(lock.key(), 0x1000);
        assert_eq!(lock.address(), 0x0203);
        assert_eq!(lock.peek_seq_no(), 0);
    }

    #[test]
    fn test_acquire_without_free_device_fails() {
        // Arrange – only a mouse is advertised
        let mut device = MockHidDevice::new();
        device.script().add_device(0x31, 1, 1);
        let mut negotiator = DeviceLockNegotiator::new(&mut device);

        // Act
        let result = negotiator.acquire(DeviceType::Keyboard);

        // Assert
        assert!(matches!(
            result,
            Err(LockError::NoDeviceAvailable(DeviceType::Keyboard))
        ));
    }

    #[test]
    fn test_acquire_denied_when_request_fails() {
        let mut device = MockHidDevice::with_keyboard_and_mouse();
        device.script().fail(HidRequest::RequestInterface);
        let mut negotiator = DeviceLockNegotiator::new(&mut device);

        let result = negotiator.acquire(DeviceType::Mouse);

        assert!(matches!(result, Err(LockError::LockDenied { .. })));
    }

    #[test]
    fn test_acquire_propagates_enumeration_failure() {
        let mut device = MockHidDevice::with_keyboard_and_mouse();
        device.script().fail(HidRequest::GetInterfaces);
        let mut negotiator = DeviceLockNegotiator::new(&mut device);

        let result = negotiator.acquire(DeviceType::Keyboard);

        assert!(matches!(result, Err(LockError::Device(_))));
    }

    #[test]
    fn test_release_frees_interface_for_next_acquire() {
        // Arrange
        let mut device = MockHidDevice::with_keyboard_and_mouse();
        let script = device.script();
        let mut negotiator = DeviceLockNegotiator::new(&mut device);
        let first = negotiator.acquire(DeviceType::Keyboard).expect("lock");

        // Act
        let released = negotiator.release(&first);
        let second = negotiator.acquire(DeviceType::Keyboard).expect("relock");

        // Assert
        assert!(released);
        assert_eq!(second.address(), first.address());
        assert_ne!(second.key(), first.key());
        assert_eq!(script.held_locks(), 1);
    }

    #[test]
    fn test_failed_release_is_not_fatal() {
        let mut device = MockHidDevice::with_keyboard_and_mouse();
        device.script().fail(HidRequest::ReleaseInterface);
        let mut negotiator = DeviceLockNegotiator::new(&mut device);
        let lock = negotiator.acquire(DeviceType::Mouse).expect("lock");

        assert!(!negotiator.release(&lock));
    }
}
