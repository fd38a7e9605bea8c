//! The device lock: the grant that authorizes frames for one emulated device.

use super::header::DeviceType;
use super::sequence::SequenceCounter;

/// Exclusive grant for one keyboard or mouse interface of the HID redirector.
///
/// A lock is created from the reply to a successful lock-request exchange.
/// Every frame built for the device copies `device_no`, `interface_no` and
/// `key` into its header and draws the next number from the lock's own
/// sequence counter, so sequence numbers never reset while the lock is alive.
#[derive(Debug)]
pub struct DeviceLock {
    device_type: DeviceType,
    device_no: u8,
    interface_no: u8,
    key: u32,
    sequence: SequenceCounter,
}

impl DeviceLock {
    pub fn new(device_type: DeviceType, device_no: u8, interface_no: u8, key: u32) -> Self {
        Self {
            device_type,
            device_no,
            interface_no,
            key,
            sequence: SequenceCounter::new(),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn device_no(&self) -> u8 {
        self.device_no
    }

    pub fn interface_no(&self) -> u8 {
        self.interface_no
    }

    /// Session key granted by the driver.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Logical address: device number in the high byte, interface number in
    /// the low byte.
    pub fn address(&self) -> u16 {
        (self.device_no as u16) << 8 | self.interface_no as u16
    }

    /// Sequence number the next built frame will carry.
    pub fn peek_seq_no(&self) -> u32 {
        self.sequence.current()
    }

    pub(crate) fn next_seq_no(&self) -> u32 {
        self.sequence.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_packs_device_and_interface() {
        // Arrange
        let lock = DeviceLock::new(DeviceType::Mouse, 0x03, 0x02, 1);

        // Act / Assert
        assert_eq!(lock.address(), 0x0302);
    }

    #[test]
    fn test_new_lock_starts_sequence_at_zero() {
        // Arrange
        let lock = DeviceLock::new(DeviceType::Keyboard, 1, 0, 99);

        // Act
        let first = lock.next_seq_no();

        // Assert
        assert_eq!(first, 0);
        assert_eq!(lock.peek_seq_no(), 1);
    }
}
