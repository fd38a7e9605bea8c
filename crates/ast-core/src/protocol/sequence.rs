//! Per-lock frame sequence counter.
//!
//! # Why every frame carries a sequence number (for beginners)
//!
//! The HID redirection driver tracks the `SeqNo` field of each frame it
//! receives for a given device lock.  The number must start at 0 when the lock
//! is granted and grow by exactly one per frame; it never resets while the lock
//! is held.  The counter lives inside [`DeviceLock`](super::lock::DeviceLock) so
//! that its lifetime is the lock's lifetime.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU32` so a lock can be shared by reference between
//! the builder and diagnostics without a `Mutex`.  The field is 32 bits wide on
//! the wire and wraps from `u32::MAX` back to 0.

use std::sync::atomic::{AtomicU32, Ordering};

/// A monotonically increasing, wrapping 32-bit sequence counter.
///
/// # Examples
///
/// ```rust
/// use ast_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose next value is `value`.
    pub fn starting_at(value: u32) -> Self {
        Self {
            inner: AtomicU32::new(value),
        }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// `Relaxed` ordering is enough: the value only numbers frames and does
    /// not publish any other memory.
    pub fn next(&self) -> u32 {
        // fetch_add returns the previous value and wraps on overflow.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will produce.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let first = counter.next();

        // Assert
        assert_eq!(first, 0);
        assert_eq!(counter.current(), 1);
    }

    #[test]
    fn test_sequence_counter_has_no_gaps() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let values: Vec<u32> = (0..100).map(|_| counter.next()).collect();

        // Assert
        for window in values.windows(2) {
            assert_eq!(window[1], window[0] + 1, "values must step by exactly one");
        }
    }

    #[test]
    fn test_sequence_counter_wraps_at_u32_max() {
        // Arrange
        let counter = SequenceCounter::starting_at(u32::MAX);

        // Act
        let before_wrap = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(before_wrap, u32::MAX);
        assert_eq!(after_wrap, 0, "counter must wrap to 0 after u32::MAX");
    }

    #[test]
    fn test_sequence_counter_is_unique_across_threads() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());
        let thread_count = 4;
        let per_thread = 500;

        // Act
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..per_thread).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), thread_count * per_thread);
    }
}
