//! Single-slot hand-off between one producer and one consumer.
//!
//! # How the slot works (for beginners)
//!
//! A [`CommandMailbox`] holds at most one item.  Its life cycle is a loop:
//!
//! ```text
//!          try_publish            try_take             mark_released
//!  Empty ──────────────▶ Pending ──────────▶ Taken ──────────────────▶ Empty
//! ```
//!
//! - `try_publish` only succeeds on an Empty slot.  Otherwise the item is
//!   handed back so the producer can keep it or drop it.
//! - `try_take` only succeeds on a Pending slot and moves the item out.
//! - `mark_released` is called once the consumer has finished with the item
//!   it took; only then may the producer publish again.
//!
//! Nothing ever blocks.  Every operation either makes its transition or
//! returns immediately.
//!
//! # Memory ordering
//!
//! The state lives in an `AtomicU8`.  Two short internal states (`WRITING`,
//! `READING`) mark the moments when one side is touching the storage cell;
//! the compare-and-swap into them is what gives that side exclusive access.
//! The store that leaves `WRITING` uses `Release` and the CAS that enters
//! `READING` uses `Acquire`, so a consumer always sees the complete item the
//! producer wrote.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const PENDING: u8 = 2;
const READING: u8 = 3;
const TAKEN: u8 = 4;

/// Observable state of a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Pending,
    Taken,
}

/// An atomically guarded single slot.  See the module docs.
pub struct CommandMailbox<T> {
    state: AtomicU8,
    item: UnsafeCell<Option<T>>,
}

// SAFETY: the storage cell is only accessed by the thread that won the CAS
// into WRITING or READING, and those states are exclusive.  Items move across
// threads, so T must be Send.
unsafe impl<T: Send> Sync for CommandMailbox<T> {}

impl<T> CommandMailbox<T> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            item: UnsafeCell::new(None),
        }
    }

    /// Places `item` in the slot if it is Empty.
    ///
    /// # Errors
    ///
    /// Returns `item` unchanged when the slot is Pending or Taken; the item
    /// already in the slot is left untouched.
    pub fn try_publish(&self, item: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(item);
        }

        // SAFETY: we own the cell while the state is WRITING.
        unsafe {
            *self.item.get() = Some(item);
        }
        self.state.store(PENDING, Ordering::Release);
        Ok(())
    }

    /// Moves the pending item out, leaving the slot Taken.
    ///
    /// Returns `None` when the slot is Empty or already Taken.
    pub fn try_take(&self) -> Option<T> {
        if self
            .state
            .compare_exchange(PENDING, READING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        // SAFETY: we own the cell while the state is READING.
        let item = unsafe { (*self.item.get()).take() };
        self.state.store(TAKEN, Ordering::Release);
        item
    }

    /// Returns a Taken slot to Empty.
    ///
    /// Returns `false` (and changes nothing) if the slot was not Taken.
    pub fn mark_released(&self) -> bool {
        self.state
            .compare_exchange(TAKEN, EMPTY, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            PENDING => SlotState::Pending,
            READING | TAKEN => SlotState::Taken,
            _ => SlotState::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state() == SlotState::Empty
    }
}

impl<T> Default for CommandMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CommandMailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandMailbox")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_on_empty_slot_makes_it_pending() {
        // Arrange
        let mailbox = CommandMailbox::new();

        // Act
        let result = mailbox.try_publish(7u32);

        // Assert
        assert_eq!(result, Ok(()));
        assert_eq!(mailbox.state(), SlotState::Pending);
    }

    #[test]
    fn test_publish_on_occupied_slot_returns_item_and_keeps_existing() {
        // Arrange
        let mailbox = CommandMailbox::new();
        mailbox.try_publish("first").expect("publish");

        // Act
        let rejected = mailbox.try_publish("second");
        let rejected_again = mailbox.try_publish("third");

        // Assert
        assert_eq!(rejected, Err("second"));
        assert_eq!(rejected_again, Err("third"));
        assert_eq!(mailbox.try_take(), Some("first"));
    }

    #[test]
    fn test_publish_on_taken_slot_is_rejected_until_released() {
        // Arrange
        let mailbox = CommandMailbox::new();
        mailbox.try_publish(1u8).expect("publish");
        let _taken = mailbox.try_take();

        // Act
        let while_taken = mailbox.try_publish(2u8);
        let released = mailbox.mark_released();
        let after_release = mailbox.try_publish(3u8);

        // Assert
        assert_eq!(while_taken, Err(2));
        assert!(released);
        assert_eq!(after_release, Ok(()));
    }

    #[test]
    fn test_take_twice_returns_item_once() {
        // Arrange
        let mailbox = CommandMailbox::new();
        mailbox.try_publish(String::from("frame")).expect("publish");

        // Act
        let first = mailbox.try_take();
        let second = mailbox.try_take();

        // Assert
        assert_eq!(first.as_deref(), Some("frame"));
        assert!(second.is_none());
        assert_eq!(mailbox.state(), SlotState::Taken);
    }

    #[test]
    fn test_take_on_empty_slot_returns_none() {
        let mailbox: CommandMailbox<u8> = CommandMailbox::new();
        assert!(mailbox.try_take().is_none());
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_mark_released_only_acts_on_taken_slot() {
        // Arrange
        let mailbox = CommandMailbox::new();

        // Act / Assert
        assert!(!mailbox.mark_released());
        mailbox.try_publish(5u8).expect("publish");
        assert!(!mailbox.mark_released());
        assert_eq!(mailbox.state(), SlotState::Pending);
    }

    #[test]
    fn test_items_cross_threads_intact_and_in_order() {
        // Arrange
        const COUNT: u32 = 2_000;
        let mailbox = Arc::new(CommandMailbox::new());
        let producer_box = Arc::clone(&mailbox);

        // Act
        let producer = thread::spawn(move || {
            for i in 0..COUNT {
                let mut item = vec![i; 16];
                loop {
                    match producer_box.try_publish(item) {
                        Ok(()) => break,
                        Err(back) => {
                            item = back;
                            thread::yield_now();
                        }
                    }
                }
            }
        });

        let mut received = Vec::with_capacity(COUNT as usize);
        while received.len() < COUNT as usize {
            match mailbox.try_take() {
                Some(item) => {
                    assert!(item.iter().all(|v| *v == item[0]));
                    received.push(item[0]);
                    assert!(mailbox.mark_released());
                }
                None => thread::yield_now(),
            }
        }
        producer.join().expect("producer thread");

        // Assert
        assert_eq!(received, (0..COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn test_unreleased_pending_item_is_dropped_with_mailbox() {
        // Arrange
        let payload = Arc::new(());
        let mailbox = CommandMailbox::new();
        mailbox.try_publish(Arc::clone(&payload)).expect("publish");

        // Act
        drop(mailbox);

        // Assert
        assert_eq!(Arc::strong_count(&payload), 1);
    }
}
