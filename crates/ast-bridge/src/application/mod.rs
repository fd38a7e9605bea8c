//! Application layer use cases of the bridge.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The *application* layer sits between the pure logic in `ast_core` and the
//! device adapters in `infrastructure`.  Use cases here:
//!
//! - **Orchestrate** `ast_core` types to fulfil one goal, such as "turn a
//!   captured frame into a draw command".
//! - **Depend on traits** ([`CaptureDevice`](crate::infrastructure::capture::CaptureDevice),
//!   [`HidDevice`](crate::infrastructure::hid::HidDevice)) so tests run against
//!   recording mocks.
//! - **Never block**.  Every call either completes or reports that nothing
//!   happened.
//!
//! # Sub-modules
//!
//! - **`frame_source`**    – drives the capture engine and reads frames and
//!   cursor state out of its shared memory.
//! - **`frame_cache`**     – keeps the last frame for re-serving.
//! - **`display_session`** – the producer tick and the consumer handle around
//!   the two command mailboxes.
//! - **`lock_negotiator`** – acquires and releases HID device locks.
//! - **`forward_input`**   – turns scancodes and pointer events into HID
//!   frames and writes them.

pub mod display_session;
pub mod forward_input;
pub mod frame_cache;
pub mod frame_source;
pub mod lock_negotiator;
