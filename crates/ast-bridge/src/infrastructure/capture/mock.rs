//! Mock capture device for unit testing.
//!
//! The mock owns a plain byte vector standing in for the shared mapping.
//! Tests script the reply of each control call through a [`CaptureScript`]
//! handle; a scripted reply may also carry memory writes, which are applied
//! when the call is made, the same way the driver fills the mapping during a
//! GetVideo or GetCursor call.
//!
//! Unscripted calls answer `Success` with size 0.  Every call is recorded.
//!
//! ```ignore
//! let device = MockCaptureDevice::new(CAPTURE_MMAP_SIZE);
//! let script = device.script();
//! script.push(CaptureOpcode::GetVideo, MockReply::ok(64).with_write(0, header));
//!
//! let mut source = FrameSource::new(Box::new(device));
//! source.poll_frame();
//! assert_eq!(script.calls(), vec![CaptureOpcode::GetVideo]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{CaptureDevice, CaptureError, CaptureOpcode, CaptureStatus, ControlReply};

/// One scripted answer to a control call.
#[derive(Debug, Clone)]
pub struct MockReply {
    /// `None` makes the call itself fail.
    reply: Option<ControlReply>,
    writes: Vec<(usize, Vec<u8>)>,
}

impl MockReply {
    pub fn ok(size: usize) -> Self {
        Self::status(CaptureStatus::Success, size)
    }

    pub fn status(status: CaptureStatus, size: usize) -> Self {
        Self {
            reply: Some(ControlReply::new(status, size)),
            writes: Vec::new(),
        }
    }

    /// The call fails with an I/O error.
    pub fn fail() -> Self {
        Self {
            reply: None,
            writes: Vec::new(),
        }
    }

    /// Copies `bytes` into the mapping at `offset` when the call is made.
    pub fn with_write(mut self, offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        self.writes.push((offset, bytes.into()));
        self
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: HashMap<CaptureOpcode, VecDeque<MockReply>>,
    calls: Vec<CaptureOpcode>,
}

/// Shared handle for scripting and inspecting a [`MockCaptureDevice`].
#[derive(Debug, Clone, Default)]
pub struct CaptureScript {
    state: Arc<Mutex<ScriptState>>,
}

impl CaptureScript {
    /// Queues `reply` for the next `opcode` call.
    pub fn push(&self, opcode: CaptureOpcode, reply: MockReply) {
        self.state
            .lock()
            .expect("lock poisoned")
            .replies
            .entry(opcode)
            .or_default()
            .push_back(reply);
    }

    /// All control calls made so far, in order.
    pub fn calls(&self) -> Vec<CaptureOpcode> {
        self.state.lock().expect("lock poisoned").calls.clone()
    }

    pub fn count(&self, opcode: CaptureOpcode) -> usize {
        self.calls().iter().filter(|op| **op == opcode).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().expect("lock poisoned").calls.clear();
    }

    fn next(&self, opcode: CaptureOpcode) -> Option<MockReply> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.calls.push(opcode);
        state.replies.get_mut(&opcode).and_then(VecDeque::pop_front)
    }
}

/// In-memory [`CaptureDevice`].
#[derive(Debug)]
pub struct MockCaptureDevice {
    memory: Vec<u8>,
    script: CaptureScript,
}

impl MockCaptureDevice {
    /// Creates a device with a zeroed mapping of `memory_len` bytes.
    pub fn new(memory_len: usize) -> Self {
        Self {
            memory: vec![0u8; memory_len],
            script: CaptureScript::default(),
        }
    }

    pub fn script(&self) -> CaptureScript {
        self.script.clone()
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn control(&mut self, opcode: CaptureOpcode) -> Result<ControlReply, CaptureError> {
        let Some(scripted) = self.script.next(opcode) else {
            return Ok(ControlReply::new(CaptureStatus::Success, 0));
        };

        for (offset, bytes) in &scripted.writes {
            let end = (*offset + bytes.len()).min(self.memory.len());
            if *offset < end {
                self.memory[*offset..end].copy_from_slice(&bytes[..end - offset]);
            }
        }

        scripted.reply.ok_or_else(|| CaptureError::Control {
            opcode,
            source: std::io::Error::new(std::io::ErrorKind::Other, "mock failure"),
        })
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }
}
