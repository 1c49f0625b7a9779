//! Mock transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{ElmTransport, TransportError};

/// Scripted stand-in for the interpreter.
///
/// Each `send` moves the next queued reply into the receive buffer, the way
/// the device answers a command. Each `drain` returns one buffered chunk,
/// so consecutive reads observe consecutive snapshots. Clones share state;
/// keep one to inspect traffic after handing the other to a session.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Replies released one per `send`.
    replies: VecDeque<Vec<u8>>,
    /// Bytes the host has not read yet, one entry per snapshot.
    rx: VecDeque<Vec<u8>>,
    /// Captured writes.
    writes: Vec<Vec<u8>>,
    discards: usize,
    drains: usize,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread may poison the lock; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the reply to the next command.
    pub fn queue_reply(&self, reply: &str) {
        self.state().replies.push_back(reply.as_bytes().to_vec());
    }

    /// Put bytes straight into the receive buffer.
    pub fn feed(&self, chunk: &[u8]) {
        self.state().rx.push_back(chunk.to_vec());
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Captured writes as text.
    pub fn commands(&self) -> Vec<String> {
        self.state()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn discard_count(&self) -> usize {
        self.state().discards
    }

    pub fn drain_count(&self) -> usize {
        self.state().drains
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Simulate the cable being pulled.
    pub fn disconnect(&self) {
        self.state().closed = true;
    }
}

impl ElmTransport for MockTransport {
    fn discard_buffers(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.rx.clear();
        state.discards += 1;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.writes.push(data.to_vec());
        if let Some(reply) = state.replies.pop_front() {
            state.rx.push_back(reply);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.drains += 1;
        Ok(state.rx.pop_front().unwrap_or_default())
    }

    fn close(&mut self) {
        self.state().closed = true;
    }
}
