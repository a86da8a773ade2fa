//! Scriptable in-memory transport.
//!
//! Clones share state, so a test can hand one clone to a
//! [`DeviceSession`](crate::DeviceSession) and inspect the recorded
//! transactions through another.

use crate::transport::{RegisterTransport, TransportError};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded bus transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Send(Vec<u8>),
    SendThenReceive { bytes: Vec<u8>, read_len: usize },
}

#[derive(Default)]
struct MockState {
    transactions: Vec<Transaction>,
    reads: VecDeque<Vec<u8>>,
    send_calls: usize,
    failing_sends: Vec<usize>,
    short_writes: bool,
    disconnected: bool,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the bytes returned by the next `send_then_receive`.
    ///
    /// Replies longer than the requested length are truncated; shorter ones
    /// are returned as-is. With the queue empty, reads return no bytes.
    pub fn push_read(&self, bytes: &[u8]) -> &Self {
        self.state().reads.push_back(bytes.to_vec());
        self
    }

    /// Make the `n`th `send` call (0-based, counted over the mock's lifetime) fail.
    pub fn fail_send(&self, n: usize) -> &Self {
        self.state().failing_sends.push(n);
        self
    }

    /// Accept only the first byte of every subsequent `send`.
    pub fn short_writes(&self) -> &Self {
        self.state().short_writes = true;
        self
    }

    /// Fail every subsequent call with [`TransportError::Disconnected`].
    pub fn disconnect(&self) -> &Self {
        self.state().disconnected = true;
        self
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().transactions.clone()
    }

    /// Payloads of all recorded `send` calls.
    pub fn sends(&self) -> Vec<Vec<u8>> {
        self.state()
            .transactions
            .iter()
            .filter_map(|t| match t {
                Transaction::Send(bytes) => Some(bytes.clone()),
                Transaction::SendThenReceive { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state().transactions.clear();
    }
}

impl RegisterTransport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        let call = state.send_calls;
        state.send_calls += 1;
        state.transactions.push(Transaction::Send(bytes.to_vec()));

        if state.failing_sends.contains(&call) {
            return Err(TransportError::Bus(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Data,
            )));
        }
        if state.short_writes {
            return Ok(bytes.len().min(1));
        }
        Ok(bytes.len())
    }

    fn send_then_receive(
        &mut self,
        bytes: &[u8],
        read_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        state.transactions.push(Transaction::SendThenReceive {
            bytes: bytes.to_vec(),
            read_len,
        });

        let mut reply = state.reads.pop_front().unwrap_or_default();
        reply.truncate(read_len);
        Ok(reply)
    }
}
