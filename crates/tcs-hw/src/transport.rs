//! Byte-level access to a single device on a register bus.

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("bus error: {0}")]
    Bus(ErrorKind),
    #[error("transfer of {len} bytes exceeds bus limit of {max}")]
    TransferTooLong { len: usize, max: usize },
    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("device disconnected")]
    Disconnected,
}

/// A handle addressing exactly one physical device.
///
/// Implementations perform each call as one bus transaction and never retry.
pub trait RegisterTransport: Send {
    /// Write `bytes` to the device. Returns the number of bytes the bus accepted.
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Write `bytes`, then read up to `read_len` bytes back in the same transaction.
    ///
    /// May return fewer than `read_len` bytes; callers check the length.
    fn send_then_receive(
        &mut self,
        bytes: &[u8],
        read_len: usize,
    ) -> Result<Vec<u8>, TransportError>;
}
