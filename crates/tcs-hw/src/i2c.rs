//! Linux i2c-dev transport on top of `linux-embedded-hal`.
//!
//! Register writes are a single `I2c::write`. Register reads use
//! `I2c::write_read`, one combined transaction (command byte, repeated
//! start, read), so the address and data phases cannot be split by another
//! bus user.

use crate::transport::{RegisterTransport, TransportError};
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};
use linux_embedded_hal::I2cdev;

/// Largest single message the i2c-dev interface can describe (`i2c_msg.len` is a u16).
pub const MAX_TRANSFER: usize = u16::MAX as usize;

/// One slave device on a Linux I2C adapter.
pub struct LinuxI2c {
    bus: I2cdev,
    bus_path: String,
    address: u8,
}

impl LinuxI2c {
    /// Open an adapter (e.g., "/dev/i2c-1") for the device at `address`.
    pub fn open(bus_path: &str, address: u8) -> Result<Self, TransportError> {
        let bus = I2cdev::new(bus_path).map_err(|e| TransportError::Open {
            path: bus_path.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            bus = bus_path,
            address = %format!("{address:#04x}"),
            "opened i2c device"
        );

        Ok(Self {
            bus,
            bus_path: bus_path.to_string(),
            address,
        })
    }

    /// Adapter path this transport was opened on.
    pub fn bus_path(&self) -> &str {
        &self.bus_path
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl RegisterTransport for LinuxI2c {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        check_transfer_len(bytes.len())?;
        self.bus
            .write(self.address, bytes)
            .map_err(|e| bus_error(e.kind()))?;
        Ok(bytes.len())
    }

    fn send_then_receive(
        &mut self,
        bytes: &[u8],
        read_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        check_transfer_len(bytes.len())?;
        check_transfer_len(read_len)?;

        let mut data = vec![0u8; read_len];
        self.bus
            .write_read(self.address, bytes, &mut data)
            .map_err(|e| bus_error(e.kind()))?;
        Ok(data)
    }
}

fn check_transfer_len(len: usize) -> Result<(), TransportError> {
    if len > MAX_TRANSFER {
        return Err(TransportError::TransferTooLong {
            len,
            max: MAX_TRANSFER,
        });
    }
    Ok(())
}

/// An address NACK means nothing answered at the slave address.
fn bus_error(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => TransportError::Disconnected,
        other => TransportError::Bus(other),
    }
}
