//! TCS34725 register map and protocol constants.
//!
//! Every register access on the bus starts with a command byte: the register
//! address with the command bit (0x80) set. [`Register::command_byte`] is the
//! only place that byte is built.

use std::time::Duration;

/// Fixed 7-bit slave address of the TCS3472x family.
pub const SLAVE_ADDRESS: u8 = 0x29;

/// Command bit that must be OR-ed into every register address.
pub const COMMAND_BIT: u8 = 0x80;

/// Value of the ID register for the TCS34725.
pub const EXPECTED_DEVICE_ID: u8 = 0x44;

/// ENABLE: power on (oscillator running).
pub const ENABLE_PON: u8 = 0x01;
/// ENABLE: RGBC ADC enable.
pub const ENABLE_AEN: u8 = 0x02;

/// STATUS: an RGBC integration cycle has completed.
pub const STATUS_AVALID: u8 = 0x01;

/// Minimum wait after each ENABLE write before the next command.
///
/// The internal oscillator and ADC need 2.4 ms to settle after PON; issuing
/// the next command earlier leaves the sensor in an undefined state.
pub const SETTLE_TIME: Duration = Duration::from_micros(2_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Enable = 0x00,
    Id = 0x12,
    Status = 0x13,
    /// Start of the CDATAL..BDATAH block (8 bytes).
    ClearDataLow = 0x14,
}

impl Register {
    pub fn address(self) -> u8 {
        self as u8
    }

    /// Address with [`COMMAND_BIT`] set, as sent on the bus.
    pub fn command_byte(self) -> u8 {
        self.address() | COMMAND_BIT
    }
}
