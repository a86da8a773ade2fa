//! tcs-hw — Hardware access for the TCS34725 RGBC color sensor.
//!
//! Provides the register transport contract, a Linux i2c-dev transport,
//! and the power/acquisition sequencer built on top of them.

pub mod i2c;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod registers;
pub mod sensor;
pub mod transport;

pub use i2c::LinuxI2c;
pub use sensor::{DeviceSession, SensorError, SensorStatus};
pub use transport::{RegisterTransport, TransportError};
