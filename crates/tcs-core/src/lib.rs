//! tcs-core — Data model and color math for the TCS34725 RGBC sensor.
//!
//! Holds the channel types, the fixed gamma table, the clear-relative
//! normalizer and the closed command set used at the query boundary.
//! Nothing in this crate touches hardware.

pub mod command;
pub mod gamma;
pub mod normalize;
pub mod types;

pub use command::{Command, CommandError, Reply};
pub use normalize::normalize;
pub use types::{NormalizedColor, RawChannels};
