//! Closed command set for the query boundary.
//!
//! A command code selects one of the two supported queries; the reply is a
//! fixed-size little-endian payload matching [`RawChannels`] (8 bytes) or
//! [`NormalizedColor`] (3 bytes).

use crate::types::{NormalizedColor, RawChannels};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command code: {0}")]
    Unknown(u8),
    #[error("payload length mismatch: expected {expected}, got {actual}")]
    PayloadLength { expected: usize, actual: usize },
}

/// Queries a client can issue against the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Raw clear/red/green/blue counts.
    GetRawColors = 1,
    /// Gamma-corrected 8-bit RGB.
    GetRgbColors = 2,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::GetRawColors, Command::GetRgbColors];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Size of the reply payload for this command.
    pub fn payload_len(self) -> usize {
        match self {
            Command::GetRawColors => RawChannels::LEN,
            Command::GetRgbColors => NormalizedColor::LEN,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = CommandError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Command::GetRawColors),
            2 => Ok(Command::GetRgbColors),
            other => Err(CommandError::Unknown(other)),
        }
    }
}

/// Result of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Raw(RawChannels),
    Rgb(NormalizedColor),
}

impl Reply {
    /// Command this reply answers.
    pub fn command(&self) -> Command {
        match self {
            Reply::Raw(_) => Command::GetRawColors,
            Reply::Rgb(_) => Command::GetRgbColors,
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            Reply::Raw(raw) => raw.to_le_bytes().to_vec(),
            Reply::Rgb(color) => color.to_bytes().to_vec(),
        }
    }

    /// Decode a payload received for `command`.
    pub fn decode(command: Command, payload: &[u8]) -> Result<Self, CommandError> {
        let length_error = || CommandError::PayloadLength {
            expected: command.payload_len(),
            actual: payload.len(),
        };
        match command {
            Command::GetRawColors => {
                let bytes: [u8; RawChannels::LEN] =
                    payload.try_into().map_err(|_| length_error())?;
                Ok(Reply::Raw(RawChannels::from_le_bytes(bytes)))
            }
            Command::GetRgbColors => {
                let bytes: [u8; NormalizedColor::LEN] =
                    payload.try_into().map_err(|_| length_error())?;
                Ok(Reply::Rgb(NormalizedColor::from_bytes(bytes)))
            }
        }
    }
}
