use serde::{Deserialize, Serialize};

/// One RGBC acquisition: raw 16-bit counts per photodiode channel.
///
/// Produced fresh by every read; the driver never caches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChannels {
    pub clear: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl RawChannels {
    /// Wire size of a burst read starting at CDATAL (4 channels × 2 bytes).
    pub const LEN: usize = 8;

    /// Decode the 8-byte CDATAL..BDATAH burst.
    ///
    /// Channel order is clear, red, green, blue; each pair is low byte first.
    pub fn from_le_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self {
            clear: u16::from_le_bytes([bytes[0], bytes[1]]),
            red: u16::from_le_bytes([bytes[2], bytes[3]]),
            green: u16::from_le_bytes([bytes[4], bytes[5]]),
            blue: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Encode in the same layout the sensor uses on the bus.
    pub fn to_le_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..2].copy_from_slice(&self.clear.to_le_bytes());
        out[2..4].copy_from_slice(&self.red.to_le_bytes());
        out[4..6].copy_from_slice(&self.green.to_le_bytes());
        out[6..8].copy_from_slice(&self.blue.to_le_bytes());
        out
    }
}

/// Gamma-corrected 8-bit RGB derived from a [`RawChannels`] sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl NormalizedColor {
    pub const LEN: usize = 3;

    pub const BLACK: Self = Self {
        red: 0,
        green: 0,
        blue: 0,
    };

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self {
            red: bytes[0],
            green: bytes[1],
            blue: bytes[2],
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [self.red, self.green, self.blue]
    }

    /// `#rrggbb` form, lowercase.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}
