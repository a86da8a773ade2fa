//! Raw RGBC counts → gamma-corrected 8-bit RGB.
//!
//! Each color channel is expressed as a fraction of the clear (unfiltered)
//! channel, scaled to 0–255, clamped, then passed through [`GAMMA_TABLE`].
//! No I/O happens here.
//!
//! [`GAMMA_TABLE`]: crate::gamma::GAMMA_TABLE

use crate::gamma::gamma_correct;
use crate::types::{NormalizedColor, RawChannels};

/// Scale one color channel against the clear channel into 0–255.
///
/// `(channel * 255) / clear` with truncating integer division. Sensor noise can
/// push a color channel above clear; the result then saturates at 255.
/// `clear` must be non-zero.
pub fn scale_channel(channel: u16, clear: u16) -> u8 {
    debug_assert!(clear > 0, "scale_channel called with clear == 0");
    let scaled = u32::from(channel) * 255 / u32::from(clear);
    scaled.min(255) as u8
}

/// Normalize a raw sample. A zero clear reading means "no light" and maps to black.
pub fn normalize(raw: &RawChannels) -> NormalizedColor {
    if raw.clear == 0 {
        return NormalizedColor::BLACK;
    }

    // Clamp happens inside scale_channel, before the table lookup.
    NormalizedColor {
        red: gamma_correct(scale_channel(raw.red, raw.clear)),
        green: gamma_correct(scale_channel(raw.green, raw.clear)),
        blue: gamma_correct(scale_channel(raw.blue, raw.clear)),
    }
}
