//! Process data decoding.
//!
//! Temperature sensors report a 16-bit process data word as hex text
//! (`"0x00C8"`, `"c8"`, ...). The engineering value is the word divided by ten.

use thiserror::Error;

/// Divisor applied to the raw process data word.
pub const SCALE_DIVISOR: f64 = 10.0;

/// Minimum number of hex digits after padding.
const PAD_WIDTH: usize = 4;

/// Decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Empty process data")]
    Empty,
    #[error("Invalid hex process data '{0}'")]
    InvalidHex(String),
}

/// A decoded process data value.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Upper-case hex digits, left-padded to four.
    pub padded: String,
    /// Integer value of the word.
    pub word: u32,
    /// Engineering value.
    pub value: f64,
}

/// Decode hex process data into an engineering value.
pub fn decode_process_data(raw: &str) -> Result<Decoded, DecodeError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(DecodeError::Empty);
    }

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex(raw.to_string()));
    }

    let padded = format!("{:0>width$}", digits.to_ascii_uppercase(), width = PAD_WIDTH);
    let word =
        u32::from_str_radix(&padded, 16).map_err(|_| DecodeError::InvalidHex(raw.to_string()))?;

    Ok(Decoded {
        padded,
        word,
        value: word as f64 / SCALE_DIVISOR,
    })
}
