use chrono::{DateTime, Utc};

use crate::utils::error::DecodeError;

/// Query understood by every GMC counter; the answer carries no framing.
pub const GET_CPM_COMMAND: &[u8; 9] = b"<GETCPM>>";

/// One decoded counts-per-minute sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub cpm: u32,
    pub captured_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(cpm: u32, captured_at: DateTime<Utc>) -> Self {
        Self { cpm, captured_at }
    }
}

/// Interprets a `<GETCPM>>` answer as a big-endian unsigned integer.
pub fn decode(bytes: &[u8]) -> Result<u32, DecodeError> {
    match *bytes {
        [a, b, c, d] => Ok(u32::from_be_bytes([a, b, c, d])),
        [a, b] => Ok(u32::from(u16::from_be_bytes([a, b]))),
        _ => Err(DecodeError::InvalidWidth(bytes.len())),
    }
}

/// Decodes a response that must be exactly `width` bytes long and stamps it
/// with the current time.
pub fn decode_reading(bytes: &[u8], width: usize) -> Result<Reading, DecodeError> {
    if bytes.len() != width {
        return Err(DecodeError::WidthMismatch {
            expected: width,
            actual: bytes.len(),
        });
    }
    let cpm = decode(bytes)?;
    Ok(Reading::new(cpm, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_four_bytes_big_endian() {
        assert_eq!(decode(&[0xDE, 0xAD, 0xBE, 0xEF]), Ok(0xDEAD_BEEF));
        assert_eq!(decode(&[0x00, 0x00, 0x00, 0x05]), Ok(5));
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0xFF]), Ok(u32::MAX));
    }

    #[test]
    fn decodes_two_bytes_widened() {
        assert_eq!(decode(&[0x01, 0x02]), Ok(258));
        assert_eq!(decode(&[0xFF, 0xFF]), Ok(65_535));
    }

    #[test]
    fn rejects_other_widths() {
        for len in [0usize, 1, 3, 5, 8] {
            let bytes = vec![0u8; len];
            assert_eq!(decode(&bytes), Err(DecodeError::InvalidWidth(len)));
        }
    }

    #[test]
    fn reading_width_must_match_model() {
        assert_eq!(
            decode_reading(&[0x00, 0x2A], 4),
            Err(DecodeError::WidthMismatch { expected: 4, actual: 2 })
        );
        assert_eq!(decode_reading(&[0x00, 0x2A], 2).map(|r| r.cpm), Ok(42));
    }

    #[test]
    fn command_is_nine_ascii_bytes() {
        assert_eq!(GET_CPM_COMMAND.len(), 9);
        assert!(GET_CPM_COMMAND.is_ascii());
    }
}
