//! Decoding of Heart Rate Measurement notification payloads.
//!
//! Two decoders are provided:
//!
//! - [`decode_heart_rate`] reads an unsigned 16-bit little-endian value at
//!   offset 1 and ignores the flags byte. This is the default behavior and
//!   what [`DecoderMode::Literal`] selects.
//! - [`HeartRateMeasurement::parse`] follows the flags byte as defined by the
//!   Heart Rate Service: 8- or 16-bit value, sensor contact, energy expended
//!   and RR intervals. [`DecoderMode::Standard`] selects it.
//!
//! The two disagree whenever the flags byte declares an 8-bit value (the byte
//! after the value is then read as the high byte by the literal decoder) or the
//! payload is only two bytes long.

use bytes::Buf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::types::HeartRateReading;

/// Minimum payload length for [`decode_heart_rate`].
pub const MIN_LITERAL_PAYLOAD_BYTES: usize = 3;

/// Offset of the heart-rate value within the payload.
const VALUE_OFFSET: usize = 1;

// Flags byte bits
const FLAG_VALUE_U16: u8 = 0b0000_0001;
const FLAG_CONTACT_DETECTED: u8 = 0b0000_0010;
const FLAG_CONTACT_SUPPORTED: u8 = 0b0000_0100;
const FLAG_ENERGY_EXPENDED: u8 = 0b0000_1000;
const FLAG_RR_INTERVALS: u8 = 0b0001_0000;

/// Decode a Heart Rate Measurement payload as an unsigned 16-bit little-endian
/// integer at offset 1.
///
/// Byte 0 (the flags byte) is ignored entirely, so a payload declaring an
/// 8-bit value is still read as 16 bits.
///
/// # Errors
///
/// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
/// [`MIN_LITERAL_PAYLOAD_BYTES`].
///
/// # Examples
///
/// ```
/// use heartlink_types::decode_heart_rate;
///
/// let reading = decode_heart_rate(&[0x00, 0x4B, 0x00]).unwrap();
/// assert_eq!(reading.beats_per_minute, 75);
/// ```
#[must_use = "decoding returns a Result that should be handled"]
pub fn decode_heart_rate(data: &[u8]) -> ParseResult<HeartRateReading> {
    if data.len() < MIN_LITERAL_PAYLOAD_BYTES {
        return Err(ParseError::InsufficientBytes {
            expected: MIN_LITERAL_PAYLOAD_BYTES,
            actual: data.len(),
        });
    }

    let mut buf = &data[VALUE_OFFSET..];
    Ok(HeartRateReading::new(buf.get_u16_le()))
}

/// Sensor contact state reported in the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorContact {
    /// The sensor does not report skin contact.
    NotSupported,
    /// Supported, but no contact is detected.
    NotDetected,
    /// Supported and contact is detected.
    Detected,
}

/// A fully parsed Heart Rate Measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeartRateMeasurement {
    /// Heart rate in beats per minute.
    pub beats_per_minute: u16,
    /// Skin contact state.
    pub sensor_contact: SensorContact,
    /// Accumulated energy expended in kilojoules, if present.
    pub energy_expended: Option<u16>,
    /// RR intervals in units of 1/1024 second, oldest first.
    pub rr_intervals: Vec<u16>,
}

impl HeartRateMeasurement {
    /// Parse a payload according to its flags byte.
    ///
    /// A trailing odd byte after the RR intervals is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if the payload is shorter than
    /// the fields its flags byte declares.
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        let mut buf = data;
        if buf.remaining() < 1 {
            return Err(ParseError::InsufficientBytes {
                expected: 1,
                actual: 0,
            });
        }
        let flags = buf.get_u8();

        let value_len = if flags & FLAG_VALUE_U16 != 0 { 2 } else { 1 };
        let energy_len = if flags & FLAG_ENERGY_EXPENDED != 0 { 2 } else { 0 };
        let expected = 1 + value_len + energy_len;
        if data.len() < expected {
            return Err(ParseError::InsufficientBytes {
                expected,
                actual: data.len(),
            });
        }

        let beats_per_minute = if value_len == 2 {
            buf.get_u16_le()
        } else {
            u16::from(buf.get_u8())
        };

        let sensor_contact = match (
            flags & FLAG_CONTACT_SUPPORTED != 0,
            flags & FLAG_CONTACT_DETECTED != 0,
        ) {
            (false, _) => SensorContact::NotSupported,
            (true, false) => SensorContact::NotDetected,
            (true, true) => SensorContact::Detected,
        };

        let energy_expended = (energy_len > 0).then(|| buf.get_u16_le());

        let mut rr_intervals = Vec::new();
        if flags & FLAG_RR_INTERVALS != 0 {
            while buf.remaining() >= 2 {
                rr_intervals.push(buf.get_u16_le());
            }
        }

        Ok(Self {
            beats_per_minute,
            sensor_contact,
            energy_expended,
            rr_intervals,
        })
    }

    /// The bpm value as a [`HeartRateReading`].
    #[must_use]
    pub fn reading(&self) -> HeartRateReading {
        HeartRateReading::new(self.beats_per_minute)
    }
}

/// Which decoder turns notification payloads into readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DecoderMode {
    /// Fixed offset-1 u16 decode, flags ignored.
    #[default]
    Literal,
    /// Flags-aware decode.
    Standard,
}

impl DecoderMode {
    /// Decode `data` with this mode.
    ///
    /// # Errors
    ///
    /// Propagates the selected decoder's [`ParseError`].
    pub fn decode(&self, data: &[u8]) -> ParseResult<HeartRateReading> {
        match self {
            DecoderMode::Literal => decode_heart_rate(data),
            DecoderMode::Standard => HeartRateMeasurement::parse(data).map(|m| m.reading()),
        }
    }
}

impl core::str::FromStr for DecoderMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "literal" => Ok(DecoderMode::Literal),
            "standard" => Ok(DecoderMode::Standard),
            other => Err(ParseError::InvalidValue(format!(
                "unknown decoder mode '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Literal decoder ---

    #[test]
    fn test_literal_decodes_u16_at_offset_one() {
        let reading = decode_heart_rate(&[0x00, 0x4B, 0x00]).unwrap();
        assert_eq!(reading.beats_per_minute, 75);
    }

    #[test]
    fn test_literal_ignores_flags_byte() {
        // Flags bit 0 set: the literal decoder still reads u16 at offset 1
        let reading = decode_heart_rate(&[0x01, 0x4B, 0x00]).unwrap();
        assert_eq!(reading.beats_per_minute, 75);

        let reading = decode_heart_rate(&[0xFF, 0x4B, 0x00]).unwrap();
        assert_eq!(reading.beats_per_minute, 75);
    }

    #[test]
    fn test_literal_reads_high_byte_even_for_u8_format() {
        // 8-bit value 75 followed by energy-expended low byte 0x01
        let reading = decode_heart_rate(&[0x08, 0x4B, 0x01, 0x00]).unwrap();
        assert_eq!(reading.beats_per_minute, 0x014B);
    }

    #[test]
    fn test_literal_ignores_trailing_bytes() {
        let reading = decode_heart_rate(&[0x10, 0x3C, 0x00, 0x00, 0x04]).unwrap();
        assert_eq!(reading.beats_per_minute, 60);
    }

    #[test]
    fn test_literal_short_payload_is_an_error() {
        for len in 0..MIN_LITERAL_PAYLOAD_BYTES {
            let data = vec![0u8; len];
            let err = decode_heart_rate(&data).unwrap_err();
            assert_eq!(
                err,
                ParseError::InsufficientBytes {
                    expected: 3,
                    actual: len
                }
            );
        }
    }

    // --- Standard decoder ---

    #[test]
    fn test_standard_u8_value() {
        let m = HeartRateMeasurement::parse(&[0x00, 0x48]).unwrap();
        assert_eq!(m.beats_per_minute, 72);
        assert_eq!(m.sensor_contact, SensorContact::NotSupported);
        assert_eq!(m.energy_expended, None);
        assert!(m.rr_intervals.is_empty());
    }

    #[test]
    fn test_standard_u16_value() {
        let m = HeartRateMeasurement::parse(&[0x01, 0x2C, 0x01]).unwrap();
        assert_eq!(m.beats_per_minute, 300);
    }

    #[test]
    fn test_standard_contact_energy_and_rr() {
        let data = [
            0b0001_1110, // u8 value, contact supported+detected, energy, rr
            0x50,        // 80 bpm
            0x10, 0x00,  // energy 16 kJ
            0x00, 0x04,  // rr 1024
            0x00, 0x02,  // rr 512
        ];
        let m = HeartRateMeasurement::parse(&data).unwrap();
        assert_eq!(m.beats_per_minute, 80);
        assert_eq!(m.sensor_contact, SensorContact::Detected);
        assert_eq!(m.energy_expended, Some(16));
        assert_eq!(m.rr_intervals, vec![1024, 512]);
    }

    #[test]
    fn test_standard_contact_not_detected() {
        let m = HeartRateMeasurement::parse(&[0b0000_0100, 0x40]).unwrap();
        assert_eq!(m.sensor_contact, SensorContact::NotDetected);
    }

    #[test]
    fn test_standard_ignores_odd_trailing_byte() {
        let m = HeartRateMeasurement::parse(&[0x10, 0x40, 0x00, 0x04, 0x07]).unwrap();
        assert_eq!(m.rr_intervals, vec![1024]);
    }

    #[test]
    fn test_standard_insufficient_bytes() {
        assert!(HeartRateMeasurement::parse(&[]).is_err());
        assert_eq!(
            HeartRateMeasurement::parse(&[0x01, 0x4B]).unwrap_err(),
            ParseError::InsufficientBytes {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            HeartRateMeasurement::parse(&[0x08, 0x4B, 0x00]).unwrap_err(),
            ParseError::InsufficientBytes {
                expected: 4,
                actual: 3
            }
        );
    }

    // --- Mode selection ---

    #[test]
    fn test_modes_disagree_on_u8_payloads() {
        let data = [0x00, 0x4B, 0x01];
        assert_eq!(
            DecoderMode::Literal.decode(&data).unwrap().beats_per_minute,
            331
        );
        assert_eq!(
            DecoderMode::Standard.decode(&data).unwrap().beats_per_minute,
            75
        );
    }

    #[test]
    fn test_default_mode_is_literal() {
        assert_eq!(DecoderMode::default(), DecoderMode::Literal);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("literal".parse::<DecoderMode>().unwrap(), DecoderMode::Literal);
        assert_eq!("Standard".parse::<DecoderMode>().unwrap(), DecoderMode::Standard);
        assert!("fancy".parse::<DecoderMode>().is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn literal_matches_bytes_one_and_two(data in proptest::collection::vec(any::<u8>(), 3..32)) {
                let reading = decode_heart_rate(&data).unwrap();
                prop_assert_eq!(
                    reading.beats_per_minute,
                    u16::from_le_bytes([data[1], data[2]])
                );
            }

            #[test]
            fn standard_never_panics(data in proptest::collection::vec(any::<u8>(), 0..32)) {
                let _ = HeartRateMeasurement::parse(&data);
            }
        }
    }
}
