//! Typed value decoders for M-Bus record payloads.
//!
//! Implements the data types of EN 13757-3:2018 Annex A and the LVAR
//! variable-length interpretation of Table 5. All multi-byte numbers are
//! little-endian on the wire. Each fixed-width numeric type reserves one bit
//! pattern as an "invalid" marker used by meters to signal sensor errors or
//! uninitialized values; those decode to [`MBusValue::NotAvailable`] instead
//! of a number.

use crate::error::ProtocolError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Decoded value of a single data record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MBusValue {
    /// Type B: two's-complement signed integer.
    Signed(i64),
    /// Type C: unsigned integer.
    Unsigned(u64),
    /// Type A: BCD number, exposed as the decoded integer.
    Bcd(i64),
    /// Type H: IEEE 754 float32, widened.
    Float(f64),
    /// Type D: boolean bit array, LSB of the first byte first.
    Bits(Vec<bool>),
    /// Type G: calendar date.
    Date(MBusDate),
    /// Types F and I: calendar date with time of day.
    DateTime(MBusDateTime),
    /// Type J: time of day.
    Time(MBusTime),
    /// LVAR text (ISO 8859-1) or plain-text content.
    Text(String),
    /// Uninterpreted bytes: type K/L/M payloads, oversized LVAR binaries and
    /// manufacturer-specific record data.
    Bytes(Vec<u8>),
    /// The record carries no data (DIF data field 0x00).
    NoData,
    /// The device sent the type's invalid marker instead of a value.
    NotAvailable,
}

impl MBusValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MBusValue::Signed(v) => Some(*v as f64),
            MBusValue::Unsigned(v) => Some(*v as f64),
            MBusValue::Bcd(v) => Some(*v as f64),
            MBusValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Calendar date from a CP16/CP48 field. `None` components encode the
/// recurring "every ..." wildcard patterns of Annex A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MBusDate {
    /// Full year; `None` means "every year" (raw 127).
    pub year: Option<i32>,
    /// 1..=12; `None` means "every month" (raw 15).
    pub month: Option<u8>,
    /// 1..=31; `None` means "every day" (raw 0).
    pub day: Option<u8>,
}

impl MBusDate {
    /// Chrono view, available when no wildcard is present.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month? as u32, self.day? as u32)
    }
}

/// Time of day from a CP24/CP32/CP48 field, with wildcard support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MBusTime {
    /// 0..=23; `None` means "every hour" (raw 31).
    pub hour: Option<u8>,
    /// 0..=59; `None` means "every minute" (raw 63).
    pub minute: Option<u8>,
    /// 0..=59; `None` when the type carries no seconds or "every second".
    pub second: Option<u8>,
}

impl MBusTime {
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(
            self.hour? as u32,
            self.minute? as u32,
            self.second.unwrap_or(0) as u32,
        )
    }
}

/// Combined date and time from a CP32 (type F) or CP48 (type I) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MBusDateTime {
    pub date: MBusDate,
    pub time: MBusTime,
    /// Summer-time flag of the encoding.
    pub summer_time: bool,
}

impl MBusDateTime {
    pub fn to_naive_date_time(&self) -> Option<NaiveDateTime> {
        Some(NaiveDateTime::new(
            self.date.to_naive_date()?,
            self.time.to_naive_time()?,
        ))
    }
}

// ----------------------------------------------------------------------------
// Numeric types
// ----------------------------------------------------------------------------

/// Type A: unsigned BCD, little-endian nibble stream. An F nibble in the most
/// significant position marks a negative number (Annex B); nibbles A..E are
/// device error codes and yield `NotAvailable`.
pub fn decode_bcd(data: &[u8]) -> MBusValue {
    let mut value: u128 = 0;
    for &byte in data.iter().rev() {
        value = (value << 8) | byte as u128;
    }

    let mut result: i64 = 0;
    let mut multiplier: i64 = 1;
    while value > 0 {
        let digit = (value & 0x0F) as u8;
        value >>= 4;
        if digit > 9 {
            if value == 0 && digit == 0x0F {
                return MBusValue::Bcd(-result);
            }
            return MBusValue::NotAvailable;
        }
        result += digit as i64 * multiplier;
        multiplier *= 10;
    }
    MBusValue::Bcd(result)
}

/// Type B: little-endian two's complement. The most negative value of the
/// width is the invalid marker.
pub fn decode_signed(data: &[u8]) -> MBusValue {
    let width = data.len();
    let mut value: i64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= (byte as i64) << (8 * i);
    }
    // Sign-extend from the wire width.
    let shift = 64 - 8 * width as u32;
    value = (value << shift) >> shift;

    if value == i64::MIN >> shift {
        return MBusValue::NotAvailable;
    }
    MBusValue::Signed(value)
}

/// Type C: little-endian unsigned. The all-ones value is the invalid marker.
/// Fields wider than 64 bits are preserved as raw bytes.
pub fn decode_unsigned(data: &[u8]) -> MBusValue {
    if data.len() > 8 {
        return MBusValue::Bytes(data.to_vec());
    }
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= (byte as u64) << (8 * i);
    }
    if data.len() < 8 && value == (1u64 << (8 * data.len() as u32)) - 1 {
        return MBusValue::NotAvailable;
    }
    if data.len() == 8 && value == u64::MAX {
        return MBusValue::NotAvailable;
    }
    MBusValue::Unsigned(value)
}

/// Type H: IEEE 754 float32, little-endian. NaN is the invalid marker.
pub fn decode_float(data: &[u8]) -> Result<MBusValue, ProtocolError> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| ProtocolError::PayloadTruncated)?;
    let value = f32::from_le_bytes(bytes);
    if value.is_nan() {
        return Ok(MBusValue::NotAvailable);
    }
    Ok(MBusValue::Float(value as f64))
}

/// Type D: boolean bit array, bit 0 of the first byte first.
pub fn decode_bits(data: &[u8]) -> MBusValue {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for bit in 0..8 {
            bits.push(byte & (1 << bit) != 0);
        }
    }
    MBusValue::Bits(bits)
}

// ----------------------------------------------------------------------------
// Date and time types
// ----------------------------------------------------------------------------

fn check_month(month: u8) -> Result<Option<u8>, ProtocolError> {
    match month {
        15 => Ok(None),
        1..=12 => Ok(Some(month)),
        _ => Err(ProtocolError::InvalidDateTime("month out of range")),
    }
}

fn check_minute(minute: u8) -> Result<Option<u8>, ProtocolError> {
    match minute {
        63 => Ok(None),
        0..=59 => Ok(Some(minute)),
        _ => Err(ProtocolError::InvalidDateTime("minute out of range")),
    }
}

fn check_second(second: u8) -> Result<Option<u8>, ProtocolError> {
    match second {
        63 => Ok(None),
        0..=59 => Ok(Some(second)),
        _ => Err(ProtocolError::InvalidDateTime("second out of range")),
    }
}

fn check_hour(hour: u8) -> Result<Option<u8>, ProtocolError> {
    match hour {
        31 => Ok(None),
        0..=23 => Ok(Some(hour)),
        _ => Err(ProtocolError::InvalidDateTime("hour out of range")),
    }
}

fn check_day(day: u8) -> Option<u8> {
    // 0 encodes "every day"; 1..=31 fits the 5-bit field.
    if day == 0 {
        None
    } else {
        Some(day)
    }
}

/// Two-digit year spread over the high bits of a date field pair:
/// bits 5..7 of `low` and bits 4..7 of `high`.
fn split_year(low: u8, high: u8) -> u8 {
    ((high >> 1) & 0x78) | (low >> 5)
}

fn check_year(raw: u8, century_base: i32) -> Result<Option<i32>, ProtocolError> {
    match raw {
        127 => Ok(None),
        0..=99 => Ok(Some(century_base + raw as i32)),
        _ => Err(ProtocolError::InvalidDateTime("year out of range")),
    }
}

/// Type G: date CP16. Years count from 2000. 0xFFFF is the invalid marker.
pub fn decode_date_cp16(data: &[u8]) -> Result<MBusValue, ProtocolError> {
    let bytes: [u8; 2] = data
        .try_into()
        .map_err(|_| ProtocolError::PayloadTruncated)?;
    if bytes == [0xFF, 0xFF] {
        return Ok(MBusValue::NotAvailable);
    }

    let date = MBusDate {
        day: check_day(bytes[0] & 0x1F),
        month: check_month(bytes[1] & 0x0F)?,
        year: check_year(split_year(bytes[0], bytes[1]), 2000)?,
    };
    Ok(MBusValue::Date(date))
}

/// Type F: date and time CP32. The IV bit (bit 7 of the first byte) marks an
/// invalid value. Years count from 1900 plus the two hundred-year bits.
pub fn decode_datetime_cp32(data: &[u8]) -> Result<MBusValue, ProtocolError> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| ProtocolError::PayloadTruncated)?;
    if bytes[0] & 0x80 != 0 {
        return Ok(MBusValue::NotAvailable);
    }

    let hundred_year = (bytes[1] >> 5) & 0x03;
    let value = MBusDateTime {
        time: MBusTime {
            minute: check_minute(bytes[0] & 0x3F)?,
            hour: check_hour(bytes[1] & 0x1F)?,
            second: None,
        },
        date: MBusDate {
            day: check_day(bytes[2] & 0x1F),
            month: check_month(bytes[3] & 0x0F)?,
            year: check_year(
                split_year(bytes[2], bytes[3]),
                1900 + 100 * hundred_year as i32,
            )?,
        },
        summer_time: bytes[1] & 0x80 != 0,
    };
    Ok(MBusValue::DateTime(value))
}

/// Type J: time CP24. 0xFFFFFF is the invalid marker.
pub fn decode_time_cp24(data: &[u8]) -> Result<MBusValue, ProtocolError> {
    let bytes: [u8; 3] = data
        .try_into()
        .map_err(|_| ProtocolError::PayloadTruncated)?;
    if bytes == [0xFF, 0xFF, 0xFF] {
        return Ok(MBusValue::NotAvailable);
    }

    let time = MBusTime {
        second: check_second(bytes[0] & 0x3F)?,
        minute: check_minute(bytes[1] & 0x3F)?,
        hour: check_hour(bytes[2] & 0x1F)?,
    };
    Ok(MBusValue::Time(time))
}

/// Type I: date and time CP48 with seconds. The IV bit (bit 7 of the second
/// byte) marks an invalid value. Years count from 2000.
pub fn decode_datetime_cp48(data: &[u8]) -> Result<MBusValue, ProtocolError> {
    let bytes: [u8; 6] = data
        .try_into()
        .map_err(|_| ProtocolError::PayloadTruncated)?;
    if bytes[1] & 0x80 != 0 {
        return Ok(MBusValue::NotAvailable);
    }

    let year_raw = ((bytes[4] >> 4) << 3) | (bytes[3] >> 5);
    let value = MBusDateTime {
        time: MBusTime {
            second: check_second(bytes[0] & 0x3F)?,
            minute: check_minute(bytes[1] & 0x3F)?,
            hour: check_hour(bytes[2] & 0x1F)?,
        },
        date: MBusDate {
            day: check_day(bytes[3] & 0x1F),
            month: check_month(bytes[4] & 0x0F)?,
            year: check_year(year_raw, 2000)?,
        },
        summer_time: bytes[0] & 0x40 != 0,
    };
    Ok(MBusValue::DateTime(value))
}

// ----------------------------------------------------------------------------
// LVAR (EN 13757-3 Table 5)
// ----------------------------------------------------------------------------

/// Number of data bytes that follow an LVAR length byte.
pub fn lvar_length(lvar: u8) -> Result<usize, ProtocolError> {
    match lvar {
        0x00..=0xBF => Ok(lvar as usize),
        0xC0..=0xC9 => Ok((lvar - 0xC0) as usize),
        0xD0..=0xD9 => Ok((lvar - 0xD0) as usize),
        0xE0..=0xEF => Ok((lvar - 0xE0) as usize),
        0xF0..=0xF4 => Ok(4 * (lvar - 0xEC) as usize),
        0xF5 => Ok(48),
        0xF6 => Ok(64),
        _ => Err(ProtocolError::InvalidLvar(lvar)),
    }
}

/// Decodes LVAR data according to its length byte: text, signed BCD or
/// binary. Binary fields wider than 8 bytes are preserved as raw bytes.
pub fn decode_lvar(lvar: u8, data: &[u8]) -> Result<MBusValue, ProtocolError> {
    match lvar {
        0x00..=0xBF => Ok(MBusValue::Text(
            data.iter().map(|&b| b as char).collect(),
        )),
        0xC0..=0xC9 => match decode_bcd(data) {
            MBusValue::Bcd(v) if v < 0 => Err(ProtocolError::InvalidBcd(lvar)),
            other => Ok(other),
        },
        0xD0..=0xD9 => match decode_bcd(data) {
            MBusValue::Bcd(v) if v < 0 => Err(ProtocolError::InvalidBcd(lvar)),
            MBusValue::Bcd(v) => Ok(MBusValue::Bcd(-v)),
            other => Ok(other),
        },
        // 0xE0..=0xEF binaries span 0..15 bytes; anything past 64 bits comes
        // back as raw bytes, like the large 0xF0..=0xF6 ranges.
        0xE0..=0xEF => Ok(decode_unsigned(data)),
        0xF0..=0xF6 => Ok(MBusValue::Bytes(data.to_vec())),
        _ => Err(ProtocolError::InvalidLvar(lvar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_decodes_little_endian_digits() {
        assert_eq!(decode_bcd(&[0x34, 0x12]), MBusValue::Bcd(1234));
        assert_eq!(decode_bcd(&[0x78, 0x56, 0x34, 0x12]), MBusValue::Bcd(12345678));
        assert_eq!(decode_bcd(&[0x00, 0x00]), MBusValue::Bcd(0));
    }

    #[test]
    fn bcd_sign_nibble_negates() {
        // F in the most significant nibble: -12345 over 3 bytes.
        assert_eq!(decode_bcd(&[0x45, 0x23, 0xF1]), MBusValue::Bcd(-12345));
    }

    #[test]
    fn bcd_error_nibble_is_not_available() {
        assert_eq!(decode_bcd(&[0x3A, 0x12]), MBusValue::NotAvailable);
        assert_eq!(decode_bcd(&[0x34, 0xB2]), MBusValue::NotAvailable);
    }

    #[test]
    fn signed_widths_and_sentinels() {
        assert_eq!(decode_signed(&[0xD2, 0x04, 0x00, 0x00]), MBusValue::Signed(1234));
        assert_eq!(decode_signed(&[0xFF]), MBusValue::Signed(-1));
        assert_eq!(decode_signed(&[0xFE, 0xFF, 0xFF]), MBusValue::Signed(-2));
        // Most negative value of each width is the invalid marker.
        assert_eq!(decode_signed(&[0x80]), MBusValue::NotAvailable);
        assert_eq!(decode_signed(&[0x00, 0x80]), MBusValue::NotAvailable);
        assert_eq!(
            decode_signed(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x80]),
            MBusValue::NotAvailable
        );
    }

    #[test]
    fn unsigned_all_ones_is_not_available() {
        assert_eq!(decode_unsigned(&[0x2A, 0x00]), MBusValue::Unsigned(42));
        assert_eq!(decode_unsigned(&[0xFF, 0xFF]), MBusValue::NotAvailable);
        assert_eq!(decode_unsigned(&[0xFF; 8]), MBusValue::NotAvailable);
    }

    #[test]
    fn float_nan_is_not_available() {
        assert_eq!(
            decode_float(&1.5f32.to_le_bytes()).unwrap(),
            MBusValue::Float(1.5)
        );
        assert_eq!(
            decode_float(&f32::NAN.to_le_bytes()).unwrap(),
            MBusValue::NotAvailable
        );
    }

    #[test]
    fn bits_lsb_first() {
        assert_eq!(
            decode_bits(&[0b0000_0101]),
            MBusValue::Bits(vec![true, false, true, false, false, false, false, false])
        );
    }

    #[test]
    fn date_cp16() {
        // 2008-05-31: year low bits in byte 0 bits 5..7, high bits in
        // byte 1 bits 4..7.
        let b0: u8 = ((8 & 0x07) << 5) | 31;
        let b1: u8 = (((8 >> 3) & 0x0F) << 4) | 5;
        let decoded = decode_date_cp16(&[b0, b1]).unwrap();
        assert_eq!(
            decoded,
            MBusValue::Date(MBusDate {
                year: Some(2008),
                month: Some(5),
                day: Some(31),
            })
        );
    }

    #[test]
    fn date_cp16_invalid_marker_and_wildcards() {
        assert_eq!(decode_date_cp16(&[0xFF, 0xFF]).unwrap(), MBusValue::NotAvailable);
        // day=0 (every day), month=15 (every month), year=127 (every year)
        let b0: u8 = 0x07 << 5; // year low bits 111, day 0
        let b1: u8 = (0x0F << 4) | 0x0F;
        match decode_date_cp16(&[b0, b1]).unwrap() {
            MBusValue::Date(d) => {
                assert_eq!(d.day, None);
                assert_eq!(d.month, None);
                assert_eq!(d.year, None);
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn datetime_cp32() {
        // 2013-04-25 14:30, no summer time: year 13 -> low 101, high 0001
        let minute = 30u8;
        let hour = 14u8;
        let day = 25u8;
        let month = 4u8;
        let year = 13u8;
        let bytes = [
            minute,
            hour, // hundred_year bits 5-6 = 01 -> +100 over 1900
            ((year & 0x07) << 5) | day,
            ((year >> 3) << 4) | month,
        ];
        let bytes = [bytes[0], bytes[1] | (1 << 5), bytes[2], bytes[3]];
        match decode_datetime_cp32(&bytes).unwrap() {
            MBusValue::DateTime(dt) => {
                assert_eq!(dt.date.year, Some(2013));
                assert_eq!(dt.date.month, Some(4));
                assert_eq!(dt.date.day, Some(25));
                assert_eq!(dt.time.hour, Some(14));
                assert_eq!(dt.time.minute, Some(30));
                assert!(!dt.summer_time);
                assert_eq!(
                    dt.to_naive_date_time(),
                    NaiveDate::from_ymd_opt(2013, 4, 25).and_then(|d| d.and_hms_opt(14, 30, 0))
                );
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn datetime_cp32_iv_bit() {
        assert_eq!(
            decode_datetime_cp32(&[0x80, 0x00, 0x01, 0x01]).unwrap(),
            MBusValue::NotAvailable
        );
    }

    #[test]
    fn datetime_cp32_rejects_bad_month() {
        let err = decode_datetime_cp32(&[0x00, 0x00, 0x01, 0x0E]).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidDateTime("month out of range"));
    }

    #[test]
    fn time_cp24() {
        match decode_time_cp24(&[45, 30, 14]).unwrap() {
            MBusValue::Time(t) => {
                assert_eq!(t.hour, Some(14));
                assert_eq!(t.minute, Some(30));
                assert_eq!(t.second, Some(45));
            }
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(
            decode_time_cp24(&[0xFF, 0xFF, 0xFF]).unwrap(),
            MBusValue::NotAvailable
        );
    }

    #[test]
    fn datetime_cp48() {
        // 2020-12-01 23:59:58
        let year = 20u8;
        let bytes = [
            58,
            59,
            23,
            ((year & 0x07) << 5) | 1,
            ((year >> 3) << 4) | 12,
            0,
        ];
        match decode_datetime_cp48(&bytes).unwrap() {
            MBusValue::DateTime(dt) => {
                assert_eq!(dt.date.year, Some(2020));
                assert_eq!(dt.date.month, Some(12));
                assert_eq!(dt.date.day, Some(1));
                assert_eq!(dt.time.second, Some(58));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn lvar_ranges() {
        assert_eq!(lvar_length(0x00).unwrap(), 0);
        assert_eq!(lvar_length(0xBF).unwrap(), 191);
        assert_eq!(lvar_length(0xC5).unwrap(), 5);
        assert_eq!(lvar_length(0xD9).unwrap(), 9);
        assert_eq!(lvar_length(0xE4).unwrap(), 4);
        assert_eq!(lvar_length(0xF0).unwrap(), 16);
        assert_eq!(lvar_length(0xF4).unwrap(), 32);
        assert_eq!(lvar_length(0xF5).unwrap(), 48);
        assert_eq!(lvar_length(0xF6).unwrap(), 64);
        assert_eq!(lvar_length(0xCA).unwrap_err(), ProtocolError::InvalidLvar(0xCA));
        assert_eq!(lvar_length(0xFF).unwrap_err(), ProtocolError::InvalidLvar(0xFF));
    }

    #[test]
    fn lvar_text_keeps_transmission_order() {
        assert_eq!(
            decode_lvar(0x03, b"abc").unwrap(),
            MBusValue::Text("abc".into())
        );
    }

    #[test]
    fn lvar_binary_wider_than_64_bits_stays_raw() {
        // 0xE9: 9-byte binary, one byte past what u64 can hold.
        let data = [0x11u8, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];
        assert_eq!(lvar_length(0xE9).unwrap(), 9);
        assert_eq!(
            decode_lvar(0xE9, &data).unwrap(),
            MBusValue::Bytes(data.to_vec())
        );
        // The widest small-binary code behaves the same.
        assert_eq!(
            decode_lvar(0xEF, &[0xAB; 15]).unwrap(),
            MBusValue::Bytes(vec![0xAB; 15])
        );
        assert_eq!(decode_unsigned(&[0x00; 9]), MBusValue::Bytes(vec![0x00; 9]));
    }

    #[test]
    fn lvar_bcd_signs() {
        assert_eq!(decode_lvar(0xC2, &[0x34, 0x12]).unwrap(), MBusValue::Bcd(1234));
        assert_eq!(decode_lvar(0xD2, &[0x34, 0x12]).unwrap(), MBusValue::Bcd(-1234));
        // An F sign nibble inside LVAR BCD is illegal.
        assert!(decode_lvar(0xD2, &[0x34, 0xF2]).is_err());
    }
}
