//! Variable-data-structure parsing: the RSP_UD payload behind CI 0x72/0x7A.
//!
//! A datagram is a fixed header (identification for CI 0x72, access/status
//! only for CI 0x7A) followed by data records. Each record is a DIF/DIFE
//! chain, a VIF/VIFE chain and the value bytes. Three special DIF codes
//! break the sequence: 0x2F is padding, 0x1F announces a further datagram,
//! and 0x0F turns the remainder of the payload into an opaque manufacturer
//! trailer.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::mbus::frame::MBusFrame;
use crate::payload::data::{self, MBusValue};
use crate::payload::dib::{parse_dib, DataField, Dib};
use crate::payload::vif::{parse_vib, TypeHint, Vib};
use crate::payload::Direction;
use log::debug;
use serde::Serialize;

/// One decoded data record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MBusRecord {
    pub dib: Dib,
    pub vib: Vib,
    /// Typed raw value, before scaling.
    pub value: MBusValue,
    /// The value bytes as they appeared on the wire (without the LVAR byte).
    pub raw_data: Vec<u8>,
}

impl MBusRecord {
    /// Unit text resolved from the VIB (table unit or plain-text unit).
    pub fn unit(&self) -> Option<&str> {
        self.vib.unit.as_deref()
    }

    /// Description of the measured quantity.
    pub fn quantity(&self) -> Option<&str> {
        self.vib.description
    }

    pub fn function(&self) -> crate::payload::dib::MBusFunction {
        self.dib.function
    }

    pub fn storage_number(&self) -> u64 {
        self.dib.storage_number
    }

    pub fn tariff(&self) -> u32 {
        self.dib.tariff
    }

    pub fn subunit(&self) -> u32 {
        self.dib.subunit
    }

    /// Final numeric value with every VIF/VIFE scaling step applied, when
    /// the value is numeric.
    pub fn scaled_value(&self) -> Option<f64> {
        self.value.as_f64().map(|v| self.vib.scale(v))
    }
}

/// Status byte of the variable-data header. The core exposes the bits; it
/// does not act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusByte(pub u8);

impl StatusByte {
    /// Application-error code (bits 0..1): 0 none, 1 busy, 2 any error, 3 reserved.
    pub fn application_error(&self) -> u8 {
        self.0 & MBUS_STATUS_APPLICATION_MASK
    }

    pub fn power_low(&self) -> bool {
        self.0 & MBUS_STATUS_POWER_LOW != 0
    }

    pub fn permanent_error(&self) -> bool {
        self.0 & MBUS_STATUS_PERMANENT_ERROR != 0
    }

    pub fn temporary_error(&self) -> bool {
        self.0 & MBUS_STATUS_TEMPORARY_ERROR != 0
    }

    /// Manufacturer/application-specific bits 5..7, unshifted.
    pub fn application_specific(&self) -> u8 {
        self.0 & MBUS_STATUS_APPLICATION_SPECIFIC
    }
}

/// Identification block of the CI 0x72 long header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MBusIdentification {
    /// Device identification number (8 BCD digits).
    pub serial: u32,
    /// Three-letter manufacturer code.
    pub manufacturer: String,
    /// Generation / version byte.
    pub version: u8,
    /// Medium byte (water, heat, electricity, ...).
    pub medium: u8,
}

/// Decoded variable-data datagram (CI 0x72 or 0x7A).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MBusUserData {
    pub address: u8,
    pub access_number: u8,
    pub status: StatusByte,
    pub signature: u16,
    /// Present for the long header (CI 0x72) only.
    pub identification: Option<MBusIdentification>,
    pub records: Vec<MBusRecord>,
    /// A DIF 0x1F announced another datagram.
    pub more_records_follow: bool,
    /// Verbatim bytes following a DIF 0x0F, if any.
    pub manufacturer_data: Vec<u8>,
}

/// Result of interpreting a long frame's application payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MBusDatagram {
    /// CI 0x72 / 0x7A variable data response.
    VariableData(MBusUserData),
    /// Any other CI: payload preserved verbatim.
    Opaque { ci: u8, address: u8, payload: Vec<u8> },
}

/// Decodes the two-byte manufacturer field into its three-letter code.
pub fn decode_manufacturer(id: u16) -> String {
    let mut id = id as u32;
    let mut out = String::with_capacity(3);
    out.push(char::from_u32((id / (32 * 32)) + 64).unwrap_or('?'));
    id %= 32 * 32;
    out.push(char::from_u32((id / 32) + 64).unwrap_or('?'));
    id %= 32;
    out.push(char::from_u32(id + 64).unwrap_or('?'));
    out
}

/// Interprets a decoded long frame's payload according to its CI field.
pub fn decode_user_data(frame: &MBusFrame) -> Result<MBusDatagram, ProtocolError> {
    let (address, ci, payload) = match frame {
        MBusFrame::Long {
            address,
            ci,
            payload,
            ..
        } => (*address, *ci, payload.as_slice()),
        MBusFrame::Ack => return Err(ProtocolError::UnexpectedFrameKind("ack")),
        MBusFrame::Short { .. } => return Err(ProtocolError::UnexpectedFrameKind("short")),
    };

    let (identification, rest) = match ci {
        MBUS_CI_RESP_VARIABLE => {
            if payload.len() < MBUS_HEADER_LONG_LEN {
                return Err(ProtocolError::PayloadTruncated);
            }
            let serial = match data::decode_bcd(&payload[0..4]) {
                MBusValue::Bcd(v) => v as u32,
                // Some meters use hexadecimal identification numbers; keep
                // the raw little-endian value in that case.
                _ => u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            };
            let manufacturer =
                decode_manufacturer(u16::from_le_bytes([payload[4], payload[5]]));
            let identification = MBusIdentification {
                serial,
                manufacturer,
                version: payload[6],
                medium: payload[7],
            };
            (Some(identification), &payload[8..])
        }
        MBUS_CI_RESP_VARIABLE_SHORT => {
            if payload.len() < MBUS_HEADER_SHORT_LEN {
                return Err(ProtocolError::PayloadTruncated);
            }
            (None, payload)
        }
        other => {
            debug!("CI 0x{other:02X} is not a variable data response, returning opaque payload");
            return Ok(MBusDatagram::Opaque {
                ci: other,
                address,
                payload: payload.to_vec(),
            });
        }
    };

    // Both header forms end with access number, status and signature.
    let access_number = rest[0];
    let status = StatusByte(rest[1]);
    let signature = u16::from_le_bytes([rest[2], rest[3]]);
    let body = &rest[4..];

    let (records, more_records_follow, manufacturer_data) =
        parse_records(body, Direction::SlaveToMaster)?;

    Ok(MBusDatagram::VariableData(MBusUserData {
        address,
        access_number,
        status,
        signature,
        identification,
        records,
        more_records_follow,
        manufacturer_data,
    }))
}

/// Parses the record section of a variable-data payload.
///
/// Returns the records in payload order, the more-records-follow flag and
/// the manufacturer trailer bytes.
pub fn parse_records(
    payload: &[u8],
    direction: Direction,
) -> Result<(Vec<MBusRecord>, bool, Vec<u8>), ProtocolError> {
    let mut records = Vec::new();
    let mut more_records_follow = false;
    let mut manufacturer_data = Vec::new();
    let mut rest = payload;

    while let Some((&first, tail)) = rest.split_first() {
        match first {
            MBUS_DIF_IDLE_FILLER => {
                rest = tail;
            }
            MBUS_DIF_MANUFACTURER_SPECIFIC => {
                manufacturer_data = tail.to_vec();
                rest = &[];
            }
            MBUS_DIF_MORE_RECORDS_FOLLOW => {
                // Some devices place 0x1F mid-payload with further records
                // behind it, others send it last; keep parsing either way.
                more_records_follow = true;
                rest = tail;
            }
            MBUS_DIF_GLOBAL_READOUT if direction == Direction::SlaveToMaster => {
                return Err(ProtocolError::UnexpectedDif(first));
            }
            _ => {
                let (next, record) = parse_record(rest, direction)?;
                rest = next;
                records.push(record);
            }
        }
    }

    Ok((records, more_records_follow, manufacturer_data))
}

/// Parses one complete record (DIB, VIB, value bytes) from the cursor.
fn parse_record(
    input: &[u8],
    direction: Direction,
) -> Result<(&[u8], MBusRecord), ProtocolError> {
    let (rest, dib) = parse_dib(input, direction)?;
    let (mut rest, mut vib) = parse_vib(rest, direction)?;

    // The plain-text unit string follows the VIB: one length byte, then the
    // characters in reverse reading order.
    if vib.plain_text_unit {
        let (&len, tail) = rest.split_first().ok_or(ProtocolError::PayloadTruncated)?;
        let len = len as usize;
        if tail.len() < len {
            return Err(ProtocolError::PayloadTruncated);
        }
        vib.unit = Some(tail[..len].iter().rev().map(|&b| b as char).collect());
        rest = &tail[len..];
    }

    let (rest, value, raw_data) = decode_value(rest, &dib, &vib)?;

    Ok((
        rest,
        MBusRecord {
            dib,
            vib,
            value,
            raw_data,
        },
    ))
}

/// Concrete decoding strategy resolved from the DIF data field and the VIF
/// type constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodePlan {
    NoData,
    Signed(usize),
    Unsigned(usize),
    Bcd(usize),
    Float,
    Bits(usize),
    Date,
    Time,
    DateTimeShort,
    DateTimeLong,
    Raw(usize),
    Lvar,
}

fn resolve_plan(field: DataField, hint: TypeHint) -> Result<DecodePlan, ProtocolError> {
    let plan = match field {
        DataField::None | DataField::Selection => DecodePlan::NoData,
        DataField::Real => DecodePlan::Float,
        DataField::Bcd(n) => DecodePlan::Bcd(n),
        DataField::Variable => DecodePlan::Lvar,
        DataField::Integer(n) => match hint {
            TypeHint::Default => DecodePlan::Signed(n),
            TypeHint::Unsigned => DecodePlan::Unsigned(n),
            TypeHint::Boolean => DecodePlan::Bits(n),
            TypeHint::Date => match n {
                2 => DecodePlan::Date,
                _ => return Err(ProtocolError::InvalidDateTime("date VIF needs a 16 bit field")),
            },
            TypeHint::DateTime | TypeHint::DateOrDateTime => match n {
                2 if hint == TypeHint::DateOrDateTime => DecodePlan::Date,
                3 => DecodePlan::Time,
                4 => DecodePlan::DateTimeShort,
                6 => DecodePlan::DateTimeLong,
                _ => {
                    return Err(ProtocolError::InvalidDateTime(
                        "date/time VIF with unsupported field width",
                    ))
                }
            },
            // Types K and L have no standard value interpretation here;
            // their bytes are preserved.
            TypeHint::DstInfo | TypeHint::ListeningWindow => DecodePlan::Raw(n),
        },
    };
    Ok(plan)
}

fn decode_value<'a>(
    input: &'a [u8],
    dib: &Dib,
    vib: &Vib,
) -> Result<(&'a [u8], MBusValue, Vec<u8>), ProtocolError> {
    let plan = resolve_plan(dib.data_field, vib.hint)?;

    // Fixed-width fields know their length from the DIF; LVAR reads it from
    // the first payload byte.
    let (length, rest) = match plan {
        DecodePlan::Lvar => {
            let (&lvar, tail) = input.split_first().ok_or(ProtocolError::PayloadTruncated)?;
            (data::lvar_length(lvar)?, tail)
        }
        _ => {
            let length = dib
                .data_field
                .length()
                .ok_or(ProtocolError::PayloadTruncated)?;
            (length, input)
        }
    };
    if rest.len() < length {
        return Err(ProtocolError::PayloadTruncated);
    }
    let (raw, rest) = rest.split_at(length);

    // Manufacturer-specific VIFs make the value bytes opaque regardless of
    // the data field.
    if vib.manufacturer_specific {
        return Ok((rest, MBusValue::Bytes(raw.to_vec()), raw.to_vec()));
    }

    let value = match plan {
        DecodePlan::NoData => MBusValue::NoData,
        DecodePlan::Signed(_) => data::decode_signed(raw),
        DecodePlan::Unsigned(_) => data::decode_unsigned(raw),
        DecodePlan::Bcd(_) => data::decode_bcd(raw),
        DecodePlan::Float => data::decode_float(raw)?,
        DecodePlan::Bits(_) => data::decode_bits(raw),
        DecodePlan::Date => data::decode_date_cp16(raw)?,
        DecodePlan::Time => data::decode_time_cp24(raw)?,
        DecodePlan::DateTimeShort => data::decode_datetime_cp32(raw)?,
        DecodePlan::DateTimeLong => data::decode_datetime_cp48(raw)?,
        DecodePlan::Raw(_) => MBusValue::Bytes(raw.to_vec()),
        DecodePlan::Lvar => {
            // The LVAR byte sits immediately before `raw`.
            let lvar = input[0];
            data::decode_lvar(lvar, raw)?
        }
    };

    Ok((rest, value, raw.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::dib::MBusFunction;

    fn parse(payload: &[u8]) -> (Vec<MBusRecord>, bool, Vec<u8>) {
        parse_records(payload, Direction::SlaveToMaster).unwrap()
    }

    #[test]
    fn single_energy_record() {
        // DIF 0x04 (32 bit signed), VIF 0x03 (energy x1 Wh), value 1234.
        let (records, more, trailer) = parse(&[0x04, 0x03, 0xD2, 0x04, 0x00, 0x00]);
        assert_eq!(records.len(), 1);
        assert!(!more);
        assert!(trailer.is_empty());
        let record = &records[0];
        assert_eq!(record.value, MBusValue::Signed(1234));
        assert_eq!(record.unit(), Some("Wh"));
        assert_eq!(record.scaled_value(), Some(1234.0));
        assert_eq!(record.function(), MBusFunction::Instantaneous);
    }

    #[test]
    fn record_byte_accounting() {
        // Consumed bytes = (1 + dife) + (1 + vife) + data length.
        let payload = [0x84u8, 0x01, 0x93, 0x74, 0xE8, 0x03, 0x00, 0x00];
        let (rest, record) = parse_record(&payload, Direction::SlaveToMaster).unwrap();
        assert!(rest.is_empty());
        let consumed = payload.len() - rest.len();
        assert_eq!(
            consumed,
            (1 + record.dib.dife.len()) + (1 + record.vib.vife.len()) + record.raw_data.len()
        );
    }

    #[test]
    fn idle_filler_skipped() {
        let (records, _, _) = parse(&[0x2F, 0x2F, 0x01, 0x03, 0x2A, 0x2F]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, MBusValue::Signed(42));
    }

    #[test]
    fn manufacturer_trailer() {
        let (records, more, trailer) = parse(&[0x01, 0x03, 0x2A, 0x0F, 0xDE, 0xAD, 0xBE]);
        assert_eq!(records.len(), 1);
        assert!(!more);
        assert_eq!(trailer, vec![0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn manufacturer_trailer_at_start() {
        // DIF 0x0F first: no records, whole rest is trailer.
        let (records, _, trailer) = parse(&[0x0F, 0x01, 0x02, 0x03]);
        assert!(records.is_empty());
        assert_eq!(trailer, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn more_records_follow_mid_payload() {
        let (records, more, _) = parse(&[0x01, 0x03, 0x2A, 0x1F, 0x01, 0x03, 0x2B]);
        assert!(more);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value, MBusValue::Signed(43));
    }

    #[test]
    fn more_records_follow_as_last_byte() {
        let (records, more, _) = parse(&[0x01, 0x03, 0x2A, 0x1F]);
        assert!(more);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn global_readout_rejected_in_response() {
        let err = parse_records(&[0x7F], Direction::SlaveToMaster).unwrap_err();
        assert_eq!(err, ProtocolError::UnexpectedDif(0x7F));
    }

    #[test]
    fn date_record() {
        // DIF 0x02 (16 bit), VIF 0x6C (date), 2008-05-31 per type G.
        let (records, _, _) = parse(&[0x02, 0x6C, 0x1F, 0x15]);
        match &records[0].value {
            MBusValue::Date(d) => {
                assert_eq!(d.year, Some(2008));
                assert_eq!(d.month, Some(5));
                assert_eq!(d.day, Some(31));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn lvar_text_record() {
        // DIF 0x0D (variable), VIF 0x78 (fabrication no), LVAR 3, "abc".
        let (records, _, _) = parse(&[0x0D, 0x78, 0x03, b'a', b'b', b'c']);
        assert_eq!(records[0].value, MBusValue::Text("abc".into()));
    }

    #[test]
    fn plain_text_unit_record() {
        // VIF 0x7C, unit "kWh" transmitted reversed, then a 1 byte value.
        let payload = [0x01, 0x7C, 0x03, b'h', b'W', b'k', 0x07];
        let (records, _, _) = parse(&payload);
        assert_eq!(records[0].unit(), Some("kWh"));
        assert_eq!(records[0].value, MBusValue::Signed(7));
    }

    #[test]
    fn truncated_value_is_an_error() {
        let err = parse_records(&[0x04, 0x03, 0xD2, 0x04], Direction::SlaveToMaster).unwrap_err();
        assert_eq!(err, ProtocolError::PayloadTruncated);
    }

    #[test]
    fn decode_manufacturer_letters() {
        // 0x0442 decodes to "ABB" (libmbus test vector: A=1, B=2).
        let id = (1 << 10) | (2 << 5) | 2;
        assert_eq!(decode_manufacturer(id), "ABB");
    }

    #[test]
    fn long_header_datagram() {
        let mut payload = vec![
            0x78, 0x56, 0x34, 0x12, // serial 12345678 BCD
            0x42, 0x04, // manufacturer "ABB" little-endian
            0x01, // version
            0x07, // medium (water)
            0x55, // access number
            0x00, // status
            0x00, 0x00, // signature
        ];
        payload.extend_from_slice(&[0x04, 0x03, 0xD2, 0x04, 0x00, 0x00]);
        let frame = MBusFrame::Long {
            control: MBUS_CONTROL_RSP_UD,
            address: 1,
            ci: MBUS_CI_RESP_VARIABLE,
            payload,
        };
        match decode_user_data(&frame).unwrap() {
            MBusDatagram::VariableData(data) => {
                let ident = data.identification.unwrap();
                assert_eq!(ident.serial, 12345678);
                assert_eq!(ident.manufacturer, "ABB");
                assert_eq!(ident.medium, 0x07);
                assert_eq!(data.access_number, 0x55);
                assert_eq!(data.records.len(), 1);
            }
            other => panic!("unexpected datagram {other:?}"),
        }
    }

    #[test]
    fn short_header_datagram() {
        let frame = MBusFrame::Long {
            control: MBUS_CONTROL_RSP_UD,
            address: 9,
            ci: MBUS_CI_RESP_VARIABLE_SHORT,
            payload: vec![0x2A, 0x10, 0x00, 0x00, 0x01, 0x03, 0x05],
        };
        match decode_user_data(&frame).unwrap() {
            MBusDatagram::VariableData(data) => {
                assert!(data.identification.is_none());
                assert_eq!(data.access_number, 0x2A);
                assert!(data.status.temporary_error());
                assert_eq!(data.records[0].value, MBusValue::Signed(5));
            }
            other => panic!("unexpected datagram {other:?}"),
        }
    }

    #[test]
    fn unknown_ci_is_opaque() {
        let frame = MBusFrame::Long {
            control: MBUS_CONTROL_RSP_UD,
            address: 3,
            ci: 0x70,
            payload: vec![0x08],
        };
        match decode_user_data(&frame).unwrap() {
            MBusDatagram::Opaque { ci, payload, .. } => {
                assert_eq!(ci, 0x70);
                assert_eq!(payload, vec![0x08]);
            }
            other => panic!("unexpected datagram {other:?}"),
        }
    }
}
