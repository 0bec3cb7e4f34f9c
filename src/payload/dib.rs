//! DIF / DIFE chain parsing (Data Information Block).
//!
//! The DIF carries the data-field code, the function code and the lowest
//! storage-number bit; every DIFE that follows widens storage number, tariff
//! and subunit. The chain terminates at the first byte with a clear extension
//! bit and may hold at most ten DIFEs. A trailing DIFE of 0x00 (the "final
//! DIFE") re-labels the storage number as an OBIS register number.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::payload::Direction;
use serde::Serialize;

/// Function field of a record (DIF bits 4..5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MBusFunction {
    Instantaneous,
    Maximum,
    Minimum,
    Error,
}

impl MBusFunction {
    fn from_dif(dif: u8) -> Self {
        match dif & MBUS_DIF_FUNCTION_MASK {
            0x00 => MBusFunction::Instantaneous,
            0x10 => MBusFunction::Maximum,
            0x20 => MBusFunction::Minimum,
            _ => MBusFunction::Error,
        }
    }
}

/// Data-field code of the DIF (bits 0..3), resolved to a storage class.
///
/// Special function codes (0x0F etc.) never reach this type; the record
/// parser handles them before the DIB is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataField {
    /// 0x00: no data.
    None,
    /// Binary integer of the given byte width (1, 2, 3, 4, 6 or 8).
    Integer(usize),
    /// 0x05: 32 bit IEEE 754 float.
    Real,
    /// 0x08: selection for readout (master to slave only).
    Selection,
    /// BCD of the given byte width (1, 2, 3, 4 or 6).
    Bcd(usize),
    /// 0x0D: variable length, resolved by the LVAR byte.
    Variable,
}

impl DataField {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => DataField::None,
            0x01 => DataField::Integer(1),
            0x02 => DataField::Integer(2),
            0x03 => DataField::Integer(3),
            0x04 => DataField::Integer(4),
            0x05 => DataField::Real,
            0x06 => DataField::Integer(6),
            0x07 => DataField::Integer(8),
            0x08 => DataField::Selection,
            0x09 => DataField::Bcd(1),
            0x0A => DataField::Bcd(2),
            0x0B => DataField::Bcd(3),
            0x0C => DataField::Bcd(4),
            0x0D => DataField::Variable,
            _ => DataField::Bcd(6), // 0x0E; 0x0F is handled before DIB parsing
        }
    }

    /// Fixed byte length of the data, `None` for variable-length fields.
    pub fn length(&self) -> Option<usize> {
        match self {
            DataField::None | DataField::Selection => Some(0),
            DataField::Integer(n) | DataField::Bcd(n) => Some(*n),
            DataField::Real => Some(4),
            DataField::Variable => None,
        }
    }
}

/// Parsed Data Information Block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dib {
    /// Raw DIF byte.
    pub dif: u8,
    /// Raw DIFE bytes in wire order.
    pub dife: Vec<u8>,
    /// Resolved data-field code.
    pub data_field: DataField,
    /// Function of the value.
    pub function: MBusFunction,
    /// Accumulated storage number (up to 41 bits with ten DIFEs).
    pub storage_number: u64,
    /// Accumulated tariff (2 bits per DIFE).
    pub tariff: u32,
    /// Accumulated subunit / device unit (1 bit per DIFE).
    pub subunit: u32,
    /// A final DIFE (0x00) marked the storage number as a register number.
    pub register_number: bool,
}

impl Dib {
    /// Wire representation of the DIF/DIFE chain.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.dife.len());
        bytes.push(self.dif);
        bytes.extend_from_slice(&self.dife);
        bytes
    }
}

/// Parses a DIF/DIFE chain from the front of `input`, returning the rest.
///
/// The caller is expected to have filtered the special DIF codes (0x0F, 0x1F,
/// 0x2F, 0x7F) already; this function rejects codes that are illegal in the
/// given direction (readout selection and global readout in responses).
pub fn parse_dib(input: &[u8], direction: Direction) -> Result<(&[u8], Dib), ProtocolError> {
    let (&dif, mut rest) = input.split_first().ok_or(ProtocolError::PayloadTruncated)?;

    let field_code = dif & MBUS_DIF_DATA_FIELD_MASK;
    let data_field = DataField::from_code(field_code);
    if data_field == DataField::Selection && direction == Direction::SlaveToMaster {
        return Err(ProtocolError::UnexpectedDif(dif));
    }

    let mut dib = Dib {
        dif,
        dife: Vec::new(),
        data_field,
        function: MBusFunction::from_dif(dif),
        storage_number: ((dif & MBUS_DIF_STORAGE_BIT) >> 6) as u64,
        tariff: 0,
        subunit: 0,
        register_number: false,
    };

    let mut extended = dif & MBUS_EXTENSION_BIT != 0;
    while extended {
        let (&dife, tail) = rest.split_first().ok_or(ProtocolError::PayloadTruncated)?;
        rest = tail;
        extended = dife & MBUS_EXTENSION_BIT != 0;

        if dife == 0x00 {
            // Final DIFE: storage number is an OBIS register number. It
            // occupies a chain slot but contributes no bits and is always
            // the last field (extension bit clear by definition).
            dib.dife.push(dife);
            dib.register_number = true;
            break;
        }

        // Zero-based index of this DIFE among the value-carrying extensions.
        let k = dib.dife.len() as u32;
        if k as usize >= MBUS_DIFE_MAX_CHAIN {
            return Err(ProtocolError::DifeChainTooLong);
        }
        dib.dife.push(dife);

        dib.storage_number |= ((dife & MBUS_DIFE_STORAGE_MASK) as u64) << (1 + 4 * k);
        dib.tariff |= (((dife & MBUS_DIFE_TARIFF_MASK) >> 4) as u32) << (2 * k);
        dib.subunit |= (((dife & MBUS_DIFE_SUBUNIT_MASK) >> 6) as u32) << k;
    }

    Ok((rest, dib))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Dib {
        let (rest, dib) = parse_dib(bytes, Direction::SlaveToMaster).unwrap();
        assert!(rest.is_empty());
        dib
    }

    #[test]
    fn data_field_lengths_match_table_4() {
        let cases = [
            (0x00, Some(0)),
            (0x01, Some(1)),
            (0x02, Some(2)),
            (0x03, Some(3)),
            (0x04, Some(4)),
            (0x05, Some(4)),
            (0x06, Some(6)),
            (0x07, Some(8)),
            (0x08, Some(0)),
            (0x09, Some(1)),
            (0x0A, Some(2)),
            (0x0B, Some(3)),
            (0x0C, Some(4)),
            (0x0D, None),
            (0x0E, Some(6)),
        ];
        for (code, expected) in cases {
            assert_eq!(DataField::from_code(code).length(), expected, "code {code:#04x}");
        }
    }

    #[test]
    fn plain_dif_fields() {
        let dib = parse(&[0x04]);
        assert_eq!(dib.data_field, DataField::Integer(4));
        assert_eq!(dib.function, MBusFunction::Instantaneous);
        assert_eq!(dib.storage_number, 0);
        assert_eq!(dib.tariff, 0);
        assert_eq!(dib.subunit, 0);

        let dib = parse(&[0x54]);
        assert_eq!(dib.function, MBusFunction::Maximum);
        assert_eq!(dib.storage_number, 1);

        assert_eq!(parse(&[0x24]).function, MBusFunction::Minimum);
        assert_eq!(parse(&[0x34]).function, MBusFunction::Error);
    }

    #[test]
    fn dife_accumulation_shifts() {
        // DIF storage bit plus DIFE 0x4F (storage 1111, subunit 1).
        let dib = parse(&[0xC4, 0x4F]);
        assert_eq!(dib.storage_number, 1 | (0x0F << 1));
        assert_eq!(dib.subunit, 1);
        assert_eq!(dib.tariff, 0);

        // Two DIFEs: second contributes at shifted positions.
        // DIFE1 0x81 (ext, storage 0001), DIFE2 0x32 (tariff 11, storage 0010).
        let dib = parse(&[0x84, 0x81, 0x32]);
        assert_eq!(dib.storage_number, (0x01 << 1) | (0x02 << 5));
        assert_eq!(dib.tariff, 0b11 << 2);
        assert_eq!(dib.subunit, 0);
    }

    #[test]
    fn accumulation_is_monotone() {
        // Adding DIFE bytes never decreases storage, tariff or subunit.
        let base = parse(&[0xC4, 0x41]);
        let wider = parse(&[0xC4, 0xC1, 0x72]);
        assert!(wider.storage_number >= base.storage_number);
        assert!(wider.tariff >= base.tariff);
        assert!(wider.subunit >= base.subunit);
    }

    #[test]
    fn final_dife_sets_register_number() {
        let dib = parse(&[0x84, 0x00]);
        assert!(dib.register_number);
        assert_eq!(dib.storage_number, 0);
    }

    #[test]
    fn dife_chain_cap() {
        // Ten DIFEs parse, eleven do not.
        let mut bytes = vec![0x84];
        bytes.extend(std::iter::repeat(0x81).take(9));
        bytes.push(0x01);
        assert!(parse_dib(&bytes, Direction::SlaveToMaster).is_ok());

        let mut bytes = vec![0x84];
        bytes.extend(std::iter::repeat(0x81).take(10));
        bytes.push(0x01);
        assert_eq!(
            parse_dib(&bytes, Direction::SlaveToMaster).unwrap_err(),
            ProtocolError::DifeChainTooLong
        );
    }

    #[test]
    fn selection_rejected_in_responses() {
        assert_eq!(
            parse_dib(&[0x08], Direction::SlaveToMaster).unwrap_err(),
            ProtocolError::UnexpectedDif(0x08)
        );
        assert!(parse_dib(&[0x08], Direction::MasterToSlave).is_ok());
    }

    #[test]
    fn truncated_chain_errors() {
        assert_eq!(
            parse_dib(&[0x84], Direction::SlaveToMaster).unwrap_err(),
            ProtocolError::PayloadTruncated
        );
    }
}
