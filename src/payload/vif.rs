//! VIF / VIFE chain resolution (Value Information Block).
//!
//! A VIB starts with a primary VIF and continues while the extension bit is
//! set. Codes 0xFB and 0xFD redirect the next byte into an extension table;
//! after a unit-defining code, further VIFEs come from the combinable
//! (orthogonal) table, whose 0xFC code in turn redirects into the combinable
//! extension table. The chain is capped at ten VIFEs.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::payload::vif_tables::{lookup, VifEntry, VifTable};
use crate::payload::Direction;
use serde::Serialize;

/// Numeric scaling attached to a VIF/VIFE code. Range codes keep their
/// exponent in the low bits of the code byte, so a transform is applied as
/// `(transform, code)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Transform {
    /// No scaling.
    Identity,
    /// `value * 10^((code & mask) + offset)`
    Decimal { mask: u8, offset: i32 },
    /// `value * 10^((code & mask) + offset) / divisor` (per-hour and
    /// per-minute flow units normalised to per-second).
    DecimalOver { mask: u8, offset: i32, divisor: f64 },
    /// `value * factor`
    Fixed(f64),
    /// `value * 2^exponent` (heat cost allocator rating factors).
    BinaryPow(i32),
    /// `value + 10^((code & mask) + offset)` (additive correction constant).
    DecimalAdd { mask: u8, offset: i32 },
}

impl Transform {
    /// Applies the transform to a raw value, using the low bits of `code`
    /// where the transform is a range entry.
    pub fn apply(&self, value: f64, code: u8) -> f64 {
        match *self {
            Transform::Identity => value,
            Transform::Decimal { mask, offset } => {
                value * 10f64.powi((code & mask) as i32 + offset)
            }
            Transform::DecimalOver {
                mask,
                offset,
                divisor,
            } => value * 10f64.powi((code & mask) as i32 + offset) / divisor,
            Transform::Fixed(factor) => value * factor,
            Transform::BinaryPow(exp) => value * 2f64.powi(exp),
            Transform::DecimalAdd { mask, offset } => {
                value + 10f64.powi((code & mask) as i32 + offset)
            }
        }
    }
}

/// Data-type constraint a VIF imposes on the record's DIF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeHint {
    /// Numeric value: BCD, signed integer, float or LVAR per the DIF.
    Default,
    /// Unsigned integer (type C).
    Unsigned,
    /// Boolean bit array (type D).
    Boolean,
    /// Calendar date, type G (CP16).
    Date,
    /// Date and time: type F (CP32), I (CP48) or J (CP24) per the DIF width.
    DateTime,
    /// Date or date-and-time, type G allowed as well.
    DateOrDateTime,
    /// Daylight-saving information, type K (kept as raw bytes).
    DstInfo,
    /// Listening-window management, type L (kept as raw bytes).
    ListeningWindow,
}

/// Parsed Value Information Block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vib {
    /// Raw primary VIF byte.
    pub vif: u8,
    /// Raw VIFE bytes in wire order (including extension-pointer bytes).
    pub vife: Vec<u8>,
    /// Description of the quantity, from the resolved table entry.
    pub description: Option<&'static str>,
    /// Unit text. Static for table units; owned for plain-text VIF units.
    pub unit: Option<String>,
    /// Data-type constraint for value decoding.
    pub hint: TypeHint,
    /// Combinable-VIFE annotations (phase, per-tariff, accumulation, ...).
    pub modifiers: Vec<&'static str>,
    /// Record errors the slave reported through error VIFEs.
    pub record_errors: Vec<&'static str>,
    /// A manufacturer-specific VIF/VIFE made the rest of the chain opaque.
    pub manufacturer_specific: bool,
    /// VIF 0x7C: the unit string follows the VIB in the payload.
    pub plain_text_unit: bool,
    /// Scaling steps in chain order, each with its code byte.
    transforms: Vec<(Transform, u8)>,
}

impl Vib {
    /// Applies every scaling step of the chain to a raw numeric value.
    pub fn scale(&self, raw: f64) -> f64 {
        self.transforms
            .iter()
            .fold(raw, |value, (transform, code)| {
                transform.apply(value, *code)
            })
    }

    /// Wire representation of the VIF/VIFE chain.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.vife.len());
        bytes.push(self.vif);
        bytes.extend_from_slice(&self.vife);
        bytes
    }
}

/// Parses a VIF/VIFE chain from the front of `input`, returning the rest.
///
/// The plain-text unit string (VIF 0x7C) is *not* consumed here; it follows
/// the complete VIB in the payload and is read by the record parser when
/// [`Vib::plain_text_unit`] is set.
pub fn parse_vib(input: &[u8], direction: Direction) -> Result<(&[u8], Vib), ProtocolError> {
    let (&vif, mut rest) = input.split_first().ok_or(ProtocolError::PayloadTruncated)?;

    let mut vib = Vib {
        vif,
        vife: Vec::new(),
        description: None,
        unit: None,
        hint: TypeHint::Default,
        modifiers: Vec::new(),
        record_errors: Vec::new(),
        manufacturer_specific: false,
        plain_text_unit: false,
        transforms: Vec::new(),
    };

    let mut table = VifTable::Primary;
    let mut code = vif;

    loop {
        let row = lookup(table, code, direction).ok_or(ProtocolError::UnknownVif {
            code,
            table: table.name(),
        })?;

        let mut next_table = VifTable::Combinable;
        match row.entry {
            VifEntry::Unit {
                description,
                unit,
                transform,
                hint,
            } => {
                vib.description = Some(description);
                if vib.unit.is_none() {
                    vib.unit = unit.map(str::to_owned);
                }
                vib.hint = hint;
                if transform != Transform::Identity {
                    vib.transforms.push((transform, code));
                }
            }
            VifEntry::Duration { description, units } => {
                vib.description = Some(description);
                let index = (code as usize) & (units.len() - 1);
                vib.unit = Some(units[index].to_owned());
            }
            VifEntry::Modifier {
                description,
                transform,
                hint,
            } => {
                vib.modifiers.push(description);
                if let Some(hint) = hint {
                    vib.hint = hint;
                }
                if let Some(transform) = transform {
                    vib.transforms.push((transform, code));
                }
            }
            VifEntry::Action(description) => {
                vib.modifiers.push(description);
            }
            VifEntry::RecordError(description) => {
                vib.record_errors.push(description);
            }
            VifEntry::PlainText => {
                vib.description = Some("Plain-text unit");
                vib.plain_text_unit = true;
            }
            VifEntry::AnyVif => {
                vib.description = Some("Any VIF");
            }
            VifEntry::ManufacturerSpecific => {
                // The remainder of the chain carries no standard semantics;
                // consume it without table lookups.
                vib.manufacturer_specific = true;
                let mut extended = code & MBUS_EXTENSION_BIT != 0;
                while extended {
                    let (&vife, tail) =
                        rest.split_first().ok_or(ProtocolError::PayloadTruncated)?;
                    if vib.vife.len() >= MBUS_VIFE_MAX_CHAIN {
                        return Err(ProtocolError::VifeChainTooLong);
                    }
                    vib.vife.push(vife);
                    rest = tail;
                    extended = vife & MBUS_EXTENSION_BIT != 0;
                }
                return Ok((rest, vib));
            }
            VifEntry::Extension(target) => {
                next_table = target;
            }
        }

        if code & MBUS_EXTENSION_BIT == 0 {
            break;
        }

        let (&vife, tail) = rest.split_first().ok_or(ProtocolError::PayloadTruncated)?;
        if vib.vife.len() >= MBUS_VIFE_MAX_CHAIN {
            return Err(ProtocolError::VifeChainTooLong);
        }
        vib.vife.push(vife);
        rest = tail;

        table = next_table;
        code = vife;
    }

    Ok((rest, vib))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Vib {
        let (rest, vib) = parse_vib(bytes, Direction::SlaveToMaster).unwrap();
        assert!(rest.is_empty());
        vib
    }

    #[test]
    fn primary_energy_range() {
        // VIF 0x03: energy, 10^(3-3) = x1 Wh.
        let vib = parse(&[0x03]);
        assert_eq!(vib.description, Some("Energy"));
        assert_eq!(vib.unit.as_deref(), Some("Wh"));
        assert_eq!(vib.scale(1234.0), 1234.0);

        // VIF 0x04: x10 Wh.
        let vib = parse(&[0x04]);
        assert_eq!(vib.scale(1234.0), 12340.0);
    }

    #[test]
    fn primary_volume_range() {
        // VIF 0x13: volume, 10^(3-6) m³ = litres expressed in m³.
        let vib = parse(&[0x13]);
        assert_eq!(vib.unit.as_deref(), Some("m³"));
        assert!((vib.scale(1000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_unit_from_low_bits() {
        assert_eq!(parse(&[0x20]).unit.as_deref(), Some("s"));
        assert_eq!(parse(&[0x21]).unit.as_deref(), Some("min"));
        assert_eq!(parse(&[0x22]).unit.as_deref(), Some("h"));
        assert_eq!(parse(&[0x23]).unit.as_deref(), Some("d"));
        assert_eq!(parse(&[0x23]).description, Some("On time"));
    }

    #[test]
    fn first_extension_pointer() {
        // 0xFB 0x1A: relative humidity, 10^(0-1) %.
        let vib = parse(&[0xFB, 0x1A]);
        assert_eq!(vib.description, Some("Relative humidity"));
        assert_eq!(vib.unit.as_deref(), Some("%"));
        assert!((vib.scale(500.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn second_extension_pointer() {
        // 0xFD 0x48: voltage, 10^(8-9) V.
        let vib = parse(&[0xFD, 0x48]);
        assert_eq!(vib.description, Some("Voltage"));
        assert_eq!(vib.unit.as_deref(), Some("V"));
        assert!((vib.scale(2305.0) - 230.5).abs() < 1e-9);
    }

    #[test]
    fn second_level_extension() {
        // 0xFD 0xFD 0x03: remaining battery lifetime in years.
        let vib = parse(&[0xFD, 0xFD, 0x03]);
        assert_eq!(vib.description, Some("Remaining battery lifetime"));
        assert_eq!(vib.unit.as_deref(), Some("years"));
    }

    #[test]
    fn combinable_multiplicative_correction() {
        // Energy x1 Wh with VIFE 0x73: correction 10^(3-6) = 1e-3.
        let vib = parse(&[0x83, 0x73]);
        assert_eq!(vib.vife, vec![0x73]);
        assert!((vib.scale(1000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn combinable_additive_correction() {
        // Energy x1 Wh with VIFE 0x7B: +10^(3-3) = +1.
        let vib = parse(&[0x83, 0x7B]);
        assert!((vib.scale(41.0) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn combinable_extension_phase() {
        // Voltage at phase L3: FD C8 (ext) FC (ext) 03.
        let vib = parse(&[0xFD, 0xC8, 0xFC, 0x03]);
        assert_eq!(vib.description, Some("Voltage"));
        assert_eq!(vib.modifiers, vec!["At phase L3"]);
    }

    #[test]
    fn record_error_vife() {
        let vib = parse(&[0x93, 0x16]);
        assert_eq!(vib.record_errors, vec!["Data overflow"]);
    }

    #[test]
    fn data_type_forcing_vife() {
        // Energy with "data presented with type C": 0x93 FC 11... 0xFC is in
        // the combinable table, type forcing in the combinable extension.
        let vib = parse(&[0x93, 0xFC, 0x11]);
        assert_eq!(vib.hint, TypeHint::Unsigned);
    }

    #[test]
    fn manufacturer_specific_tail_is_opaque() {
        let vib = parse(&[0xFF, 0x83, 0x12]);
        assert!(vib.manufacturer_specific);
        assert_eq!(vib.vife, vec![0x83, 0x12]);
    }

    #[test]
    fn plain_text_flag() {
        let vib = parse(&[0x7C]);
        assert!(vib.plain_text_unit);
    }

    #[test]
    fn unknown_vif_is_reported_with_table() {
        let err = parse_vib(&[0xFB, 0x7E], Direction::SlaveToMaster).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnknownVif {
                code: 0x7E,
                table: "first extension",
            }
        );
    }

    #[test]
    fn vife_chain_cap() {
        // Ten combinable VIFEs are fine, eleven are not.
        let mut bytes = vec![0x83];
        bytes.extend(std::iter::repeat(0xA0).take(9));
        bytes.push(0x20);
        assert!(parse_vib(&bytes, Direction::SlaveToMaster).is_ok());

        let mut bytes = vec![0x83];
        bytes.extend(std::iter::repeat(0xA0).take(10));
        bytes.push(0x20);
        assert_eq!(
            parse_vib(&bytes, Direction::SlaveToMaster).unwrap_err(),
            ProtocolError::VifeChainTooLong
        );
    }

    #[test]
    fn date_hint() {
        assert_eq!(parse(&[0x6C]).hint, TypeHint::Date);
        assert_eq!(parse(&[0x6D]).hint, TypeHint::DateTime);
    }
}
