//! VIF / VIFE descriptor tables (EN 13757-3:2018, Tables 10 to 16).
//!
//! Each table is a flat list of `(code, mask, entry)` rows scanned linearly;
//! a row matches when `byte & mask == code`. Range codes keep their exponent
//! in the low bits, which the row's [`Transform`] reads at apply time. The
//! default mask 0x7F strips the extension bit, so a row matches a code with
//! or without a continuation; extension-pointer rows match the full byte.

use crate::payload::vif::{Transform, TypeHint};
use crate::payload::Direction;

/// Which chain directions a row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Both,
    SlaveToMaster,
    MasterToSlave,
}

impl Applies {
    fn matches(self, direction: Direction) -> bool {
        match self {
            Applies::Both => true,
            Applies::SlaveToMaster => direction == Direction::SlaveToMaster,
            Applies::MasterToSlave => direction == Direction::MasterToSlave,
        }
    }
}

/// Identifier of a VIF/VIFE lookup table; extension pointers name their
/// target table through this enum rather than holding a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VifTable {
    /// Table 10, entered with the primary VIF.
    Primary,
    /// Table 14, entered through primary VIF 0xFB.
    FirstExtension,
    /// Table 12, entered through primary VIF 0xFD.
    SecondExtension,
    /// Second level of Table 12, entered through 0xFD 0xFD.
    SecondExtensionAlt,
    /// Table 15: combinable (orthogonal) VIFEs after a unit-defining code.
    Combinable,
    /// Table 16: combinable extension, entered through VIFE 0xFC.
    CombinableExtension,
}

impl VifTable {
    pub fn name(self) -> &'static str {
        match self {
            VifTable::Primary => "primary",
            VifTable::FirstExtension => "first extension",
            VifTable::SecondExtension => "second extension",
            VifTable::SecondExtensionAlt => "second extension level 2",
            VifTable::Combinable => "combinable",
            VifTable::CombinableExtension => "combinable extension",
        }
    }
}

/// Semantics of a matched VIF/VIFE code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VifEntry {
    /// Defines description, unit and scaling of the value.
    Unit {
        description: &'static str,
        unit: Option<&'static str>,
        transform: Transform,
        hint: TypeHint,
    },
    /// Duration quantity whose unit comes from the code's low bits.
    Duration {
        description: &'static str,
        units: &'static [&'static str],
    },
    /// Annotates the preceding unit without replacing it.
    Modifier {
        description: &'static str,
        transform: Option<Transform>,
        hint: Option<TypeHint>,
    },
    /// Object action requested by the master (Table 17).
    Action(&'static str),
    /// Record error reported by the slave (Table 18).
    RecordError(&'static str),
    /// Redirects the next chain byte into another table.
    Extension(VifTable),
    /// VIF 0x7C: ASCII unit string follows the VIB in the payload.
    PlainText,
    /// VIF 0x7E: readout wildcard, master to slave only.
    AnyVif,
    /// VIF/VIFE 0x7F / 0xFF: rest of chain and data are manufacturer specific.
    ManufacturerSpecific,
}

/// One row of a VIF/VIFE table.
#[derive(Debug, Clone, Copy)]
pub struct VifRow {
    pub code: u8,
    pub mask: u8,
    pub applies: Applies,
    pub entry: VifEntry,
}

const fn unit_row(
    code: u8,
    mask: u8,
    applies: Applies,
    description: &'static str,
    unit: Option<&'static str>,
    transform: Transform,
) -> VifRow {
    VifRow {
        code,
        mask,
        applies,
        entry: VifEntry::Unit {
            description,
            unit,
            transform,
            hint: TypeHint::Default,
        },
    }
}

const fn info_row(code: u8, applies: Applies, description: &'static str) -> VifRow {
    unit_row(code, 0x7F, applies, description, None, Transform::Identity)
}

const fn hint_row(
    code: u8,
    applies: Applies,
    description: &'static str,
    hint: TypeHint,
) -> VifRow {
    VifRow {
        code,
        mask: 0x7F,
        applies,
        entry: VifEntry::Unit {
            description,
            unit: None,
            transform: Transform::Identity,
            hint,
        },
    }
}

const fn modifier_row(code: u8, mask: u8, applies: Applies, description: &'static str) -> VifRow {
    VifRow {
        code,
        mask,
        applies,
        entry: VifEntry::Modifier {
            description,
            transform: None,
            hint: None,
        },
    }
}

const fn error_row(code: u8, description: &'static str) -> VifRow {
    VifRow {
        code,
        mask: 0x7F,
        applies: Applies::SlaveToMaster,
        entry: VifEntry::RecordError(description),
    }
}

const fn action_row(code: u8, description: &'static str) -> VifRow {
    VifRow {
        code,
        mask: 0x7F,
        applies: Applies::MasterToSlave,
        entry: VifEntry::Action(description),
    }
}

/// Duration units selected by two low bits.
const UNITS_SMHD: &[&str] = &["s", "min", "h", "d"];
/// Duration units of the long-period codes.
const UNITS_HDMY: &[&str] = &["h", "d", "months", "years"];
/// Duration units selected by one low bit.
const UNITS_MY: &[&str] = &["months", "years"];

use Applies::{Both, MasterToSlave as M2S, SlaveToMaster as S2M};

/// Primary VIF codes (EN 13757-3 Table 10).
pub static PRIMARY: &[VifRow] = &[
    // Cumulative quantities, 3-bit exponent ranges.
    unit_row(0x00, 0x78, S2M, "Energy", Some("Wh"), Transform::Decimal { mask: 0x07, offset: -3 }),
    unit_row(0x08, 0x78, S2M, "Energy", Some("J"), Transform::Decimal { mask: 0x07, offset: 0 }),
    unit_row(0x10, 0x78, S2M, "Volume", Some("m³"), Transform::Decimal { mask: 0x07, offset: -6 }),
    unit_row(0x18, 0x78, S2M, "Mass", Some("kg"), Transform::Decimal { mask: 0x07, offset: -3 }),
    VifRow { code: 0x20, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "On time", units: UNITS_SMHD } },
    VifRow { code: 0x24, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Operating time", units: UNITS_SMHD } },
    unit_row(0x28, 0x78, S2M, "Power", Some("W"), Transform::Decimal { mask: 0x07, offset: -3 }),
    unit_row(0x30, 0x78, S2M, "Power", Some("J/h"), Transform::Decimal { mask: 0x07, offset: 0 }),
    // Flow units, normalised to per-second.
    unit_row(0x38, 0x78, S2M, "Volume flow", Some("m³/s"), Transform::DecimalOver { mask: 0x07, offset: -6, divisor: 3600.0 }),
    unit_row(0x40, 0x78, S2M, "Volume flow", Some("m³/s"), Transform::DecimalOver { mask: 0x07, offset: -7, divisor: 60.0 }),
    unit_row(0x48, 0x78, S2M, "Volume flow", Some("m³/s"), Transform::Decimal { mask: 0x07, offset: -9 }),
    unit_row(0x50, 0x78, S2M, "Mass flow", Some("kg/s"), Transform::DecimalOver { mask: 0x07, offset: -3, divisor: 3600.0 }),
    // Temperatures and pressure, 2-bit exponent ranges.
    unit_row(0x58, 0x7C, S2M, "Flow temperature", Some("°C"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x5C, 0x7C, S2M, "Return temperature", Some("°C"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x60, 0x7C, S2M, "Temperature difference", Some("K"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x64, 0x7C, S2M, "External temperature", Some("°C"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x68, 0x7C, S2M, "Pressure", Some("bar"), Transform::Decimal { mask: 0x03, offset: -3 }),
    // Time points.
    hint_row(0x6C, S2M, "Date", TypeHint::Date),
    hint_row(0x6D, S2M, "Date and time", TypeHint::DateTime),
    info_row(0x6E, S2M, "Units for HCA"),
    VifRow { code: 0x70, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Averaging duration", units: UNITS_SMHD } },
    VifRow { code: 0x74, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Actuality duration", units: UNITS_SMHD } },
    // Identification.
    info_row(0x78, S2M, "Fabrication no"),
    info_row(0x79, S2M, "(Enhanced) identification"),
    hint_row(0x7A, S2M, "Address", TypeHint::Unsigned),
    // Special and extension codes.
    VifRow { code: 0xFB, mask: 0xFF, applies: Both, entry: VifEntry::Extension(VifTable::FirstExtension) },
    VifRow { code: 0x7C, mask: 0x7F, applies: S2M, entry: VifEntry::PlainText },
    VifRow { code: 0xFD, mask: 0xFF, applies: Both, entry: VifEntry::Extension(VifTable::SecondExtension) },
    VifRow { code: 0x7E, mask: 0x7F, applies: M2S, entry: VifEntry::AnyVif },
    VifRow { code: 0x7F, mask: 0x7F, applies: Both, entry: VifEntry::ManufacturerSpecific },
];

/// First extension table (entered through VIF 0xFB; EN 13757-3 Table 14).
pub static FIRST_EXTENSION: &[VifRow] = &[
    unit_row(0x00, 0x7E, S2M, "Energy", Some("Wh"), Transform::Decimal { mask: 0x01, offset: 5 }),
    unit_row(0x02, 0x7E, S2M, "Reactive energy", Some("VARh"), Transform::Decimal { mask: 0x01, offset: 2 }),
    unit_row(0x04, 0x7E, S2M, "Apparent energy", Some("VAh"), Transform::Decimal { mask: 0x01, offset: 2 }),
    unit_row(0x08, 0x7E, S2M, "Energy", Some("J"), Transform::Decimal { mask: 0x01, offset: 8 }),
    unit_row(0x0C, 0x7C, S2M, "Energy", Some("cal"), Transform::Decimal { mask: 0x03, offset: 5 }),
    unit_row(0x10, 0x7E, S2M, "Volume", Some("m³"), Transform::Decimal { mask: 0x01, offset: 2 }),
    unit_row(0x14, 0x7C, S2M, "Reactive power", Some("VAR"), Transform::Decimal { mask: 0x03, offset: 0 }),
    unit_row(0x18, 0x7E, S2M, "Mass", Some("kg"), Transform::Decimal { mask: 0x01, offset: 5 }),
    unit_row(0x1A, 0x7E, S2M, "Relative humidity", Some("%"), Transform::Decimal { mask: 0x01, offset: -1 }),
    // Non-metric volume.
    unit_row(0x20, 0x7F, S2M, "Volume", Some("ft³"), Transform::Fixed(1.0)),
    unit_row(0x21, 0x7F, S2M, "Volume", Some("ft³"), Transform::Fixed(0.1)),
    unit_row(0x28, 0x7E, S2M, "Power", Some("W"), Transform::Decimal { mask: 0x01, offset: 5 }),
    unit_row(0x2A, 0x7F, S2M, "Phase U-U", Some("°"), Transform::Fixed(0.1)),
    unit_row(0x2B, 0x7F, S2M, "Phase U-I", Some("°"), Transform::Fixed(0.1)),
    unit_row(0x2C, 0x7C, S2M, "Frequency", Some("Hz"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x30, 0x7E, S2M, "Power", Some("J/h"), Transform::Decimal { mask: 0x01, offset: 8 }),
    unit_row(0x34, 0x7C, S2M, "Apparent power", Some("VA"), Transform::Decimal { mask: 0x03, offset: 0 }),
    // Heat cost allocator rating factors.
    unit_row(0x68, 0x7F, Both, "Resulting rating factor, K", None, Transform::BinaryPow(-12)),
    unit_row(0x69, 0x7F, Both, "Thermal output rating factor, Kq", None, Transform::Fixed(1.0)),
    unit_row(0x6A, 0x7F, Both, "Thermal coupling rating factor overall, Kc", None, Transform::BinaryPow(-12)),
    unit_row(0x6B, 0x7F, Both, "Thermal coupling rating factor room side, Kcr", None, Transform::BinaryPow(-12)),
    unit_row(0x6C, 0x7F, Both, "Thermal coupling rating factor heater side, Kch", None, Transform::BinaryPow(-12)),
    unit_row(0x6D, 0x7F, Both, "Low temperature rating factor, Kt", None, Transform::BinaryPow(-12)),
    unit_row(0x6E, 0x7F, Both, "Display output scaling factor, KD", None, Transform::BinaryPow(-12)),
    unit_row(0x74, 0x7C, Both, "Temperature limit", Some("°C"), Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x78, 0x78, S2M, "Cumulative max power", Some("W"), Transform::Decimal { mask: 0x07, offset: -3 }),
];

/// Second extension table (entered through VIF 0xFD; EN 13757-3 Table 12).
pub static SECOND_EXTENSION: &[VifRow] = &[
    unit_row(0x00, 0x7C, S2M, "Credit", None, Transform::Decimal { mask: 0x03, offset: -3 }),
    unit_row(0x04, 0x7C, S2M, "Debit", None, Transform::Decimal { mask: 0x03, offset: -3 }),
    // Enhanced identification.
    info_row(0x08, S2M, "Unique message identification"),
    info_row(0x09, S2M, "Device type"),
    info_row(0x0A, S2M, "Manufacturer"),
    info_row(0x0B, S2M, "Parameter set identification"),
    info_row(0x0C, S2M, "Model/Version"),
    info_row(0x0D, S2M, "Hardware version"),
    info_row(0x0E, S2M, "Firmware version"),
    info_row(0x0F, S2M, "Software version"),
    // Improved selection and configuration.
    info_row(0x10, Both, "Customer location"),
    info_row(0x11, Both, "Customer"),
    info_row(0x12, Both, "Access code"),
    info_row(0x13, Both, "Access code"),
    info_row(0x14, Both, "Access code"),
    info_row(0x15, Both, "Access code"),
    info_row(0x16, Both, "Password"),
    hint_row(0x17, S2M, "Error flags", TypeHint::Boolean),
    info_row(0x18, Both, "Error mask"),
    info_row(0x19, Both, "Security key"),
    hint_row(0x1A, Both, "Digital output", TypeHint::Boolean),
    hint_row(0x1B, S2M, "Digital input", TypeHint::Boolean),
    info_row(0x1C, Both, "Baud rate"),
    info_row(0x1D, Both, "Response delay time"),
    info_row(0x1E, Both, "Retry"),
    hint_row(0x1F, Both, "Remote control", TypeHint::Boolean),
    // Storage management.
    info_row(0x20, Both, "First storage number"),
    info_row(0x21, Both, "Last storage number"),
    info_row(0x22, Both, "Storage block size"),
    info_row(0x23, Both, "Tariff descriptor"),
    VifRow { code: 0x24, mask: 0x7C, applies: Both, entry: VifEntry::Duration { description: "Storage interval", units: UNITS_SMHD } },
    unit_row(0x28, 0x7F, Both, "Storage interval", Some("months"), Transform::Identity),
    unit_row(0x29, 0x7F, Both, "Storage interval", Some("years"), Transform::Identity),
    info_row(0x2A, Both, "Operator specific data"),
    info_row(0x2B, S2M, "Time point second"),
    VifRow { code: 0x2C, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Duration since last readout", units: UNITS_SMHD } },
    // Tariff management. The exact 0x30 row must precede the 0x30-masked
    // duration range so a tariff start date resolves before the durations.
    hint_row(0x30, Both, "Start date/time of tariff", TypeHint::DateOrDateTime),
    VifRow { code: 0x30, mask: 0x7C, applies: Both, entry: VifEntry::Duration { description: "Duration of tariff", units: UNITS_SMHD } },
    VifRow { code: 0x34, mask: 0x7C, applies: Both, entry: VifEntry::Duration { description: "Period of tariff", units: UNITS_SMHD } },
    unit_row(0x38, 0x7F, Both, "Period of tariff", Some("months"), Transform::Identity),
    unit_row(0x39, 0x7F, Both, "Period of tariff", Some("years"), Transform::Identity),
    info_row(0x3A, S2M, "Dimensionless"),
    info_row(0x3B, S2M, "Data container for wireless M-Bus"),
    VifRow { code: 0x3C, mask: 0x7C, applies: Both, entry: VifEntry::Duration { description: "Period of nominal transmissions", units: UNITS_SMHD } },
    // Electrical units, 4-bit exponent ranges.
    unit_row(0x40, 0x70, S2M, "Voltage", Some("V"), Transform::Decimal { mask: 0x0F, offset: -9 }),
    unit_row(0x50, 0x70, S2M, "Current", Some("A"), Transform::Decimal { mask: 0x0F, offset: -12 }),
    // Counters and control.
    info_row(0x60, S2M, "Reset counter"),
    info_row(0x61, S2M, "Cumulation counter"),
    info_row(0x62, Both, "Control signal"),
    info_row(0x63, S2M, "Day of week"),
    info_row(0x64, S2M, "Week number"),
    hint_row(0x65, Both, "Time point of day change", TypeHint::DateOrDateTime),
    info_row(0x66, Both, "State of parameter activation"),
    info_row(0x67, S2M, "Special supplier information"),
    VifRow { code: 0x68, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Duration since last cumulation", units: UNITS_HDMY } },
    VifRow { code: 0x6C, mask: 0x7C, applies: S2M, entry: VifEntry::Duration { description: "Operating time battery", units: UNITS_HDMY } },
    // Battery and RF monitoring.
    hint_row(0x70, S2M, "Date and time of battery change", TypeHint::DateOrDateTime),
    unit_row(0x71, 0x7F, S2M, "RF level", Some("dBm"), Transform::Identity),
    hint_row(0x72, Both, "Daylight saving", TypeHint::DstInfo),
    hint_row(0x73, Both, "Listening window management", TypeHint::ListeningWindow),
    info_row(0x74, S2M, "Remaining battery lifetime"),
    info_row(0x75, S2M, "Number of times meter was stopped"),
    info_row(0x76, S2M, "Data container for manufacturer specific protocol"),
    VifRow { code: 0xFD, mask: 0xFF, applies: Both, entry: VifEntry::Extension(VifTable::SecondExtensionAlt) },
];

/// Second level of the second extension table (0xFD 0xFD ...).
pub static SECOND_EXTENSION_ALT: &[VifRow] = &[
    info_row(0x00, Both, "Currently selected application"),
    VifRow { code: 0x02, mask: 0x7E, applies: S2M, entry: VifEntry::Duration { description: "Remaining battery lifetime", units: UNITS_MY } },
];

/// Combinable (orthogonal) VIFE codes (EN 13757-3 Table 15), including the
/// master-to-slave object actions (Table 17) and the slave-to-master record
/// errors (Table 18), which share code space but differ by direction.
pub static COMBINABLE: &[VifRow] = &[
    // Object actions, master to slave.
    action_row(0x00, "Write (replace)"),
    action_row(0x01, "Add value"),
    action_row(0x02, "Subtract value"),
    action_row(0x03, "OR (set bits)"),
    action_row(0x04, "AND"),
    action_row(0x05, "XOR (toggle bits)"),
    action_row(0x06, "AND NOT (clear bits)"),
    action_row(0x07, "Clear"),
    action_row(0x08, "Add entry"),
    action_row(0x09, "Delete entry"),
    action_row(0x0A, "Delayed action"),
    action_row(0x0B, "Freeze data"),
    action_row(0x0C, "Add to readout-list"),
    action_row(0x0D, "Delete from readout-list"),
    // Record errors, slave to master.
    error_row(0x00, "None"),
    error_row(0x01, "Too many DIFEs"),
    error_row(0x02, "Storage number not implemented"),
    error_row(0x03, "Unit number not implemented"),
    error_row(0x04, "Tariff number not implemented"),
    error_row(0x05, "Function not implemented"),
    error_row(0x06, "Data class not implemented"),
    error_row(0x07, "Data size not implemented"),
    error_row(0x0B, "Too many VIFEs"),
    error_row(0x0C, "Illegal VIF-Group"),
    error_row(0x0D, "Illegal VIF-Exponent"),
    error_row(0x0E, "VIF/DIF mismatch"),
    error_row(0x0F, "Unimplemented action"),
    error_row(0x15, "No data available (undefined value)"),
    error_row(0x16, "Data overflow"),
    error_row(0x17, "Data underflow"),
    error_row(0x18, "Data error"),
    error_row(0x1C, "Premature end of record"),
    // Special data types.
    modifier_row(0x12, 0x7F, S2M, "Average value"),
    modifier_row(0x13, 0x7F, S2M, "Inverse compact profile"),
    modifier_row(0x14, 0x7F, S2M, "Relative deviation"),
    modifier_row(0x1D, 0x7F, S2M, "Standard conform data content"),
    modifier_row(0x1E, 0x7F, S2M, "Compact profile with register numbers"),
    modifier_row(0x1F, 0x7F, S2M, "Compact profile"),
    // Time modifiers.
    modifier_row(0x20, 0x7F, S2M, "Per second"),
    modifier_row(0x21, 0x7F, S2M, "Per minute"),
    modifier_row(0x22, 0x7F, S2M, "Per hour"),
    modifier_row(0x23, 0x7F, S2M, "Per day"),
    modifier_row(0x24, 0x7F, S2M, "Per week"),
    modifier_row(0x25, 0x7F, S2M, "Per month"),
    modifier_row(0x26, 0x7F, S2M, "Per year"),
    modifier_row(0x27, 0x7F, S2M, "Per revolution/measurement"),
    // Pulse increments, 1-bit channel number.
    modifier_row(0x28, 0x7E, S2M, "Increment per input pulse on input channel"),
    modifier_row(0x2A, 0x7E, S2M, "Increment per output pulse on output channel"),
    // Divisors.
    modifier_row(0x2C, 0x7F, S2M, "Per litre"),
    modifier_row(0x2D, 0x7F, S2M, "Per m³"),
    modifier_row(0x2E, 0x7F, S2M, "Per kg"),
    modifier_row(0x2F, 0x7F, S2M, "Per K"),
    modifier_row(0x30, 0x7F, S2M, "Per kWh"),
    modifier_row(0x31, 0x7F, S2M, "Per GJ"),
    modifier_row(0x32, 0x7F, S2M, "Per kW"),
    modifier_row(0x33, 0x7F, S2M, "Per (K·l)"),
    modifier_row(0x34, 0x7F, S2M, "Per V"),
    modifier_row(0x35, 0x7F, S2M, "Per A"),
    // Multipliers.
    modifier_row(0x36, 0x7F, S2M, "Multiplied by s"),
    modifier_row(0x37, 0x7F, S2M, "Multiplied by s/V"),
    modifier_row(0x38, 0x7F, S2M, "Multiplied by s/A"),
    // Data characteristics.
    VifRow { code: 0x39, mask: 0x7F, applies: S2M, entry: VifEntry::Modifier { description: "Start date/time of", transform: None, hint: Some(TypeHint::DateOrDateTime) } },
    modifier_row(0x3A, 0x7F, S2M, "Uncorrected unit or value at metering conditions"),
    modifier_row(0x3B, 0x7F, S2M, "Accumulation only if positive contributions"),
    modifier_row(0x3C, 0x7F, S2M, "Accumulation of abs value only if negative contributions"),
    modifier_row(0x3D, 0x7F, S2M, "Used for alternate non-metric unit system"),
    modifier_row(0x3E, 0x7F, S2M, "Value at base conditions"),
    modifier_row(0x3F, 0x7F, Both, "OBIS-declaration"),
    // Limit values: u = lower/upper, f = first/last, b = begin/end.
    modifier_row(0x40, 0x77, Both, "Limit value"),
    modifier_row(0x41, 0x77, S2M, "Number of exceeds of limit"),
    VifRow { code: 0x42, mask: 0x73, applies: S2M, entry: VifEntry::Modifier { description: "Date/time of limit exceed", transform: None, hint: Some(TypeHint::DateOrDateTime) } },
    modifier_row(0x50, 0x70, S2M, "Duration of limit exceed"),
    modifier_row(0x60, 0x78, S2M, "Duration of"),
    // u sits at bit 2 here (0x68 lower, 0x6C upper).
    modifier_row(0x68, 0x7B, S2M, "Value during limit exceed"),
    modifier_row(0x69, 0x7F, S2M, "Leakage values"),
    modifier_row(0x6D, 0x7F, S2M, "Overflow values"),
    VifRow { code: 0x6E, mask: 0x7E, applies: S2M, entry: VifEntry::Modifier { description: "Date/time of", transform: None, hint: Some(TypeHint::DateOrDateTime) } },
    // Corrections.
    VifRow { code: 0x70, mask: 0x78, applies: Both, entry: VifEntry::Modifier { description: "Multiplicative correction factor", transform: Some(Transform::Decimal { mask: 0x07, offset: -6 }), hint: None } },
    VifRow { code: 0x78, mask: 0x7C, applies: Both, entry: VifEntry::Modifier { description: "Additive correction constant", transform: Some(Transform::DecimalAdd { mask: 0x03, offset: -3 }), hint: None } },
    VifRow { code: 0xFC, mask: 0xFF, applies: Both, entry: VifEntry::Extension(VifTable::CombinableExtension) },
    VifRow { code: 0x7D, mask: 0x7F, applies: Both, entry: VifEntry::Modifier { description: "Multiplicative correction factor 10³", transform: Some(Transform::Fixed(1000.0)), hint: None } },
    modifier_row(0x7E, 0x7F, S2M, "Future value"),
    VifRow { code: 0x7F, mask: 0x7F, applies: Both, entry: VifEntry::ManufacturerSpecific },
];

/// Combinable extension table (entered through VIFE 0xFC; Table 16).
pub static COMBINABLE_EXTENSION: &[VifRow] = &[
    // Phase information.
    modifier_row(0x01, 0x7F, S2M, "At phase L1"),
    modifier_row(0x02, 0x7F, S2M, "At phase L2"),
    modifier_row(0x03, 0x7F, S2M, "At phase L3"),
    modifier_row(0x04, 0x7F, S2M, "At neutral"),
    modifier_row(0x05, 0x7F, S2M, "Between phase L1 and L2"),
    modifier_row(0x06, 0x7F, S2M, "Between phase L2 and L3"),
    modifier_row(0x07, 0x7F, S2M, "Between phase L3 and L1"),
    // Quadrant information.
    modifier_row(0x08, 0x7F, S2M, "At quadrant Q1"),
    modifier_row(0x09, 0x7F, S2M, "At quadrant Q2"),
    modifier_row(0x0A, 0x7F, S2M, "At quadrant Q3"),
    modifier_row(0x0B, 0x7F, S2M, "At quadrant Q4"),
    modifier_row(0x0C, 0x7F, S2M, "Delta between import and export"),
    // Data presentation and direction.
    modifier_row(0x10, 0x7F, S2M, "Accumulation of absolute value"),
    VifRow { code: 0x11, mask: 0x7F, applies: S2M, entry: VifEntry::Modifier { description: "Data presented with type C", transform: None, hint: Some(TypeHint::Unsigned) } },
    VifRow { code: 0x12, mask: 0x7F, applies: S2M, entry: VifEntry::Modifier { description: "Data presented with type D", transform: None, hint: Some(TypeHint::Boolean) } },
    modifier_row(0x14, 0x7F, Both, "Direction: from communication partner to meter"),
    modifier_row(0x15, 0x7F, Both, "Direction: from meter to communication partner"),
];

fn rows(table: VifTable) -> &'static [VifRow] {
    match table {
        VifTable::Primary => PRIMARY,
        VifTable::FirstExtension => FIRST_EXTENSION,
        VifTable::SecondExtension => SECOND_EXTENSION,
        VifTable::SecondExtensionAlt => SECOND_EXTENSION_ALT,
        VifTable::Combinable => COMBINABLE,
        VifTable::CombinableExtension => COMBINABLE_EXTENSION,
    }
}

/// Finds the first row of `table` matching `code` in the given direction.
pub fn lookup(table: VifTable, code: u8, direction: Direction) -> Option<&'static VifRow> {
    rows(table)
        .iter()
        .find(|row| row.applies.matches(direction) && code & row.mask == row.code)
}
