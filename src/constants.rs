//! M-Bus Protocol Constants
//!
//! Byte-level constants of the wired M-Bus link and application layers,
//! based on EN 13757-2 and EN 13757-3.

/// Single-character acknowledgement frame.
pub const MBUS_FRAME_ACK: u8 = 0xE5;

/// Start byte of a short frame.
pub const MBUS_FRAME_SHORT_START: u8 = 0x10;

/// Start byte of a control or long frame (appears twice).
pub const MBUS_FRAME_LONG_START: u8 = 0x68;

/// Stop byte terminating short, control and long frames.
pub const MBUS_FRAME_STOP: u8 = 0x16;

/// Smallest legal L field of a long frame (C + A + CI, no payload).
pub const MBUS_FRAME_LENGTH_MIN: u8 = 3;

/// Largest payload a long frame can carry (L is a single byte).
pub const MBUS_FRAME_PAYLOAD_MAX: usize = 252;

// ----------------------------------------------------------------------------
// Addresses
// ----------------------------------------------------------------------------

/// Lowest regular primary address.
pub const MBUS_ADDRESS_PRIMARY_MIN: u8 = 1;

/// Highest regular primary address.
pub const MBUS_ADDRESS_PRIMARY_MAX: u8 = 250;

/// Pseudo-address a slave answers on after secondary-address selection.
pub const MBUS_ADDRESS_SELECTED: u8 = 0xFD;

/// No-station / point-to-point test address; every slave answers.
pub const MBUS_ADDRESS_TEST: u8 = 0xFE;

/// Broadcast address; no slave replies.
pub const MBUS_ADDRESS_BROADCAST: u8 = 0xFF;

// ----------------------------------------------------------------------------
// C field (control)
// ----------------------------------------------------------------------------

/// SND_NKE: link reset, expects ACK.
pub const MBUS_CONTROL_SND_NKE: u8 = 0x40;

/// SND_UD: send user data, expects ACK (FCV clear).
pub const MBUS_CONTROL_SND_UD: u8 = 0x53;

/// REQ_UD1: request class 1 (alarm) data (FCV clear).
pub const MBUS_CONTROL_REQ_UD1: u8 = 0x5A;

/// REQ_UD2: request class 2 (measurement) data (FCV clear).
pub const MBUS_CONTROL_REQ_UD2: u8 = 0x5B;

/// RSP_UD: slave response with user data.
pub const MBUS_CONTROL_RSP_UD: u8 = 0x08;

/// Frame Count Valid bit (bit 4).
pub const MBUS_CONTROL_FCV_BIT: u8 = 0x10;

/// Frame Count Bit (bit 5).
pub const MBUS_CONTROL_FCB_BIT: u8 = 0x20;

// ----------------------------------------------------------------------------
// CI field (control information)
// ----------------------------------------------------------------------------

/// Variable data response with the long (identification) header.
pub const MBUS_CI_RESP_VARIABLE: u8 = 0x72;

/// Variable data response with the short header.
pub const MBUS_CI_RESP_VARIABLE_SHORT: u8 = 0x7A;

/// Application reset (master to slave).
pub const MBUS_CI_APPLICATION_RESET: u8 = 0x50;

/// Data send (master to slave).
pub const MBUS_CI_DATA_SEND: u8 = 0x51;

/// Byte length of the CI=0x72 identification header.
pub const MBUS_HEADER_LONG_LEN: usize = 12;

/// Byte length of the CI=0x7A short header.
pub const MBUS_HEADER_SHORT_LEN: usize = 4;

// ----------------------------------------------------------------------------
// DIF / DIFE
// ----------------------------------------------------------------------------

/// Mask selecting the data-field code (bits 0..3).
pub const MBUS_DIF_DATA_FIELD_MASK: u8 = 0x0F;

/// Mask selecting the function code (bits 4..5).
pub const MBUS_DIF_FUNCTION_MASK: u8 = 0x30;

/// LSB of the storage number (bit 6).
pub const MBUS_DIF_STORAGE_BIT: u8 = 0x40;

/// Extension bit on DIF, DIFE, VIF and VIFE bytes (bit 7).
pub const MBUS_EXTENSION_BIT: u8 = 0x80;

/// Special DIF: manufacturer-specific data follows.
pub const MBUS_DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// Special DIF: manufacturer data, more records follow in the next datagram.
pub const MBUS_DIF_MORE_RECORDS_FOLLOW: u8 = 0x1F;

/// Special DIF: idle filler, skipped during parsing.
pub const MBUS_DIF_IDLE_FILLER: u8 = 0x2F;

/// Special DIF: global readout request (master to slave only).
pub const MBUS_DIF_GLOBAL_READOUT: u8 = 0x7F;

/// DIF data field: selection for readout (master to slave only).
pub const MBUS_DIF_SELECTION: u8 = 0x08;

/// DIFE storage-number bits (bits 0..3).
pub const MBUS_DIFE_STORAGE_MASK: u8 = 0x0F;

/// DIFE tariff bits (bits 4..5).
pub const MBUS_DIFE_TARIFF_MASK: u8 = 0x30;

/// DIFE subunit bit (bit 6).
pub const MBUS_DIFE_SUBUNIT_MASK: u8 = 0x40;

/// Maximum number of DIFE bytes after the DIF.
pub const MBUS_DIFE_MAX_CHAIN: usize = 10;

// ----------------------------------------------------------------------------
// VIF / VIFE
// ----------------------------------------------------------------------------

/// Mask stripping the extension bit from a VIF/VIFE code.
pub const MBUS_VIF_CODE_MASK: u8 = 0x7F;

/// Plain-text VIF: the unit string follows the VIB in the payload.
pub const MBUS_VIF_PLAIN_TEXT: u8 = 0x7C;

/// Maximum number of VIFE bytes after the VIF.
pub const MBUS_VIFE_MAX_CHAIN: usize = 10;

// ----------------------------------------------------------------------------
// Status byte (CI 0x72 / 0x7A headers)
// ----------------------------------------------------------------------------

/// Application-error code (bits 0..1).
pub const MBUS_STATUS_APPLICATION_MASK: u8 = 0x03;

/// Power low (bit 2).
pub const MBUS_STATUS_POWER_LOW: u8 = 0x04;

/// Permanent error (bit 3).
pub const MBUS_STATUS_PERMANENT_ERROR: u8 = 0x08;

/// Temporary error (bit 4).
pub const MBUS_STATUS_TEMPORARY_ERROR: u8 = 0x10;

/// Manufacturer/application-specific bits (bits 5..7).
pub const MBUS_STATUS_APPLICATION_SPECIFIC: u8 = 0xE0;
