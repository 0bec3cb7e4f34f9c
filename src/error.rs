//! # M-Bus Error Handling
//!
//! Error taxonomy of the crate. Connection and caller errors are terminal;
//! timeouts and protocol errors may reflect transient line noise and are
//! retried by the session layer up to its configured cap.

use thiserror::Error;

/// Top-level error type of the M-Bus master.
#[derive(Debug, Error)]
pub enum MBusError {
    /// The transport reports a lost or unusable connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport returned no data while the decoder expected more bytes.
    #[error("timed out waiting for {needed} byte(s) from the slave")]
    Timeout {
        /// Number of bytes the frame decoder was waiting for.
        needed: usize,
    },

    /// A frame or payload failed validation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The target address is not usable for the requested operation.
    #[error("invalid address 0x{0:02X} for this operation")]
    InvalidAddress(u8),

    /// A SND_UD payload exceeds what the one-byte L field can represent.
    #[error("payload of {0} bytes exceeds the 252 byte long-frame limit")]
    PayloadTooLong(usize),

    /// The decoder was fed a chunk of the wrong size.
    #[error("decoder fed {got} byte(s), expected {expected}")]
    ChunkSizeMismatch { expected: usize, got: usize },
}

impl MBusError {
    /// Whether the session may resend the same request after this error.
    ///
    /// Timeouts and protocol errors can be caused by line noise and are
    /// retried; connection and caller errors are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MBusError::Timeout { .. } | MBusError::Protocol(_))
    }
}

/// Frame- and payload-level validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// First byte of a frame is none of 0xE5 / 0x10 / 0x68.
    #[error("invalid start byte 0x{0:02X}")]
    InvalidStartByte(u8),

    /// The duplicated L field of a long frame disagrees with itself.
    #[error("length bytes disagree: {first} vs {second}")]
    LengthMismatch { first: u8, second: u8 },

    /// The L field is below the 3 byte minimum (C + A + CI).
    #[error("length field {0} is below the 3 byte minimum")]
    LengthTooShort(u8),

    /// Checksum byte does not match the sum of the covered bytes.
    #[error("invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    ChecksumMismatch { expected: u8, calculated: u8 },

    /// The byte where 0x16 was required holds something else.
    #[error("stop byte missing, read 0x{0:02X}")]
    StopByteMissing(u8),

    /// The frame kind is not in the decoder's allowed set.
    #[error("unexpected {0} frame")]
    UnexpectedFrameKind(&'static str),

    /// The A field does not match the queried slave.
    #[error("address mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    AddressMismatch { expected: u8, actual: u8 },

    /// CI value the core does not interpret.
    #[error("unknown CI field 0x{0:02X}")]
    UnknownCi(u8),

    /// More than 10 DIFE bytes in one record header.
    #[error("DIFE chain exceeds 10 extensions")]
    DifeChainTooLong,

    /// More than 10 VIFE bytes in one record header.
    #[error("VIFE chain exceeds 10 extensions")]
    VifeChainTooLong,

    /// VIF/VIFE code not covered by any rule of the active table.
    #[error("unknown VIF code 0x{code:02X} in {table} table")]
    UnknownVif { code: u8, table: &'static str },

    /// DIF code that is illegal in the current communication direction.
    #[error("DIF 0x{0:02X} is not valid in this direction")]
    UnexpectedDif(u8),

    /// A declared data length runs past the end of the payload.
    #[error("record data extends past the end of the payload")]
    PayloadTruncated,

    /// BCD byte with a nibble outside 0..9 where no error code is allowed.
    #[error("invalid BCD digit in byte 0x{0:02X}")]
    InvalidBcd(u8),

    /// Date or time field outside its legal range.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(&'static str),

    /// LVAR length byte outside the ranges of EN 13757-3 Table 5.
    #[error("unsupported LVAR length byte 0x{0:02X}")]
    InvalidLvar(u8),
}
