//! M-Bus link-layer frames: checksum, shape validation, pure encoders and a
//! one-shot `nom` parser for complete buffers.
//!
//! Wire formats (EN 13757-2):
//!
//! ```text
//! ack:   E5
//! short: 10 | C | A | (C+A) mod 256 | 16
//! long:  68 | L | L | 68 | C | A | CI | data (L-3 bytes) | checksum | 16
//! ```
//!
//! L counts C through the last data byte, so the payload is limited to 252
//! bytes. The checksum is the low byte of the unsigned sum over the same
//! range.

use crate::constants::*;
use crate::error::{MBusError, ProtocolError};
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

/// A decoded link-layer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MBusFrame {
    /// Single byte 0xE5.
    Ack,
    /// Five-byte short frame (requests, link control).
    Short { control: u8, address: u8 },
    /// Long frame carrying a CI field and 0..252 payload bytes. A control
    /// frame is a long frame with an empty payload (L = 3).
    Long {
        control: u8,
        address: u8,
        ci: u8,
        payload: Vec<u8>,
    },
}

impl MBusFrame {
    /// A-field of the frame, absent for ACK.
    pub fn address(&self) -> Option<u8> {
        match self {
            MBusFrame::Ack => None,
            MBusFrame::Short { address, .. } | MBusFrame::Long { address, .. } => Some(*address),
        }
    }

    /// C-field of the frame, absent for ACK.
    pub fn control(&self) -> Option<u8> {
        match self {
            MBusFrame::Ack => None,
            MBusFrame::Short { control, .. } | MBusFrame::Long { control, .. } => Some(*control),
        }
    }
}

/// Modulo-256 checksum over a byte range.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Validates the shape of a complete short frame buffer.
pub fn validate_short(buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.len() != 5 {
        return Err(ProtocolError::PayloadTruncated);
    }
    if buf[0] != MBUS_FRAME_SHORT_START {
        return Err(ProtocolError::InvalidStartByte(buf[0]));
    }
    if buf[4] != MBUS_FRAME_STOP {
        return Err(ProtocolError::StopByteMissing(buf[4]));
    }
    let calculated = checksum(&buf[1..3]);
    if calculated != buf[3] {
        return Err(ProtocolError::ChecksumMismatch {
            expected: buf[3],
            calculated,
        });
    }
    Ok(())
}

/// Validates the shape of a complete long frame buffer.
pub fn validate_long(buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.len() < 9 {
        return Err(ProtocolError::PayloadTruncated);
    }
    if buf[0] != MBUS_FRAME_LONG_START {
        return Err(ProtocolError::InvalidStartByte(buf[0]));
    }
    if buf[1] != buf[2] {
        return Err(ProtocolError::LengthMismatch {
            first: buf[1],
            second: buf[2],
        });
    }
    let length = buf[1];
    if length < MBUS_FRAME_LENGTH_MIN {
        return Err(ProtocolError::LengthTooShort(length));
    }
    if buf[3] != MBUS_FRAME_LONG_START {
        return Err(ProtocolError::InvalidStartByte(buf[3]));
    }
    if buf.len() != length as usize + 6 {
        return Err(ProtocolError::PayloadTruncated);
    }
    if buf[buf.len() - 1] != MBUS_FRAME_STOP {
        return Err(ProtocolError::StopByteMissing(buf[buf.len() - 1]));
    }
    let body = &buf[4..4 + length as usize];
    let calculated = checksum(body);
    if calculated != buf[4 + length as usize] {
        return Err(ProtocolError::ChecksumMismatch {
            expected: buf[4 + length as usize],
            calculated,
        });
    }
    Ok(())
}

/// True for addresses a reply can come back from: regular primaries, the
/// unconfigured address 0 and the selected-secondary pseudo-address.
pub fn is_reply_address(address: u8) -> bool {
    address != MBUS_ADDRESS_TEST && address != MBUS_ADDRESS_BROADCAST
}

fn require_reply_address(address: u8) -> Result<(), MBusError> {
    if is_reply_address(address) {
        Ok(())
    } else {
        Err(MBusError::InvalidAddress(address))
    }
}

/// Builds a C field from a base opcode and the FCB/FCV pair. `fcb: None`
/// leaves FCV clear (datagram sequencing disabled).
pub fn control_field(base: u8, fcb: Option<bool>) -> u8 {
    match fcb {
        None => base,
        Some(false) => base | MBUS_CONTROL_FCV_BIT,
        Some(true) => base | MBUS_CONTROL_FCV_BIT | MBUS_CONTROL_FCB_BIT,
    }
}

/// Packs a short frame from its C and A fields.
pub fn pack_short_frame(control: u8, address: u8) -> Vec<u8> {
    vec![
        MBUS_FRAME_SHORT_START,
        control,
        address,
        control.wrapping_add(address),
        MBUS_FRAME_STOP,
    ]
}

/// SND_NKE link reset. The slave answers with ACK, so no-reply targets are
/// rejected.
pub fn pack_snd_nke(address: u8) -> Result<Vec<u8>, MBusError> {
    require_reply_address(address)?;
    Ok(pack_short_frame(MBUS_CONTROL_SND_NKE, address))
}

/// REQ_UD2 class-2 data request with optional FCB.
pub fn pack_req_ud2(address: u8, fcb: Option<bool>) -> Result<Vec<u8>, MBusError> {
    require_reply_address(address)?;
    Ok(pack_short_frame(
        control_field(MBUS_CONTROL_REQ_UD2, fcb),
        address,
    ))
}

/// REQ_UD1 class-1 (alarm) data request with optional FCB.
pub fn pack_req_ud1(address: u8, fcb: Option<bool>) -> Result<Vec<u8>, MBusError> {
    require_reply_address(address)?;
    Ok(pack_short_frame(
        control_field(MBUS_CONTROL_REQ_UD1, fcb),
        address,
    ))
}

/// SND_UD long frame carrying user data to the slave.
///
/// The payload is limited to 252 bytes by the one-byte L field. Broadcast is
/// accepted here: SND_UD to 0xFF is a legal fire-and-forget transmission;
/// the session decides whether it waits for an ACK.
pub fn pack_snd_ud(address: u8, ci: u8, payload: &[u8]) -> Result<Vec<u8>, MBusError> {
    if payload.len() > MBUS_FRAME_PAYLOAD_MAX {
        return Err(MBusError::PayloadTooLong(payload.len()));
    }
    let length = MBUS_FRAME_LENGTH_MIN + payload.len() as u8;
    let mut frame = Vec::with_capacity(payload.len() + 9);
    frame.push(MBUS_FRAME_LONG_START);
    frame.push(length);
    frame.push(length);
    frame.push(MBUS_FRAME_LONG_START);
    frame.push(MBUS_CONTROL_SND_UD);
    frame.push(address);
    frame.push(ci);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[4..]));
    frame.push(MBUS_FRAME_STOP);
    Ok(frame)
}

/// Packs any frame back into its wire representation.
pub fn pack_frame(frame: &MBusFrame) -> Result<Vec<u8>, MBusError> {
    match frame {
        MBusFrame::Ack => Ok(vec![MBUS_FRAME_ACK]),
        MBusFrame::Short { control, address } => Ok(pack_short_frame(*control, *address)),
        MBusFrame::Long {
            control,
            address,
            ci,
            payload,
        } => {
            if payload.len() > MBUS_FRAME_PAYLOAD_MAX {
                return Err(MBusError::PayloadTooLong(payload.len()));
            }
            let length = MBUS_FRAME_LENGTH_MIN + payload.len() as u8;
            let mut out = Vec::with_capacity(payload.len() + 9);
            out.push(MBUS_FRAME_LONG_START);
            out.push(length);
            out.push(length);
            out.push(MBUS_FRAME_LONG_START);
            out.push(*control);
            out.push(*address);
            out.push(*ci);
            out.extend_from_slice(payload);
            out.push(checksum(&out[4..]));
            out.push(MBUS_FRAME_STOP);
            Ok(out)
        }
    }
}

fn nom_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

/// Parses one complete frame from the front of a buffer.
///
/// This is the offline companion of the progressive
/// [`FrameDecoder`](crate::mbus::decoder::FrameDecoder): it expects every
/// byte of the frame to be present already, which suits captured traces and
/// tests.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], MBusFrame> {
    let (rest, start) = be_u8(input)?;
    match start {
        MBUS_FRAME_ACK => Ok((rest, MBusFrame::Ack)),
        MBUS_FRAME_SHORT_START => {
            let (rest, body) = take(4usize)(rest)?;
            let buf = [start, body[0], body[1], body[2], body[3]];
            validate_short(&buf).map_err(|_| nom_error(input))?;
            Ok((
                rest,
                MBusFrame::Short {
                    control: body[0],
                    address: body[1],
                },
            ))
        }
        MBUS_FRAME_LONG_START => {
            let (rest, lengths) = take(3usize)(rest)?;
            if lengths[0] != lengths[1]
                || lengths[0] < MBUS_FRAME_LENGTH_MIN
                || lengths[2] != MBUS_FRAME_LONG_START
            {
                return Err(nom_error(input));
            }
            let length = lengths[0] as usize;
            let (rest, body) = take(length + 2)(rest)?;
            let mut buf = Vec::with_capacity(length + 6);
            buf.push(start);
            buf.extend_from_slice(lengths);
            buf.extend_from_slice(body);
            validate_long(&buf).map_err(|_| nom_error(input))?;
            Ok((
                rest,
                MBusFrame::Long {
                    control: body[0],
                    address: body[1],
                    ci: body[2],
                    payload: body[3..length].to_vec(),
                },
            ))
        }
        _ => Err(nom_error(input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_mod_256_sum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x40, 0x05]), 0x45);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn snd_nke_scenario_bytes() {
        assert_eq!(pack_snd_nke(5).unwrap(), vec![0x10, 0x40, 0x05, 0x45, 0x16]);
    }

    #[test]
    fn req_ud2_fcb_encodings() {
        // FCV clear, FCV set with FCB 0 and 1.
        assert_eq!(pack_req_ud2(1, None).unwrap()[1], 0x5B);
        assert_eq!(pack_req_ud2(1, Some(false)).unwrap()[1], 0x6B);
        assert_eq!(pack_req_ud2(1, Some(true)).unwrap()[1], 0x7B);
        assert_eq!(
            pack_req_ud2(1, Some(true)).unwrap(),
            vec![0x10, 0x7B, 0x01, 0x7C, 0x16]
        );
    }

    #[test]
    fn req_ud1_fcb_encodings() {
        assert_eq!(pack_req_ud1(1, None).unwrap()[1], 0x5A);
        assert_eq!(pack_req_ud1(1, Some(true)).unwrap()[1], 0x7A);
    }

    #[test]
    fn reply_ops_reject_no_reply_targets() {
        assert!(matches!(
            pack_snd_nke(MBUS_ADDRESS_BROADCAST),
            Err(MBusError::InvalidAddress(0xFF))
        ));
        assert!(matches!(
            pack_req_ud2(MBUS_ADDRESS_TEST, Some(true)),
            Err(MBusError::InvalidAddress(0xFE))
        ));
        // The selected-secondary pseudo-address replies and is accepted.
        assert!(pack_req_ud2(MBUS_ADDRESS_SELECTED, Some(true)).is_ok());
    }

    #[test]
    fn snd_ud_layout_and_checksum() {
        let frame = pack_snd_ud(0x05, 0x51, &[0x01, 0x02]).unwrap();
        assert_eq!(
            frame,
            vec![0x68, 0x05, 0x05, 0x68, 0x53, 0x05, 0x51, 0x01, 0x02, 0xAC, 0x16]
        );
        validate_long(&frame).unwrap();
    }

    #[test]
    fn snd_ud_payload_cap() {
        assert!(pack_snd_ud(1, 0x51, &[0u8; 252]).is_ok());
        assert!(matches!(
            pack_snd_ud(1, 0x51, &[0u8; 253]),
            Err(MBusError::PayloadTooLong(253))
        ));
    }

    #[test]
    fn validate_short_rejects_each_invariant() {
        validate_short(&[0x10, 0x7B, 0x01, 0x7C, 0x16]).unwrap();
        assert!(matches!(
            validate_short(&[0x11, 0x7B, 0x01, 0x7C, 0x16]),
            Err(ProtocolError::InvalidStartByte(0x11))
        ));
        assert!(matches!(
            validate_short(&[0x10, 0x7B, 0x01, 0x7C, 0x17]),
            Err(ProtocolError::StopByteMissing(0x17))
        ));
        assert!(matches!(
            validate_short(&[0x10, 0x7B, 0x01, 0x7D, 0x16]),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn validate_long_rejects_each_invariant() {
        let good = pack_snd_ud(1, 0x51, &[0xAA]).unwrap();
        validate_long(&good).unwrap();

        let mut bad = good.clone();
        bad[2] = bad[2].wrapping_add(1);
        assert!(matches!(
            validate_long(&bad),
            Err(ProtocolError::LengthMismatch { .. })
        ));

        let mut bad = good.clone();
        let checksum_at = bad.len() - 2;
        bad[checksum_at] ^= 0x01;
        assert!(matches!(
            validate_long(&bad),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));

        assert!(matches!(
            validate_long(&[0x68, 0x02, 0x02, 0x68, 0x53, 0x01, 0x51, 0xA5, 0x16]),
            Err(ProtocolError::LengthTooShort(2))
        ));
    }

    #[test]
    fn parse_round_trips_every_variant() {
        for frame in [
            MBusFrame::Ack,
            MBusFrame::Short {
                control: 0x7B,
                address: 0x49,
            },
            MBusFrame::Long {
                control: 0x53,
                address: 0xFE,
                ci: 0xBD,
                payload: vec![],
            },
            MBusFrame::Long {
                control: 0x08,
                address: 0x01,
                ci: 0x72,
                payload: vec![0x01, 0x7A, 0x08],
            },
        ] {
            let bytes = pack_frame(&frame).unwrap();
            let (rest, parsed) = parse_frame(&bytes).unwrap();
            assert!(rest.is_empty());
            assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn parse_rejects_corrupt_checksum() {
        assert!(parse_frame(&[0x10, 0x7B, 0x49, 0xC5, 0x16]).is_err());
    }
}
