//! Progressive frame decoder.
//!
//! The decoder consumes a response in small state-dependent chunks so a
//! caller can read exactly the bytes the frame still needs: ask
//! [`FrameDecoder::bytes_needed`], read that many bytes from the transport,
//! [`FrameDecoder::feed`] them back. Every field is validated the moment it
//! arrives; any failure moves the machine into a terminal error state and is
//! reported once. Recovery is the session's job, by discarding the decoder
//! and resending the request.

use crate::constants::*;
use crate::error::{MBusError, ProtocolError};
use crate::mbus::frame::{checksum, MBusFrame};
use bitflags::bitflags;
use bytes::BytesMut;

bitflags! {
    /// Frame kinds a decoder accepts as the start of a response.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameKinds: u8 {
        const ACK = 0b001;
        const SHORT = 0b010;
        const LONG = 0b100;
    }
}

#[derive(Debug)]
enum DecoderState {
    /// Waiting for the start byte.
    ExpectStart,
    /// Short frame: C, A, checksum and stop arrive as one chunk.
    ExpectShortRest,
    /// Long frame: the duplicated L pair.
    ExpectLengthPair,
    /// Long frame: the second 0x68 start byte.
    ExpectStart2 { length: u8 },
    /// Long frame: C, A and CI as one chunk.
    ExpectHeader { length: u8 },
    /// Long frame: L-3 payload bytes (skipped when L = 3).
    ExpectPayload { control: u8, address: u8, ci: u8, length: u8 },
    /// Long frame: the checksum byte.
    ExpectChecksum { control: u8, address: u8, ci: u8, payload: BytesMut },
    /// Long frame: the stop byte.
    ExpectStop { frame: MBusFrame },
    /// A complete frame is available through `take_frame`.
    Done(MBusFrame),
    /// A validation error was reported; the decoder stays here.
    Failed,
}

/// Chunked decoder for one M-Bus response frame.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    expected_address: Option<u8>,
    allowed: FrameKinds,
}

impl FrameDecoder {
    /// Creates a decoder. When `expected_address` is set, the A field of the
    /// incoming frame must match it; `allowed` filters the frame kinds
    /// accepted at the start byte.
    pub fn new(expected_address: Option<u8>, allowed: FrameKinds) -> Self {
        FrameDecoder {
            state: DecoderState::ExpectStart,
            expected_address,
            allowed,
        }
    }

    /// Number of bytes to read next. Zero only in a terminal state.
    pub fn bytes_needed(&self) -> usize {
        match &self.state {
            DecoderState::ExpectStart => 1,
            DecoderState::ExpectShortRest => 4,
            DecoderState::ExpectLengthPair => 2,
            DecoderState::ExpectStart2 { .. } => 1,
            DecoderState::ExpectHeader { .. } => 3,
            DecoderState::ExpectPayload { length, .. } => {
                (*length - MBUS_FRAME_LENGTH_MIN) as usize
            }
            DecoderState::ExpectChecksum { .. } => 1,
            DecoderState::ExpectStop { .. } => 1,
            DecoderState::Done(_) | DecoderState::Failed => 0,
        }
    }

    /// True once a complete frame has been decoded.
    pub fn is_done(&self) -> bool {
        matches!(self.state, DecoderState::Done(_))
    }

    /// Consumes the decoder, returning the frame if it is done.
    pub fn take_frame(self) -> Option<MBusFrame> {
        match self.state {
            DecoderState::Done(frame) => Some(frame),
            _ => None,
        }
    }

    /// Feeds the chunk requested by [`bytes_needed`](Self::bytes_needed),
    /// validating it and advancing the machine.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), MBusError> {
        let needed = self.bytes_needed();
        if chunk.len() != needed {
            return Err(MBusError::ChunkSizeMismatch {
                expected: needed,
                got: chunk.len(),
            });
        }

        // The machine moves to Failed unless `advance` produces a new state,
        // so an error leaves it terminal.
        let state = std::mem::replace(&mut self.state, DecoderState::Failed);
        match Self::advance(state, chunk, self.expected_address, self.allowed) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(err) => Err(MBusError::Protocol(err)),
        }
    }

    fn check_address(expected: Option<u8>, actual: u8) -> Result<(), ProtocolError> {
        match expected {
            Some(expected) if expected != actual => {
                Err(ProtocolError::AddressMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn advance(
        state: DecoderState,
        chunk: &[u8],
        expected_address: Option<u8>,
        allowed: FrameKinds,
    ) -> Result<DecoderState, ProtocolError> {
        let require_kind = |kind: FrameKinds, name: &'static str| {
            if allowed.contains(kind) {
                Ok(())
            } else {
                Err(ProtocolError::UnexpectedFrameKind(name))
            }
        };

        match state {
            DecoderState::ExpectStart => match chunk[0] {
                MBUS_FRAME_ACK => {
                    require_kind(FrameKinds::ACK, "ack")?;
                    Ok(DecoderState::Done(MBusFrame::Ack))
                }
                MBUS_FRAME_SHORT_START => {
                    require_kind(FrameKinds::SHORT, "short")?;
                    Ok(DecoderState::ExpectShortRest)
                }
                MBUS_FRAME_LONG_START => {
                    require_kind(FrameKinds::LONG, "long")?;
                    Ok(DecoderState::ExpectLengthPair)
                }
                other => Err(ProtocolError::InvalidStartByte(other)),
            },

            DecoderState::ExpectShortRest => {
                let (control, address, check, stop) = (chunk[0], chunk[1], chunk[2], chunk[3]);
                if stop != MBUS_FRAME_STOP {
                    return Err(ProtocolError::StopByteMissing(stop));
                }
                let calculated = checksum(&chunk[..2]);
                if calculated != check {
                    return Err(ProtocolError::ChecksumMismatch {
                        expected: check,
                        calculated,
                    });
                }
                Self::check_address(expected_address, address)?;
                Ok(DecoderState::Done(MBusFrame::Short { control, address }))
            }

            DecoderState::ExpectLengthPair => {
                if chunk[0] != chunk[1] {
                    return Err(ProtocolError::LengthMismatch {
                        first: chunk[0],
                        second: chunk[1],
                    });
                }
                if chunk[0] < MBUS_FRAME_LENGTH_MIN {
                    return Err(ProtocolError::LengthTooShort(chunk[0]));
                }
                Ok(DecoderState::ExpectStart2 { length: chunk[0] })
            }

            DecoderState::ExpectStart2 { length } => {
                if chunk[0] != MBUS_FRAME_LONG_START {
                    return Err(ProtocolError::InvalidStartByte(chunk[0]));
                }
                Ok(DecoderState::ExpectHeader { length })
            }

            DecoderState::ExpectHeader { length } => {
                let (control, address, ci) = (chunk[0], chunk[1], chunk[2]);
                Self::check_address(expected_address, address)?;
                if length == MBUS_FRAME_LENGTH_MIN {
                    // Empty payload: go straight to the checksum byte.
                    Ok(DecoderState::ExpectChecksum {
                        control,
                        address,
                        ci,
                        payload: BytesMut::new(),
                    })
                } else {
                    Ok(DecoderState::ExpectPayload {
                        control,
                        address,
                        ci,
                        length,
                    })
                }
            }

            DecoderState::ExpectPayload {
                control,
                address,
                ci,
                ..
            } => {
                let mut payload = BytesMut::with_capacity(chunk.len());
                payload.extend_from_slice(chunk);
                Ok(DecoderState::ExpectChecksum {
                    control,
                    address,
                    ci,
                    payload,
                })
            }

            DecoderState::ExpectChecksum {
                control,
                address,
                ci,
                payload,
            } => {
                let mut calculated = checksum(&[control, address, ci]);
                calculated = calculated.wrapping_add(checksum(&payload));
                if calculated != chunk[0] {
                    return Err(ProtocolError::ChecksumMismatch {
                        expected: chunk[0],
                        calculated,
                    });
                }
                Ok(DecoderState::ExpectStop {
                    frame: MBusFrame::Long {
                        control,
                        address,
                        ci,
                        payload: payload.to_vec(),
                    },
                })
            }

            DecoderState::ExpectStop { frame } => {
                if chunk[0] != MBUS_FRAME_STOP {
                    return Err(ProtocolError::StopByteMissing(chunk[0]));
                }
                Ok(DecoderState::Done(frame))
            }

            DecoderState::Done(_) | DecoderState::Failed => Err(ProtocolError::UnexpectedFrameKind(
                "terminal decoder state",
            )),
        }
    }

    /// Drives a fresh decoder over a complete buffer. The buffer must hold
    /// exactly one frame.
    pub fn decode_frame(
        data: &[u8],
        expected_address: Option<u8>,
        allowed: FrameKinds,
    ) -> Result<MBusFrame, MBusError> {
        let mut decoder = FrameDecoder::new(expected_address, allowed);
        let mut offset = 0;
        while !decoder.is_done() {
            let needed = decoder.bytes_needed();
            if offset + needed > data.len() {
                return Err(MBusError::Protocol(ProtocolError::PayloadTruncated));
            }
            decoder.feed(&data[offset..offset + needed])?;
            offset += needed;
        }
        if offset != data.len() {
            return Err(MBusError::Protocol(ProtocolError::UnexpectedFrameKind(
                "trailing bytes after frame",
            )));
        }
        decoder
            .take_frame()
            .ok_or(MBusError::Protocol(ProtocolError::PayloadTruncated))
    }
}
