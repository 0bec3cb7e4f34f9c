//! Session orchestrator: request/response cycles with retry, timeout and
//! FCB datagram sequencing.
//!
//! The M-Bus is half duplex, so every high-level operation serializes on one
//! bus lock; inside an operation the request, the read loop and the decoder
//! run in strict sequence. Decoder state never survives an operation - each
//! response gets a fresh [`FrameDecoder`], which also makes cancellation
//! safe: dropping a pending operation releases the lock and discards any
//! partial decode, and the FCB is only advanced after a datagram has been
//! delivered.

use crate::error::{MBusError, ProtocolError};
use crate::mbus::decoder::{FrameDecoder, FrameKinds};
use crate::mbus::frame::{pack_req_ud1, pack_req_ud2, pack_snd_nke, pack_snd_ud, MBusFrame};
use crate::mbus::transport::MBusTransport;
use crate::payload::record::{decode_user_data, MBusDatagram, MBusUserData};
use log::{debug, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Tuning knobs of the session layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Attempts per datagram exchange before the last error is surfaced.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Base wait per read, on top of the transport's transmission estimate.
    pub base_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            base_timeout: Duration::from_millis(500),
        }
    }
}

struct SessionInner<T> {
    transport: T,
    /// FCB value to use for the next sequenced request, per address.
    /// Cleared by `reset`; absent means "start of sequence" (FCB = 1).
    fcb: HashMap<u8, bool>,
}

/// Outcome of one successful request/response exchange.
enum Exchange {
    /// Single-byte acknowledgement.
    Ack,
    /// Decoded application datagram (long frame, payload interpreted).
    Datagram(MBusDatagram),
    /// Raw frame, when payload decoding was not requested.
    Frame(MBusFrame),
}

/// M-Bus primary master session over one transport.
pub struct MBusSession<T: MBusTransport> {
    inner: Mutex<SessionInner<T>>,
    config: SessionConfig,
}

impl<T: MBusTransport> MBusSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        MBusSession {
            inner: Mutex::new(SessionInner {
                transport,
                fcb: HashMap::new(),
            }),
            config,
        }
    }

    /// Consumes the session, returning the transport.
    pub fn into_transport(self) -> T {
        self.inner.into_inner().transport
    }

    /// Sends SND_NKE and waits for the ACK. On success the FCB sequence for
    /// the address starts over.
    pub async fn reset(&self, address: u8) -> Result<(), MBusError> {
        let mut inner = self.inner.lock().await;
        self.reset_locked(&mut inner, address).await
    }

    /// Reads all records of a slave, transparently walking a multi-datagram
    /// sequence with FCB toggling. Datagram records are concatenated in
    /// request order; identification fields come from the first datagram.
    pub async fn read_records(&self, address: u8) -> Result<MBusUserData, MBusError> {
        let mut inner = self.inner.lock().await;

        // Some devices require a link reset before the first request; it is
        // harmless otherwise and restarts the FCB sequence.
        self.reset_locked(&mut inner, address).await?;

        let mut fcb = true;
        let mut aggregate: Option<MBusUserData> = None;

        loop {
            let request = pack_req_ud2(address, Some(fcb))?;
            inner.fcb.insert(address, fcb);

            let exchange = self
                .request_cycle(
                    &mut inner.transport,
                    &request,
                    Some(address),
                    FrameKinds::LONG | FrameKinds::ACK,
                    true,
                )
                .await?;

            let data = match exchange {
                Exchange::Ack => {
                    // An ACK on REQ_UD2 means the slave has nothing (more)
                    // to send; treat it as the end of the sequence.
                    debug!("slave 0x{address:02X} acknowledged REQ_UD2 without data");
                    break;
                }
                Exchange::Datagram(MBusDatagram::VariableData(data)) => data,
                Exchange::Datagram(MBusDatagram::Opaque { ci, .. }) => {
                    return Err(MBusError::Protocol(ProtocolError::UnknownCi(ci)));
                }
                Exchange::Frame(_) => {
                    return Err(MBusError::Protocol(ProtocolError::UnexpectedFrameKind(
                        "short",
                    )));
                }
            };

            // Delivery succeeded: the next datagram flips the FCB.
            fcb = !fcb;
            inner.fcb.insert(address, fcb);

            let more = data.more_records_follow;
            match aggregate.as_mut() {
                None => aggregate = Some(data),
                Some(total) => {
                    total.records.extend(data.records);
                    total
                        .manufacturer_data
                        .extend_from_slice(&data.manufacturer_data);
                    total.access_number = data.access_number;
                    total.status = data.status;
                    if total.identification.is_none() {
                        total.identification = data.identification;
                    }
                }
            }

            if !more {
                break;
            }
            debug!("slave 0x{address:02X} announced another datagram, toggling FCB");
        }

        let mut data = aggregate.unwrap_or_else(|| empty_user_data(address));
        data.more_records_follow = false;
        Ok(data)
    }

    /// Polls the slave for class 1 (alarm) data with REQ_UD1. Returns `None`
    /// when the slave acknowledges without data.
    pub async fn req_ud1(&self, address: u8) -> Result<Option<MBusUserData>, MBusError> {
        let mut inner = self.inner.lock().await;

        let fcb = inner.fcb.get(&address).copied().unwrap_or(true);
        let request = pack_req_ud1(address, Some(fcb))?;

        let exchange = self
            .request_cycle(
                &mut inner.transport,
                &request,
                Some(address),
                FrameKinds::LONG | FrameKinds::ACK,
                true,
            )
            .await?;

        match exchange {
            Exchange::Ack => Ok(None),
            Exchange::Datagram(MBusDatagram::VariableData(data)) => {
                inner.fcb.insert(address, !fcb);
                Ok(Some(data))
            }
            Exchange::Datagram(MBusDatagram::Opaque { ci, .. }) => {
                Err(MBusError::Protocol(ProtocolError::UnknownCi(ci)))
            }
            Exchange::Frame(_) => Err(MBusError::Protocol(ProtocolError::UnexpectedFrameKind(
                "short",
            ))),
        }
    }

    /// Sends a SND_UD long frame and waits for the ACK.
    pub async fn send_user_data(
        &self,
        address: u8,
        ci: u8,
        payload: &[u8],
    ) -> Result<(), MBusError> {
        if !crate::mbus::frame::is_reply_address(address) {
            return Err(MBusError::InvalidAddress(address));
        }
        let request = pack_snd_ud(address, ci, payload)?;
        let mut inner = self.inner.lock().await;
        self.request_cycle(
            &mut inner.transport,
            &request,
            Some(address),
            FrameKinds::ACK,
            false,
        )
        .await?;
        Ok(())
    }

    async fn reset_locked(
        &self,
        inner: &mut SessionInner<T>,
        address: u8,
    ) -> Result<(), MBusError> {
        let request = pack_snd_nke(address)?;
        self.request_cycle(
            &mut inner.transport,
            &request,
            Some(address),
            FrameKinds::ACK,
            false,
        )
        .await?;
        inner.fcb.remove(&address);
        debug!("link reset acknowledged by 0x{address:02X}");
        Ok(())
    }

    /// One request/response exchange with retries.
    ///
    /// A retry resends the *same* bytes: from the slave's point of view no
    /// successful acknowledgement happened, so it must see an unchanged FCB
    /// and repeat its previous datagram. Connection and caller errors abort
    /// immediately; timeouts and validation errors - including record-parser
    /// errors when `decode_payload` is set - consume attempts, since they
    /// may reflect transient line noise.
    async fn request_cycle(
        &self,
        transport: &mut T,
        request: &[u8],
        expected_address: Option<u8>,
        allowed: FrameKinds,
        decode_payload: bool,
    ) -> Result<Exchange, MBusError> {
        let mut last_error: Option<MBusError> = None;

        for attempt in 1..=self.config.max_retries {
            if attempt > 1 {
                sleep(self.config.retry_delay).await;
            }

            transport.write(request).await?;

            let result = match self
                .receive_frame(transport, expected_address, allowed)
                .await
            {
                Ok(MBusFrame::Ack) => Ok(Exchange::Ack),
                Ok(frame @ MBusFrame::Long { .. }) if decode_payload => decode_user_data(&frame)
                    .map(Exchange::Datagram)
                    .map_err(MBusError::from),
                Ok(frame) => Ok(Exchange::Frame(frame)),
                Err(err) => Err(err),
            };

            match result {
                Ok(exchange) => return Ok(exchange),
                Err(err) if err.is_retryable() => {
                    warn!(
                        "attempt {attempt}/{} failed: {err}",
                        self.config.max_retries
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(MBusError::Timeout { needed: 1 }))
    }

    /// Drives a fresh decoder over transport reads until a frame or error.
    async fn receive_frame(
        &self,
        transport: &mut T,
        expected_address: Option<u8>,
        allowed: FrameKinds,
    ) -> Result<MBusFrame, MBusError> {
        let mut decoder = FrameDecoder::new(expected_address, allowed);
        while !decoder.is_done() {
            let needed = decoder.bytes_needed();
            let chunk = transport.read(needed, self.config.base_timeout).await?;
            if chunk.is_empty() {
                return Err(MBusError::Timeout { needed });
            }
            decoder.feed(&chunk)?;
        }
        decoder
            .take_frame()
            .ok_or(MBusError::Protocol(ProtocolError::UnexpectedFrameKind(
                "decoder finished without a frame",
            )))
    }
}

fn empty_user_data(address: u8) -> MBusUserData {
    MBusUserData {
        address,
        access_number: 0,
        status: crate::payload::record::StatusByte(0),
        signature: 0,
        identification: None,
        records: Vec::new(),
        more_records_follow: false,
        manufacturer_data: Vec::new(),
    }
}
