//! # mbus-master - an async M-Bus (Meter-Bus) primary master
//!
//! Implementation of the wired M-Bus master side per EN 13757-2 (link layer)
//! and EN 13757-3 (application layer): a bit-exact frame codec, a progressive
//! frame decoder that reads responses in exactly the chunks the frame shape
//! dictates, a data-record parser covering the DIF/DIFE and VIF/VIFE
//! descriptor chains, and a session layer that drives request/response
//! cycles with retries and FCB datagram sequencing over a serial port or a
//! TCP gateway.
//!
//! ## Reading a meter
//!
//! ```no_run
//! use mbus_master::{MBusSession, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mbus_master::MBusError> {
//!     let transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!     let session = MBusSession::new(transport);
//!
//!     let data = session.read_records(5).await?;
//!     for record in &data.records {
//!         println!(
//!             "{}: {:?} {}",
//!             record.quantity().unwrap_or("?"),
//!             record.scaled_value(),
//!             record.unit().unwrap_or(""),
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The decoder and parsers are pure and synchronous; all suspension points
//! live in the transport and the retry delay, so the protocol machinery is
//! testable without time.

pub mod constants;
pub mod error;
pub mod logging;
pub mod mbus;
pub mod payload;

pub use error::{MBusError, ProtocolError};
pub use logging::init_logger;
pub use mbus::{
    FrameDecoder, FrameKinds, MBusFrame, MBusSession, MBusTransport, SerialConfig,
    SerialTransport, SessionConfig, TcpTransport,
};
pub use payload::{
    decode_user_data, Direction, MBusDatagram, MBusDate, MBusDateTime, MBusFunction,
    MBusIdentification, MBusRecord, MBusTime, MBusUserData, MBusValue, StatusByte,
};
