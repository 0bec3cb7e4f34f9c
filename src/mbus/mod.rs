//! Link and session layers: frame codec, progressive decoder, transports
//! and the session orchestrator.

pub mod decoder;
pub mod frame;
pub mod serial;
pub mod session;
pub mod tcp;
pub mod transport;

pub use decoder::{FrameDecoder, FrameKinds};
pub use frame::MBusFrame;
pub use serial::{SerialConfig, SerialTransport};
pub use session::{MBusSession, SessionConfig};
pub use tcp::TcpTransport;
pub use transport::{MBusTransport, TimingProfile};
