//! TCP transport for serial-to-ethernet M-Bus gateways.
//!
//! Network latency has no useful per-byte model, so no transmission-time
//! estimate is added here; pick a `base_timeout` that covers the gateway's
//! round trip instead.

use crate::error::MBusError;
use crate::mbus::transport::MBusTransport;
use async_trait::async_trait;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout as with_timeout;

/// [`MBusTransport`] over a TCP stream to a transparent gateway.
pub struct TcpTransport {
    stream: TcpStream,
    connected: bool,
}

impl TcpTransport {
    /// Connects to `addr` (e.g. `192.168.1.50:10001`).
    pub async fn connect(addr: &str) -> Result<Self, MBusError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| MBusError::Connection(format!("failed to connect to {addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| MBusError::Connection(format!("failed to set TCP_NODELAY: {e}")))?;
        debug!("connected to M-Bus gateway at {addr}");
        Ok(TcpTransport {
            stream,
            connected: true,
        })
    }
}

#[async_trait]
impl MBusTransport for TcpTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError> {
        if !self.connected {
            return Err(MBusError::Connection("gateway connection is closed".into()));
        }
        trace!("tcp tx: {}", crate::logging::hex_dump(bytes));
        let result = async {
            self.stream.write_all(bytes).await?;
            self.stream.flush().await
        }
        .await;
        result.map_err(|e| {
            self.connected = false;
            MBusError::Connection(format!("gateway write failed: {e}"))
        })
    }

    async fn read(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, MBusError> {
        if !self.connected {
            return Err(MBusError::Connection("gateway connection is closed".into()));
        }
        let mut buf = vec![0u8; len];
        match with_timeout(timeout, self.stream.read_exact(&mut buf)).await {
            Ok(Ok(_)) => {
                trace!("tcp rx: {}", crate::logging::hex_dump(&buf));
                Ok(buf)
            }
            Ok(Err(e)) => {
                self.connected = false;
                Err(MBusError::Connection(format!("gateway read failed: {e}")))
            }
            Err(_) => Ok(Vec::new()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
