//! Serial transport over `tokio-serial`.
//!
//! M-Bus wiring (EN 13757-2) uses 8 data bits, even parity and one stop bit;
//! 2400 baud is the common default, with 300..38400 seen in the field.

use crate::error::MBusError;
use crate::mbus::transport::{MBusTransport, TimingProfile};
use async_trait::async_trait;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout as with_timeout;
use tokio_serial::SerialPortBuilderExt;

/// Serial-port settings for an M-Bus master.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
    /// Headroom factor on the transmission-time estimate; raise it for slow
    /// or level-converter-coupled devices.
    pub timing_multiplier: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: 2400,
            data_bits: tokio_serial::DataBits::Eight,
            parity: tokio_serial::Parity::Even,
            stop_bits: tokio_serial::StopBits::One,
            timing_multiplier: 1.2,
        }
    }
}

/// [`MBusTransport`] over a local or USB serial port.
pub struct SerialTransport {
    port: tokio_serial::SerialStream,
    timing: TimingProfile,
    connected: bool,
}

impl SerialTransport {
    /// Opens `path` (e.g. `/dev/ttyUSB0`, `COM3`) with default M-Bus settings.
    pub async fn open(path: &str) -> Result<Self, MBusError> {
        Self::open_with_config(path, SerialConfig::default()).await
    }

    pub async fn open_with_config(path: &str, config: SerialConfig) -> Result<Self, MBusError> {
        let port = tokio_serial::new(path, config.baudrate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .open_native_async()
            .map_err(|e| MBusError::Connection(format!("failed to open {path}: {e}")))?;

        let mut timing = TimingProfile::new(config.baudrate);
        timing.multiplier = config.timing_multiplier;

        debug!(
            "opened serial port {path} at {} baud, {:?} parity",
            config.baudrate, config.parity
        );
        Ok(SerialTransport {
            port,
            timing,
            connected: true,
        })
    }
}

#[async_trait]
impl MBusTransport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError> {
        if !self.connected {
            return Err(MBusError::Connection("serial port is closed".into()));
        }
        trace!("serial tx: {}", crate::logging::hex_dump(bytes));
        let result = async {
            self.port.write_all(bytes).await?;
            self.port.flush().await
        }
        .await;
        result.map_err(|e| {
            self.connected = false;
            MBusError::Connection(format!("serial write failed: {e}"))
        })
    }

    async fn read(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, MBusError> {
        if !self.connected {
            return Err(MBusError::Connection("serial port is closed".into()));
        }
        let deadline = self.timing.read_deadline(len, timeout);
        let mut buf = vec![0u8; len];
        match with_timeout(deadline, self.port.read_exact(&mut buf)).await {
            Ok(Ok(_)) => {
                trace!("serial rx: {}", crate::logging::hex_dump(&buf));
                Ok(buf)
            }
            Ok(Err(e)) => {
                self.connected = false;
                Err(MBusError::Connection(format!("serial read failed: {e}")))
            }
            // Deadline expired: report a timeout by returning nothing.
            Err(_) => Ok(Vec::new()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
