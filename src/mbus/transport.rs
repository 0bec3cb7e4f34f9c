//! Byte-transport contract required by the session layer.
//!
//! The core never measures wall-clock time itself: a read either yields the
//! requested bytes or comes back empty after the transport's deadline, and
//! that deadline is the protocol-supplied base timeout plus the transport's
//! own transmission-time estimate.

use crate::error::MBusError;
use async_trait::async_trait;
use std::time::Duration;

/// Byte transport the session drives. Implementations exist for serial
/// ports and TCP gateways; tests use a scripted mock.
#[async_trait]
pub trait MBusTransport: Send {
    /// Writes and flushes the full byte sequence. Errors on disconnect.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError>;

    /// Reads exactly `len` bytes. Returns an empty vector when the deadline
    /// (`timeout` plus the transmission-time estimate) expires first; errors
    /// only on disconnect.
    async fn read(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, MBusError>;

    fn is_connected(&self) -> bool;
}

/// Transmission-time estimate for asynchronous serial links.
///
/// An M-Bus byte is 11 bit times in the standard 8E1 format (start, eight
/// data bits, parity, stop). The multiplier leaves headroom for devices that
/// pause between bytes; 1.2 works for typical meters, slow hardware may need
/// more.
#[derive(Debug, Clone, Copy)]
pub struct TimingProfile {
    pub baudrate: u32,
    pub bits_per_byte: u32,
    pub multiplier: f64,
}

impl TimingProfile {
    pub fn new(baudrate: u32) -> Self {
        TimingProfile {
            baudrate,
            bits_per_byte: 11,
            multiplier: 1.2,
        }
    }

    /// Time the wire needs to carry `len` bytes, including the headroom
    /// multiplier.
    pub fn transmission_time(&self, len: usize) -> Duration {
        let bits = (len as u64) * self.bits_per_byte as u64;
        let seconds = bits as f64 / self.baudrate as f64 * self.multiplier;
        Duration::from_secs_f64(seconds)
    }

    /// Total deadline for reading `len` bytes on top of the protocol's base
    /// timeout.
    pub fn read_deadline(&self, len: usize, base: Duration) -> Duration {
        base + self.transmission_time(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmission_time_scales_with_length_and_baud() {
        let profile = TimingProfile::new(2400);
        // One byte at 2400 baud: 11 bits / 2400 * 1.2 = 5.5 ms.
        let one = profile.transmission_time(1);
        assert!((one.as_secs_f64() - 0.0055).abs() < 1e-9);
        assert_eq!(profile.transmission_time(10), one * 10);

        let fast = TimingProfile::new(9600);
        assert!(fast.transmission_time(1) < one);
    }

    #[test]
    fn read_deadline_adds_base_timeout() {
        let profile = TimingProfile::new(2400);
        let deadline = profile.read_deadline(1, Duration::from_millis(500));
        assert!(deadline > Duration::from_millis(500));
        assert!(deadline < Duration::from_millis(510));
    }
}
