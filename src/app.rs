//! Periodic sensor traffic source.
//!
//! A stand-in for the sensing application sitting on top of an end device:
//! every `interval` it offers one fixed-size reading to the MAC queue,
//! addressed at the coordinator by default. Readings queued while the
//! device is between rounds simply wait for the next RFD.

use std::time::Duration;

use crate::mac::header::MacAddress;

/// Configuration of a periodic sensor application.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Interval between generated readings.
    pub interval: Duration,
    /// Payload size of each reading, in bytes.
    pub payload: usize,
    /// Upper-layer protocol number stamped on each reading.
    pub protocol: u16,
    /// Destination of each reading.
    pub destination: MacAddress,
}

impl SensorConfig {
    /// A sensor reporting `payload` bytes to the coordinator every
    /// `interval`.
    pub fn reporting(interval: Duration, payload: usize) -> Self {
        Self {
            interval,
            payload,
            protocol: 0x0800,
            destination: MacAddress::COORDINATOR,
        }
    }
}
