//! Simulated sensors.
//!
//! Both sensors read their values from shared atomics so a test, or the
//! operator console, can move the environment while the loop runs.  A
//! [`SimFault`] can be injected to make the next reads fail.

pub mod climate;
pub mod telemetry;

use core::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use core::time::Duration;

use crate::error::SensorError;

pub use climate::SimClimateSensor;
pub use telemetry::SimTelemetrySensor;

/// Failure mode a simulated sensor is forced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SimFault {
    None = 0,
    Timeout = 1,
    HardwareFault = 2,
}

impl SimFault {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Timeout,
            2 => Self::HardwareFault,
            _ => Self::None,
        }
    }
}

/// `f64` stored in an `AtomicU64` by bit pattern.
#[derive(Debug)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Fault and latency shared by every simulated sensor.
#[derive(Debug, Default)]
pub(crate) struct SimBus {
    fault: AtomicU8,
    latency_ms: AtomicU64,
}

impl SimBus {
    pub(crate) fn set_fault(&self, fault: SimFault) {
        self.fault.store(fault as u8, Ordering::Relaxed);
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Fail the read as configured.  A response slower than `timeout`
    /// counts as a timeout without actually waiting.
    pub(crate) fn check(&self, device: &str, timeout: Duration) -> Result<(), SensorError> {
        match SimFault::from_u8(self.fault.load(Ordering::Relaxed)) {
            SimFault::Timeout => return Err(SensorError::timeout(&format!("{device}: no response"))),
            SimFault::HardwareFault => return Err(SensorError::hardware(&format!("{device}: bus fault"))),
            SimFault::None => {}
        }
        let latency = Duration::from_millis(self.latency_ms.load(Ordering::Relaxed));
        if latency > timeout {
            return Err(SensorError::timeout(&format!(
                "{device}: no response in {}ms",
                timeout.as_millis()
            )));
        }
        Ok(())
    }
}
