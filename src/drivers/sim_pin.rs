//! In-memory GPIO output pin.
//!
//! Implements `embedded_hal::digital::OutputPin` so the relay driver runs
//! unchanged on a host.  Clones share the same level, so a test can keep a
//! handle to observe what the driver did and to inject a fault.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

impl embedded_hal::digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct PinState {
    high: AtomicBool,
    faulted: AtomicBool,
    writes: AtomicU32,
}

#[derive(Debug, Clone)]
pub struct SimPin {
    gpio: u8,
    state: Arc<PinState>,
}

impl SimPin {
    pub fn new(gpio: u8) -> Self {
        Self {
            gpio,
            state: Arc::new(PinState::default()),
        }
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    pub fn is_high(&self) -> bool {
        self.state.high.load(Ordering::SeqCst)
    }

    /// Level changes that reached the pin.
    pub fn writes(&self) -> u32 {
        self.state.writes.load(Ordering::SeqCst)
    }

    /// While faulted every write fails and the level is left alone.
    pub fn set_fault(&self, faulted: bool) {
        self.state.faulted.store(faulted, Ordering::SeqCst);
    }

    fn write(&mut self, high: bool) -> Result<(), SimPinError> {
        if self.state.faulted.load(Ordering::SeqCst) {
            return Err(SimPinError);
        }
        self.state.high.store(high, Ordering::SeqCst);
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ErrorType for SimPin {
    type Error = SimPinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}
