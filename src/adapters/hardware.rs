//! Hardware adapter: bundles a sensor reader and an actuator driver.
//!
//! The control loop takes one value implementing both
//! [`SensorReader`] and [`ActuatorDriver`]; this adapter builds that value
//! from independent parts, e.g. a DHT22 and a relay bank.

use crate::app::ports::{ActuatorDriver, SensorReader};
use crate::error::{ActuatorError, SensorError};
use crate::model::{ActuatorCommand, ActuatorId, ReadingSet};

pub struct HardwareAdapter<S, A> {
    pub sensor: S,
    pub actuators: A,
}

impl<S, A> HardwareAdapter<S, A> {
    pub fn new(sensor: S, actuators: A) -> Self {
        Self { sensor, actuators }
    }
}

// ── SensorReader ──────────────────────────────────────────────

impl<S: SensorReader, A> SensorReader for HardwareAdapter<S, A> {
    fn read(&mut self) -> Result<ReadingSet, SensorError> {
        self.sensor.read()
    }
}

// ── ActuatorDriver ────────────────────────────────────────────

impl<S, A: ActuatorDriver> ActuatorDriver for HardwareAdapter<S, A> {
    fn actuators(&self) -> &[ActuatorId] {
        self.actuators.actuators()
    }

    fn init(&mut self) -> Result<(), ActuatorError> {
        self.actuators.init()
    }

    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<(), ActuatorError> {
        self.actuators.apply(cmd)
    }
}

/// Driver for agents with nothing to actuate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActuators;

impl ActuatorDriver for NoActuators {
    fn actuators(&self) -> &[ActuatorId] {
        &[]
    }

    fn init(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<(), ActuatorError> {
        Err(ActuatorError::invalid_state(Some(cmd.id), "agent has no actuators"))
    }
}
