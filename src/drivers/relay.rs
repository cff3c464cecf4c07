//! GPIO relay bank.
//!
//! One relay per actuator id, each on its own digital output.  Relays are
//! binary: `Level(100)` is accepted as on, any other partial level is
//! rejected with `InvalidState`.
//!
//! ## Idempotence
//!
//! The bank remembers the level it last drove.  Applying the same state
//! again does not touch the pin.  A failed write leaves the remembered
//! level unchanged.

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, info};

use crate::app::ports::ActuatorDriver;
use crate::error::ActuatorError;
use crate::model::{ActuatorCommand, ActuatorId, DesiredState};

struct Relay<P> {
    id: ActuatorId,
    gpio: u8,
    pin: P,
    /// `None` until the first successful write.
    energised: Option<bool>,
}

pub struct RelayBank<P> {
    relays: heapless::Vec<Relay<P>, { ActuatorId::COUNT }>,
    ids: heapless::Vec<ActuatorId, { ActuatorId::COUNT }>,
}

impl<P: OutputPin> Default for RelayBank<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: OutputPin> RelayBank<P> {
    pub fn new() -> Self {
        Self {
            relays: heapless::Vec::new(),
            ids: heapless::Vec::new(),
        }
    }

    /// Wire `id` to `pin`.  A second relay for the same id replaces the first.
    #[must_use]
    pub fn with_relay(mut self, id: ActuatorId, gpio: u8, pin: P) -> Self {
        let relay = Relay {
            id,
            gpio,
            pin,
            energised: None,
        };
        match self.relays.iter().position(|r| r.id == id) {
            Some(i) => self.relays[i] = relay,
            None => {
                // One slot per actuator id; capacity cannot be exceeded.
                let _ = self.relays.push(relay);
                let _ = self.ids.push(id);
            }
        }
        self
    }

    /// Level last driven on `id`'s relay.
    pub fn energised(&self, id: ActuatorId) -> Option<bool> {
        self.relays.iter().find(|r| r.id == id).and_then(|r| r.energised)
    }

    fn drive(relay: &mut Relay<P>, on: bool) -> Result<(), ActuatorError> {
        let written = if on { relay.pin.set_high() } else { relay.pin.set_low() };
        written.map_err(|e| {
            ActuatorError::hardware(
                Some(relay.id),
                &format!("gpio{} write failed: {:?}", relay.gpio, e.kind()),
            )
        })?;
        relay.energised = Some(on);
        Ok(())
    }
}

fn relay_level(cmd: &ActuatorCommand) -> Result<bool, ActuatorError> {
    match cmd.desired {
        DesiredState::Off | DesiredState::Level(0) => Ok(false),
        DesiredState::On | DesiredState::Level(100) => Ok(true),
        DesiredState::Level(p) => Err(ActuatorError::invalid_state(
            Some(cmd.id),
            &format!("relay is on/off only, got {p}%"),
        )),
    }
}

impl<P: OutputPin> ActuatorDriver for RelayBank<P> {
    fn actuators(&self) -> &[ActuatorId] {
        &self.ids
    }

    fn init(&mut self) -> Result<(), ActuatorError> {
        for relay in &mut self.relays {
            Self::drive(relay, false)?;
            info!("relay {} on gpio{} initialised off", relay.id, relay.gpio);
        }
        Ok(())
    }

    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<(), ActuatorError> {
        let on = relay_level(cmd)?;
        let relay = self
            .relays
            .iter_mut()
            .find(|r| r.id == cmd.id)
            .ok_or_else(|| ActuatorError::invalid_state(Some(cmd.id), "no relay wired"))?;
        if relay.energised == Some(on) {
            return Ok(());
        }
        Self::drive(relay, on)?;
        debug!("relay {} -> {}", relay.id, if on { "on" } else { "off" });
        Ok(())
    }
}
