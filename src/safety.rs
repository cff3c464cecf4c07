//! Safe-state release on shutdown.
//!
//! When the loop stops, every actuator it owns is driven to the configured
//! [`SafeStatePolicy`]:
//!
//! 1. `AllOff` drives every output off.
//! 2. `LastKnownGood` re-applies the last successfully applied state, and
//!    falls back to off for an actuator that never had one.
//!
//! A failing actuator does not stop the release of the others; every
//! failure is logged and returned in the [`SafeStateReport`].

use log::{error, info};

use crate::app::ports::ActuatorDriver;
use crate::config::SafeStatePolicy;
use crate::error::ActuatorError;
use crate::fsm::context::AgentState;
use crate::model::{ActuatorCommand, ActuatorId, CommandSource, DesiredState, Timestamp};

/// Outcome of [`release_to_safe_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct SafeStateReport {
    pub policy: SafeStatePolicy,
    pub applied: heapless::Vec<(ActuatorId, DesiredState), { ActuatorId::COUNT }>,
    pub failures: Vec<ActuatorError>,
}

impl SafeStateReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The commands that put `owned` actuators into the safe state.
pub fn safe_state_commands(
    policy: SafeStatePolicy,
    state: &AgentState,
    owned: &[ActuatorId],
    now: Timestamp,
) -> heapless::Vec<ActuatorCommand, { ActuatorId::COUNT }> {
    owned
        .iter()
        .take(ActuatorId::COUNT)
        .map(|&id| {
            let desired = match policy {
                SafeStatePolicy::AllOff => DesiredState::Off,
                SafeStatePolicy::LastKnownGood => state.actuator(id).unwrap_or(DesiredState::Off),
            };
            ActuatorCommand::new(id, desired, CommandSource::SafeState, now)
        })
        .collect()
}

/// Drive every actuator `driver` owns into the safe state.
pub fn release_to_safe_state(
    driver: &mut impl ActuatorDriver,
    state: &mut AgentState,
    policy: SafeStatePolicy,
    now: Timestamp,
) -> SafeStateReport {
    let commands = safe_state_commands(policy, state, driver.actuators(), now);
    let mut report = SafeStateReport {
        policy,
        applied: heapless::Vec::new(),
        failures: Vec::new(),
    };

    for cmd in &commands {
        match driver.apply(cmd) {
            Ok(()) => {
                state.record_applied(cmd);
                let _ = report.applied.push((cmd.id, cmd.desired));
            }
            Err(e) => {
                error!("safe state: {} could not be set {}: {}", cmd.id, cmd.desired, e);
                state.counters.actuator_faults += 1;
                report.failures.push(e);
            }
        }
    }

    info!(
        "safe state {:?}: {} applied, {} failed",
        policy,
        report.applied.len(),
        report.failures.len()
    );
    report
}
